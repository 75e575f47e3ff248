//! API key generation and hashing
//!
//! Secrets carry a static recognizable marker so secret scanners can flag
//! accidental leaks, followed by 32 bytes from the OS random source. Only
//! the salted SHA-256 hash (`sha256$<salt>$<digest>`) is ever stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a secret (256 bits of entropy)
const SECRET_BYTES: usize = 32;

/// Number of random salt bytes in a stored hash
const SALT_BYTES: usize = 16;

/// Characters of the random portion included in the lookup prefix
const PREFIX_RANDOM_CHARS: usize = 8;

/// Result of generating a new API key
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// The full plaintext secret (only shown once at creation)
    pub secret: String,
    /// The non-secret prefix used as a lookup index
    pub prefix: String,
    /// The salted hash to store in place of the secret
    pub hash: String,
}

/// Generator for secure API keys
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    /// Static marker prepended to every secret (e.g. "ak_live_")
    marker: String,
}

impl KeyGenerator {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Generator for production keys
    pub fn live() -> Self {
        Self::new("ak_live_")
    }

    /// Generator for test keys
    pub fn test() -> Self {
        Self::new("ak_test_")
    }

    /// Generate a new secret, its lookup prefix and its storable hash.
    ///
    /// Aborts the process if the OS random source is unavailable; falling
    /// back to a weaker source is not an option for credential material.
    pub fn generate(&self) -> GeneratedKey {
        let mut random_bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut random_bytes)
            .expect("secure random source unavailable; refusing to issue an API key");

        let secret = format!("{}{}", self.marker, URL_SAFE_NO_PAD.encode(random_bytes));
        self.package(secret)
    }

    /// Build a key from a known random portion
    ///
    /// Used for the bootstrap admin key and for deterministic integration
    /// tests; the caller is responsible for the entropy of `raw`.
    pub fn from_secret(&self, raw: &str) -> GeneratedKey {
        self.package(format!("{}{}", self.marker, raw))
    }

    fn package(&self, secret: String) -> GeneratedKey {
        let prefix = self.extract_prefix(&secret).to_string();
        let hash = self.hash_secret(&secret);

        GeneratedKey {
            secret,
            prefix,
            hash,
        }
    }

    /// Length of the lookup prefix: marker plus a fixed slice of the random
    /// portion. Too short to authenticate with, long enough to keep the
    /// candidate set tiny.
    pub fn prefix_len(&self) -> usize {
        self.marker.len() + PREFIX_RANDOM_CHARS
    }

    /// Extract the lookup prefix from a presented secret.
    ///
    /// Works on arbitrary input: a malformed secret yields a prefix that
    /// simply matches nothing in the store.
    pub fn extract_prefix<'a>(&self, secret: &'a str) -> &'a str {
        let mut end = self.prefix_len().min(secret.len());
        while !secret.is_char_boundary(end) {
            end -= 1;
        }
        &secret[..end]
    }

    /// Hash a secret with a fresh random salt
    pub fn hash_secret(&self, secret: &str) -> String {
        let mut salt = [0u8; SALT_BYTES];
        OsRng
            .try_fill_bytes(&mut salt)
            .expect("secure random source unavailable; refusing to issue an API key");

        hash_with_salt(secret, &salt)
    }

    /// Verify a presented secret against a stored `sha256$<salt>$<digest>`
    /// hash using a constant-time digest comparison
    pub fn verify_secret(&self, secret: &str, stored_hash: &str) -> bool {
        let mut parts = stored_hash.splitn(3, '$');

        let (Some("sha256"), Some(salt_b64), Some(digest_b64)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_b64) else {
            return false;
        };
        let Ok(expected) = URL_SAFE_NO_PAD.decode(digest_b64) else {
            return false;
        };

        let computed = digest_of(secret, &salt);
        constant_time_compare(&computed, &expected)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::live()
    }
}

fn hash_with_salt(secret: &str, salt: &[u8]) -> String {
    let digest = digest_of(secret, salt);
    format!(
        "sha256${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

fn digest_of(secret: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key() {
        let generator = KeyGenerator::live();
        let generated = generator.generate();

        assert!(generated.secret.starts_with("ak_live_"));
        assert!(generated.prefix.starts_with("ak_live_"));
        assert_eq!(generated.prefix.len(), "ak_live_".len() + 8);
        assert!(generated.hash.starts_with("sha256$"));
    }

    #[test]
    fn test_secret_carries_enough_entropy() {
        let generated = KeyGenerator::live().generate();

        // 32 bytes base64url-encoded = 43 chars, plus the marker
        assert!(generated.secret.len() >= "ak_live_".len() + 43);
    }

    #[test]
    fn test_key_uniqueness() {
        let generator = KeyGenerator::live();
        let key1 = generator.generate();
        let key2 = generator.generate();

        assert_ne!(key1.secret, key2.secret);
        assert_ne!(key1.hash, key2.hash);
    }

    #[test]
    fn test_verify_round_trip() {
        let generator = KeyGenerator::live();
        let generated = generator.generate();

        assert!(generator.verify_secret(&generated.secret, &generated.hash));
    }

    #[test]
    fn test_altered_secret_fails_verification() {
        let generator = KeyGenerator::live();
        let generated = generator.generate();

        // Flip the last character
        let mut altered = generated.secret.clone();
        let last = altered.pop().unwrap();
        altered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(!generator.verify_secret(&altered, &generated.hash));
        assert!(!generator.verify_secret("", &generated.hash));
    }

    #[test]
    fn test_salted_hashes_differ_for_same_secret() {
        let generator = KeyGenerator::live();

        let hash1 = generator.hash_secret("ak_live_same-secret");
        let hash2 = generator.hash_secret("ak_live_same-secret");

        assert_ne!(hash1, hash2);
        assert!(generator.verify_secret("ak_live_same-secret", &hash1));
        assert!(generator.verify_secret("ak_live_same-secret", &hash2));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_hash() {
        let generator = KeyGenerator::live();

        assert!(!generator.verify_secret("ak_live_x", "garbage"));
        assert!(!generator.verify_secret("ak_live_x", "md5$abc$def"));
        assert!(!generator.verify_secret("ak_live_x", "sha256$not-base64!$zzz"));
    }

    #[test]
    fn test_from_secret_is_deterministic_prefix() {
        let generator = KeyGenerator::test();
        let generated = generator.from_secret("fixed-secret-for-tests");

        assert_eq!(generated.secret, "ak_test_fixed-secret-for-tests");
        assert_eq!(generated.prefix, "ak_test_fixed-se");
        assert!(generator.verify_secret(&generated.secret, &generated.hash));
    }

    #[test]
    fn test_extract_prefix() {
        let generator = KeyGenerator::live();

        assert_eq!(
            generator.extract_prefix("ak_live_abc12345xyz"),
            "ak_live_abc12345"
        );
        // Short input yields what's available
        assert_eq!(generator.extract_prefix("ak_live_ab"), "ak_live_ab");
        assert_eq!(generator.extract_prefix(""), "");
        // Non-ASCII input never panics on a char boundary
        assert_eq!(generator.extract_prefix("日本語のテキストです"), "日本語のテ");
    }

    #[test]
    fn test_prefix_is_not_sufficient_to_authenticate() {
        let generator = KeyGenerator::live();
        let generated = generator.generate();

        assert!(!generator.verify_secret(&generated.prefix, &generated.hash));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hell"));
    }
}
