//! API key entity and related types

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ip_allow::IpAllowEntry;
use super::scope::Scope;
use crate::domain::client::ClientId;
use crate::domain::DomainError;

/// API key identifier, generated at issuance time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyId(String);

impl ApiKeyId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("API key id cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Generate a fresh unique ID
    pub fn generate() -> Self {
        Self(format!("key-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKeyId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyId> for String {
    fn from(id: ApiKeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Effective status of a key at a given instant
///
/// Revocation and inactivity are terminal administrative states and take
/// precedence over expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Inactive,
    Revoked,
    Expired,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Revoked => write!(f, "revoked"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// API key entity
///
/// The plaintext secret exists only at generation time; the entity stores
/// the salted hash (`sha256$<salt>$<digest>`) and the non-secret prefix
/// used as a lookup index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier
    id: ApiKeyId,
    /// Owning client
    client_id: ClientId,
    /// Display name
    name: String,
    /// Salted one-way hash of the secret; never exposed through the API
    secret_hash: String,
    /// Non-secret leading slice of the secret, used only to narrow lookups
    key_prefix: String,
    /// Requests-per-minute ceiling for this key
    rate_limit_per_minute: u32,
    /// Expiration timestamp (None = never expires)
    expires_at: Option<DateTime<Utc>>,
    /// Whether the key may authenticate (administrative toggle)
    active: bool,
    /// Revocation timestamp; set once, never cleared
    revoked_at: Option<DateTime<Utc>>,
    /// Who revoked the key
    revoked_by: Option<String>,
    /// Why the key was revoked
    revocation_reason: Option<String>,
    /// Last successful validation
    last_used_at: Option<DateTime<Utc>>,
    /// Caller IP of the last successful validation
    last_used_ip: Option<IpAddr>,
    /// Granted scopes, unique per key
    scopes: Vec<Scope>,
    /// IP allow-list; empty means any IP is accepted
    ip_allow_list: Vec<IpAllowEntry>,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a new active key
    pub fn new(
        id: ApiKeyId,
        client_id: ClientId,
        name: impl Into<String>,
        secret_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        rate_limit_per_minute: u32,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            client_id,
            name: name.into(),
            secret_hash: secret_hash.into(),
            key_prefix: key_prefix.into(),
            rate_limit_per_minute,
            expires_at: None,
            active: true,
            revoked_at: None,
            revoked_by: None,
            revocation_reason: None,
            last_used_at: None,
            last_used_ip: None,
            scopes: Vec::new(),
            ip_allow_list: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.scopes = dedupe_scopes(scopes);
        self
    }

    pub fn with_ip_allow_list(mut self, entries: Vec<IpAllowEntry>) -> Self {
        self.ip_allow_list = entries;
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn revoked_by(&self) -> Option<&str> {
        self.revoked_by.as_deref()
    }

    pub fn revocation_reason(&self) -> Option<&str> {
        self.revocation_reason.as_deref()
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn last_used_ip(&self) -> Option<IpAddr> {
        self.last_used_ip
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn ip_allow_list(&self) -> &[IpAllowEntry] {
        &self.ip_allow_list
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Effective status; precedence is revoked > inactive > expired
    pub fn status(&self, now: DateTime<Utc>) -> KeyStatus {
        if self.is_revoked() {
            KeyStatus::Revoked
        } else if !self.active {
            KeyStatus::Inactive
        } else if self.is_expired_at(now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Active
        }
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_rate_limit(&mut self, requests_per_minute: u32) {
        self.rate_limit_per_minute = requests_per_minute;
        self.touch();
    }

    pub fn set_expiration(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
        self.touch();
    }

    /// Replace the full scope set; duplicates are collapsed
    pub fn set_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes = dedupe_scopes(scopes);
        self.touch();
    }

    pub fn set_ip_allow_list(&mut self, entries: Vec<IpAllowEntry>) {
        self.ip_allow_list = entries;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    /// Reactivate a deactivated key; revoked keys stay revoked
    pub fn activate(&mut self) {
        if !self.is_revoked() {
            self.active = true;
            self.touch();
        }
    }

    /// Revoke the key. Terminal: the first revocation wins and there is no
    /// un-revoke path.
    pub fn revoke(&mut self, revoked_by: Option<String>, reason: Option<String>) {
        if self.is_revoked() {
            return;
        }

        self.revoked_at = Some(Utc::now());
        self.revoked_by = revoked_by;
        self.revocation_reason = reason;
        self.active = false;
        self.touch();
    }

    /// Record a successful validation. Does not bump `updated_at`; this is
    /// the single-field update the store performs on the hot path.
    pub fn record_usage(&mut self, at: DateTime<Utc>, ip: IpAddr) {
        self.last_used_at = Some(at);
        self.last_used_ip = Some(ip);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn dedupe_scopes(scopes: Vec<Scope>) -> Vec<Scope> {
    let mut deduped: Vec<Scope> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !deduped.contains(&scope) {
            deduped.push(scope);
        }
    }
    deduped
}
