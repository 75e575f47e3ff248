//! API key field validation

use thiserror::Error;

/// Errors that can occur when validating API key fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyValidationError {
    #[error("API key id cannot be empty")]
    EmptyId,

    #[error("API key name cannot be empty")]
    EmptyName,

    #[error("API key name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("rate limit must be at least 1 request per minute")]
    ZeroRateLimit,
}

const MAX_KEY_NAME_LENGTH: usize = 100;

/// Validate an API key display name
pub fn validate_key_name(name: &str) -> Result<(), KeyValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(KeyValidationError::EmptyName);
    }

    if trimmed.len() > MAX_KEY_NAME_LENGTH {
        return Err(KeyValidationError::NameTooLong(MAX_KEY_NAME_LENGTH));
    }

    Ok(())
}

/// Validate a per-key rate limit ceiling
pub fn validate_rate_limit(requests_per_minute: u32) -> Result<(), KeyValidationError> {
    if requests_per_minute == 0 {
        return Err(KeyValidationError::ZeroRateLimit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key_names() {
        assert!(validate_key_name("CI deploy key").is_ok());
        assert!(validate_key_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_invalid_key_names() {
        assert_eq!(validate_key_name(""), Err(KeyValidationError::EmptyName));
        assert_eq!(validate_key_name("  "), Err(KeyValidationError::EmptyName));
        assert_eq!(
            validate_key_name(&"x".repeat(101)),
            Err(KeyValidationError::NameTooLong(100))
        );
    }

    #[test]
    fn test_rate_limit_validation() {
        assert!(validate_rate_limit(1).is_ok());
        assert!(validate_rate_limit(5000).is_ok());
        assert_eq!(
            validate_rate_limit(0),
            Err(KeyValidationError::ZeroRateLimit)
        );
    }
}
