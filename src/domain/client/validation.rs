//! Client field validation

use thiserror::Error;

/// Errors that can occur when validating client fields
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientValidationError {
    #[error("client name cannot be empty")]
    EmptyName,

    #[error("client name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("contact email cannot be empty")]
    EmptyEmail,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

const MAX_CLIENT_NAME_LENGTH: usize = 100;

/// Validate a client display name
pub fn validate_client_name(name: &str) -> Result<(), ClientValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ClientValidationError::EmptyName);
    }

    if trimmed.len() > MAX_CLIENT_NAME_LENGTH {
        return Err(ClientValidationError::NameTooLong(MAX_CLIENT_NAME_LENGTH));
    }

    Ok(())
}

/// Validate a contact email address
///
/// Structural check only; deliverability is not the store's concern.
pub fn validate_contact_email(email: &str) -> Result<(), ClientValidationError> {
    if email.trim().is_empty() {
        return Err(ClientValidationError::EmptyEmail);
    }

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ClientValidationError::InvalidEmail(email.to_string()));
    }

    Ok(())
}
