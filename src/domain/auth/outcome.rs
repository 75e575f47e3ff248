//! Authentication and authorization outcomes
//!
//! The pipeline returns typed failures for every expected condition; callers
//! never see a distinction between "key not found" and "wrong secret", and
//! detailed codes surface only in usage records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::api_key::{ApiKeyId, Scope};
use crate::domain::client::ClientId;

/// Why an authentication or authorization attempt was denied
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    #[error("missing credential")]
    MissingCredential,

    /// Covers both unknown prefix and hash mismatch; deliberately merged so
    /// callers cannot probe which prefixes exist
    #[error("invalid API key")]
    InvalidKey,

    #[error("API key has been revoked")]
    Revoked,

    #[error("API key or owning client is inactive")]
    Inactive,

    #[error("API key has expired")]
    Expired,

    #[error("caller IP is not on the key's allow-list")]
    IpNotAllowed,

    #[error("API key does not grant the required scope")]
    InsufficientScope,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("credential store unavailable")]
    StoreUnavailable,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidKey => "invalid_key",
            Self::Revoked => "revoked",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::IpNotAllowed => "ip_not_allowed",
            Self::InsufficientScope => "insufficient_scope",
            Self::RateLimited => "rate_limited",
            Self::StoreUnavailable => "store_unavailable",
        }
    }

    /// Whether the caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::StoreUnavailable)
    }
}

/// Successful validation result: the authenticated identity and everything
/// downstream authorization needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedKey {
    pub api_key_id: ApiKeyId,
    pub client_id: ClientId,
    pub client_name: String,
    pub scopes: Vec<Scope>,
    pub rate_limit_per_minute: u32,
}
