//! API key repository trait

use std::fmt::Debug;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{ApiKey, ApiKeyId, KeyStatus};
use super::ip_allow::IpAllowEntry;
use super::scope::Scope;
use crate::domain::client::ClientId;
use crate::domain::DomainError;

/// Repository trait for API key storage
///
/// Implementations enforce secret-hash uniqueness across all keys. The
/// prefix is deliberately not unique; `find_by_prefix` narrows a lookup to
/// a small candidate set which the caller verifies against the hash.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Create a new key
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Get a key by ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Update an existing key
    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError>;

    /// Find candidate keys by prefix; expected result size is 0 or a small
    /// handful
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// List keys owned by a client, optionally filtered by effective status
    async fn list_by_client(
        &self,
        client_id: &ClientId,
        status: Option<KeyStatus>,
    ) -> Result<Vec<ApiKey>, DomainError>;

    /// Atomically replace a key's full scope set
    async fn replace_scopes(
        &self,
        id: &ApiKeyId,
        scopes: Vec<Scope>,
    ) -> Result<ApiKey, DomainError>;

    /// Atomically replace a key's IP allow-list
    async fn replace_ip_allow_list(
        &self,
        id: &ApiKeyId,
        entries: Vec<IpAllowEntry>,
    ) -> Result<ApiKey, DomainError>;

    /// Record the last successful validation as a direct single-row update,
    /// not a read-modify-write of the whole entity
    async fn record_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
        ip: IpAddr,
    ) -> Result<(), DomainError>;
}
