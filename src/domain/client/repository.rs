//! Client repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{Client, ClientId};
use crate::domain::DomainError;

/// Repository trait for client storage
///
/// Implementations enforce name uniqueness among non-deleted clients.
#[async_trait]
pub trait ClientRepository: Send + Sync + Debug {
    /// Create a new client
    async fn create(&self, client: Client) -> Result<Client, DomainError>;

    /// Get a client by ID, including deactivated and soft-deleted ones
    async fn get(&self, id: &ClientId) -> Result<Option<Client>, DomainError>;

    /// Update an existing client
    async fn update(&self, client: &Client) -> Result<Client, DomainError>;

    /// Find a non-deleted client by its display name
    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, DomainError>;

    /// List clients; soft-deleted ones only when requested
    async fn list(&self, include_deleted: bool) -> Result<Vec<Client>, DomainError>;
}
