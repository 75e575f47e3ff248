//! In-memory client repository implementation

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::client::{Client, ClientId, ClientRepository};
use crate::domain::DomainError;

/// In-memory implementation of [`ClientRepository`]
#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<HashMap<String, Client>>,
}

impl InMemoryClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_taken(clients: &HashMap<String, Client>, name: &str, except_id: &str) -> bool {
        clients.values().any(|existing| {
            !existing.is_deleted() && existing.name() == name && existing.id().as_str() != except_id
        })
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn create(&self, client: Client) -> Result<Client, DomainError> {
        let mut clients = self.clients.write().await;
        let id = client.id().as_str().to_string();

        if clients.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "Client with ID '{}' already exists",
                id
            )));
        }

        if Self::name_taken(&clients, client.name(), &id) {
            return Err(DomainError::conflict(format!(
                "Client named '{}' already exists",
                client.name()
            )));
        }

        clients.insert(id, client.clone());
        Ok(client)
    }

    async fn get(&self, id: &ClientId) -> Result<Option<Client>, DomainError> {
        let clients = self.clients.read().await;
        Ok(clients.get(id.as_str()).cloned())
    }

    async fn update(&self, client: &Client) -> Result<Client, DomainError> {
        let mut clients = self.clients.write().await;
        let id = client.id().as_str().to_string();

        if !clients.contains_key(&id) {
            return Err(DomainError::not_found(format!(
                "Client '{}' not found",
                id
            )));
        }

        if Self::name_taken(&clients, client.name(), &id) {
            return Err(DomainError::conflict(format!(
                "Client named '{}' already exists",
                client.name()
            )));
        }

        clients.insert(id, client.clone());
        Ok(client.clone())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, DomainError> {
        let clients = self.clients.read().await;
        Ok(clients
            .values()
            .find(|client| !client.is_deleted() && client.name() == name)
            .cloned())
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<Client>, DomainError> {
        let clients = self.clients.read().await;

        let mut result: Vec<Client> = clients
            .values()
            .filter(|client| include_deleted || !client.is_deleted())
            .cloned()
            .collect();

        result.sort_by_key(|client| client.created_at());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client(name: &str) -> Client {
        Client::new(ClientId::generate(), name, "ops@example.com")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryClientRepository::new();
        let client = create_test_client("Acme Corp");

        repo.create(client.clone()).await.unwrap();

        let retrieved = repo.get(client.id()).await.unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "Acme Corp");
    }

    #[tokio::test]
    async fn test_name_uniqueness_among_non_deleted() {
        let repo = InMemoryClientRepository::new();

        repo.create(create_test_client("Acme Corp")).await.unwrap();

        let duplicate = repo.create(create_test_client("Acme Corp")).await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_deleted_client_frees_its_name() {
        let repo = InMemoryClientRepository::new();

        let mut client = create_test_client("Acme Corp");
        repo.create(client.clone()).await.unwrap();

        client.mark_deleted();
        repo.update(&client).await.unwrap();

        // The name is reusable once the holder is soft-deleted
        repo.create(create_test_client("Acme Corp")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_conflicts() {
        let repo = InMemoryClientRepository::new();

        repo.create(create_test_client("Acme Corp")).await.unwrap();
        let mut other = create_test_client("Globex");
        repo.create(other.clone()).await.unwrap();

        other.set_name("Acme Corp");
        let result = repo.update(&other).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_find_by_name_skips_deleted() {
        let repo = InMemoryClientRepository::new();

        let mut client = create_test_client("Acme Corp");
        repo.create(client.clone()).await.unwrap();

        assert!(repo.find_by_name("Acme Corp").await.unwrap().is_some());

        client.mark_deleted();
        repo.update(&client).await.unwrap();

        assert!(repo.find_by_name("Acme Corp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_excludes_deleted_by_default() {
        let repo = InMemoryClientRepository::new();

        let mut deleted = create_test_client("Old Corp");
        repo.create(deleted.clone()).await.unwrap();
        repo.create(create_test_client("New Corp")).await.unwrap();

        deleted.mark_deleted();
        repo.update(&deleted).await.unwrap();

        assert_eq!(repo.list(false).await.unwrap().len(), 1);
        assert_eq!(repo.list(true).await.unwrap().len(), 2);
    }
}
