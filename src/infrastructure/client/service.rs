//! Client management service

use std::sync::Arc;

use tracing::info;

use crate::domain::client::{
    validate_client_name, validate_contact_email, Client, ClientId, ClientRepository,
};
use crate::domain::DomainError;

/// Parameters for registering a new client
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
}

/// Partial update of a client's descriptive fields
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<Option<String>>,
}

/// Client management service
#[derive(Debug)]
pub struct ClientService {
    repository: Arc<dyn ClientRepository>,
}

impl ClientService {
    pub fn new(repository: Arc<dyn ClientRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, request: CreateClient) -> Result<Client, DomainError> {
        validate_client_name(&request.name).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_contact_email(&request.contact_email)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let mut client = Client::new(
            ClientId::generate(),
            request.name.trim(),
            request.contact_email.trim(),
        );

        if let Some(phone) = request.contact_phone {
            client = client.with_contact_phone(phone);
        }

        let created = self.repository.create(client).await?;
        info!(client_id = %created.id(), name = %created.name(), "Client registered");

        Ok(created)
    }

    pub async fn get(&self, id: &ClientId) -> Result<Option<Client>, DomainError> {
        self.repository.get(id).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Client>, DomainError> {
        self.repository.find_by_name(name).await
    }

    pub async fn list(&self, include_deleted: bool) -> Result<Vec<Client>, DomainError> {
        self.repository.list(include_deleted).await
    }

    pub async fn update(
        &self,
        id: &ClientId,
        request: UpdateClient,
    ) -> Result<Client, DomainError> {
        let mut client = self.get_required(id).await?;

        if let Some(name) = request.name {
            validate_client_name(&name).map_err(|e| DomainError::validation(e.to_string()))?;
            client.set_name(name.trim());
        }

        if let Some(email) = request.contact_email {
            validate_contact_email(&email).map_err(|e| DomainError::validation(e.to_string()))?;
            client.set_contact_email(email.trim());
        }

        if let Some(phone) = request.contact_phone {
            client.set_contact_phone(phone);
        }

        self.repository.update(&client).await
    }

    /// Deactivate a client; its keys stop validating immediately
    pub async fn deactivate(&self, id: &ClientId) -> Result<Client, DomainError> {
        let mut client = self.get_required(id).await?;
        client.deactivate();
        let updated = self.repository.update(&client).await?;

        info!(client_id = %id, "Client deactivated");
        Ok(updated)
    }

    pub async fn activate(&self, id: &ClientId) -> Result<Client, DomainError> {
        let mut client = self.get_required(id).await?;

        if client.is_deleted() {
            return Err(DomainError::validation(
                "Deleted clients cannot be reactivated",
            ));
        }

        client.activate();
        self.repository.update(&client).await
    }

    /// Soft-delete a client. Keys are not cascade-deleted but stop
    /// validating because the pipeline checks the owning client.
    pub async fn delete(&self, id: &ClientId) -> Result<Client, DomainError> {
        let mut client = self.get_required(id).await?;
        client.mark_deleted();
        let updated = self.repository.update(&client).await?;

        info!(client_id = %id, "Client soft-deleted");
        Ok(updated)
    }

    async fn get_required(&self, id: &ClientId) -> Result<Client, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Client '{}' not found", id)))
    }
}
