//! Client management admin endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::client::{Client, ClientId};
use crate::infrastructure::client::{CreateClient, UpdateClient};

/// Request to register a new client
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

/// Request to update a client's descriptive fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListClientsQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Client response for the admin API
#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: String,
    pub name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub active: bool,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Client> for ClientResponse {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id().as_str().to_string(),
            name: client.name().to_string(),
            contact_email: client.contact_email().to_string(),
            contact_phone: client.contact_phone().map(String::from),
            active: client.is_active(),
            deleted: client.is_deleted(),
            created_at: client.created_at().to_rfc3339(),
            updated_at: client.updated_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListClientsResponse {
    pub clients: Vec<ClientResponse>,
    pub total: usize,
}

/// POST /admin/clients
pub async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClientRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    debug!(name = %request.name, "Creating client");

    let created = state
        .clients
        .create(CreateClient {
            name: request.name,
            contact_email: request.contact_email,
            contact_phone: request.contact_phone,
        })
        .await?;

    Ok(Json(ClientResponse::from(&created)))
}

/// GET /admin/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<ListClientsResponse>, ApiError> {
    let clients = state.clients.list(query.include_deleted).await?;

    let responses: Vec<ClientResponse> = clients.iter().map(ClientResponse::from).collect();
    let total = responses.len();

    Ok(Json(ListClientsResponse {
        clients: responses,
        total,
    }))
}

/// GET /admin/clients/{client_id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id = ClientId::new(client_id)?;

    let client = state
        .clients
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Client '{}' not found", id)))?;

    Ok(Json(ClientResponse::from(&client)))
}

/// PUT /admin/clients/{client_id}
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id = ClientId::new(client_id)?;
    debug!(client_id = %id, "Updating client");

    let updated = state
        .clients
        .update(
            &id,
            UpdateClient {
                name: request.name,
                contact_email: request.contact_email,
                contact_phone: request.contact_phone.map(Some),
            },
        )
        .await?;

    Ok(Json(ClientResponse::from(&updated)))
}

/// POST /admin/clients/{client_id}/deactivate
pub async fn deactivate_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id = ClientId::new(client_id)?;
    debug!(client_id = %id, "Deactivating client");

    let updated = state.clients.deactivate(&id).await?;
    Ok(Json(ClientResponse::from(&updated)))
}

/// POST /admin/clients/{client_id}/activate
pub async fn activate_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id = ClientId::new(client_id)?;

    let updated = state.clients.activate(&id).await?;
    Ok(Json(ClientResponse::from(&updated)))
}

/// DELETE /admin/clients/{client_id}
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let id = ClientId::new(client_id)?;
    debug!(client_id = %id, "Soft-deleting client");

    let deleted = state.clients.delete(&id).await?;
    Ok(Json(ClientResponse::from(&deleted)))
}
