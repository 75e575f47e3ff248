//! API key management admin endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{ApiKey, ApiKeyId, IpAllowEntry, KeyStatus, Scope};
use crate::domain::client::ClientId;
use crate::infrastructure::api_key::CreateApiKey;

/// Request to issue a new API key
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ip_allow_list: Vec<IpAllowEntryRequest>,
}

/// Request to update a key's name, rate limit or expiry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set true to clear an existing expiry
    #[serde(default)]
    pub clear_expiry: bool,
}

/// Full-replacement scope set
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceScopesRequest {
    pub scopes: Vec<String>,
}

/// Full-replacement IP allow-list
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceIpAllowListRequest {
    pub entries: Vec<IpAllowEntryRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAllowEntryRequest {
    pub rule: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to revoke a key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeApiKeyRequest {
    #[serde(default)]
    pub revoked_by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub status: Option<KeyStatus>,
}

/// API key response for the admin API; never contains the secret or hash
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub key_prefix: String,
    pub status: KeyStatus,
    pub scopes: Vec<String>,
    pub ip_allow_list: Vec<IpAllowEntryRequest>,
    pub rate_limit_per_minute: u32,
    pub expires_at: Option<String>,
    pub revoked_at: Option<String>,
    pub revoked_by: Option<String>,
    pub revocation_reason: Option<String>,
    pub last_used_at: Option<String>,
    pub last_used_ip: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ApiKeyResponse {
    fn from_entity(key: &ApiKey, status: KeyStatus) -> Self {
        Self {
            id: key.id().as_str().to_string(),
            client_id: key.client_id().as_str().to_string(),
            name: key.name().to_string(),
            key_prefix: key.key_prefix().to_string(),
            status,
            scopes: key.scopes().iter().map(|s| s.as_str().to_string()).collect(),
            ip_allow_list: key
                .ip_allow_list()
                .iter()
                .map(|entry| IpAllowEntryRequest {
                    rule: entry.rule.to_string(),
                    description: entry.description.clone(),
                })
                .collect(),
            rate_limit_per_minute: key.rate_limit_per_minute(),
            expires_at: key.expires_at().map(|dt| dt.to_rfc3339()),
            revoked_at: key.revoked_at().map(|dt| dt.to_rfc3339()),
            revoked_by: key.revoked_by().map(String::from),
            revocation_reason: key.revocation_reason().map(String::from),
            last_used_at: key.last_used_at().map(|dt| dt.to_rfc3339()),
            last_used_ip: key.last_used_ip().map(|ip| ip.to_string()),
            created_at: key.created_at().to_rfc3339(),
            updated_at: key.updated_at().to_rfc3339(),
        }
    }
}

/// Issuance response: the only place the plaintext secret ever appears
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKeyResponse {
    #[serde(flatten)]
    pub api_key: ApiKeyResponse,
    pub secret: String,
    pub warning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListApiKeysResponse {
    pub api_keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

fn parse_scopes(raw: Vec<String>) -> Result<Vec<Scope>, ApiError> {
    raw.into_iter()
        .map(|s| Scope::new(s).map_err(|e| ApiError::bad_request(e.to_string())))
        .collect()
}

fn parse_ip_entries(raw: Vec<IpAllowEntryRequest>) -> Result<Vec<IpAllowEntry>, ApiError> {
    raw.into_iter()
        .map(|entry| {
            let rule = entry
                .rule
                .parse()
                .map_err(|e: crate::domain::api_key::IpRuleParseError| {
                    ApiError::bad_request(e.to_string())
                })?;

            let mut parsed = IpAllowEntry::new(rule);
            if let Some(description) = entry.description {
                parsed = parsed.with_description(description);
            }
            Ok(parsed)
        })
        .collect()
}

/// POST /admin/clients/{client_id}/api-keys
pub async fn create_api_key(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<Json<IssuedApiKeyResponse>, ApiError> {
    let client_id = ClientId::new(client_id)?;
    debug!(client_id = %client_id, name = %request.name, "Issuing API key");

    let scopes = parse_scopes(request.scopes)?;
    let ip_allow_list = parse_ip_entries(request.ip_allow_list)?;

    let mut create = CreateApiKey::new(request.name, scopes).with_ip_allow_list(ip_allow_list);

    if let Some(rate_limit) = request.rate_limit_per_minute {
        create = create.with_rate_limit(rate_limit);
    }

    if let Some(expires_at) = request.expires_at {
        create = create.with_expiration(expires_at);
    }

    let issued = state.api_keys.create(&client_id, create).await?;
    let status = state.api_keys.status_of(&issued.api_key);

    Ok(Json(IssuedApiKeyResponse {
        api_key: ApiKeyResponse::from_entity(&issued.api_key, status),
        secret: issued.secret,
        warning: issued.warning.to_string(),
    }))
}

/// GET /admin/clients/{client_id}/api-keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<ListApiKeysResponse>, ApiError> {
    let client_id = ClientId::new(client_id)?;

    let keys = state
        .api_keys
        .list_by_client(&client_id, query.status)
        .await?;

    let responses: Vec<ApiKeyResponse> = keys
        .iter()
        .map(|key| ApiKeyResponse::from_entity(key, state.api_keys.status_of(key)))
        .collect();
    let total = responses.len();

    Ok(Json(ListApiKeysResponse {
        api_keys: responses,
        total,
    }))
}

/// GET /admin/api-keys/{key_id}
pub async fn get_api_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;

    let key = state
        .api_keys
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))?;

    let status = state.api_keys.status_of(&key);
    Ok(Json(ApiKeyResponse::from_entity(&key, status)))
}

/// PUT /admin/api-keys/{key_id}
pub async fn update_api_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Json(request): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;
    debug!(key_id = %id, "Updating API key");

    if let Some(name) = request.name {
        state.api_keys.rename(&id, &name).await?;
    }

    if let Some(rate_limit) = request.rate_limit_per_minute {
        state.api_keys.set_rate_limit(&id, rate_limit).await?;
    }

    if request.clear_expiry {
        state.api_keys.set_expiration(&id, None).await?;
    } else if let Some(expires_at) = request.expires_at {
        state.api_keys.set_expiration(&id, Some(expires_at)).await?;
    }

    let key = state
        .api_keys
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))?;

    let status = state.api_keys.status_of(&key);
    Ok(Json(ApiKeyResponse::from_entity(&key, status)))
}

/// PUT /admin/api-keys/{key_id}/scopes
pub async fn replace_scopes(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Json(request): Json<ReplaceScopesRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;

    let scopes = parse_scopes(request.scopes)?;
    let updated = state.api_keys.replace_scopes(&id, scopes).await?;

    let status = state.api_keys.status_of(&updated);
    Ok(Json(ApiKeyResponse::from_entity(&updated, status)))
}

/// PUT /admin/api-keys/{key_id}/ip-allow-list
pub async fn replace_ip_allow_list(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Json(request): Json<ReplaceIpAllowListRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;

    let entries = parse_ip_entries(request.entries)?;
    let updated = state.api_keys.replace_ip_allow_list(&id, entries).await?;

    let status = state.api_keys.status_of(&updated);
    Ok(Json(ApiKeyResponse::from_entity(&updated, status)))
}

/// POST /admin/api-keys/{key_id}/revoke
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Json(request): Json<RevokeApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;
    debug!(key_id = %id, "Revoking API key");

    let revoked = state
        .api_keys
        .revoke(&id, request.revoked_by, request.reason)
        .await?;

    let status = state.api_keys.status_of(&revoked);
    Ok(Json(ApiKeyResponse::from_entity(&revoked, status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_minimal() {
        let json = r#"{"name": "CI key"}"#;

        let request: CreateApiKeyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "CI key");
        assert!(request.scopes.is_empty());
        assert!(request.rate_limit_per_minute.is_none());
        assert!(request.ip_allow_list.is_empty());
    }

    #[test]
    fn test_create_request_full() {
        let json = r#"{
            "name": "Partner key",
            "scopes": ["orders:*", "customers:read"],
            "rate_limit_per_minute": 120,
            "expires_at": "2027-01-01T00:00:00Z",
            "ip_allow_list": [{"rule": "10.0.0.0/24", "description": "office"}]
        }"#;

        let request: CreateApiKeyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.scopes.len(), 2);
        assert_eq!(request.rate_limit_per_minute, Some(120));
        assert!(request.expires_at.is_some());
        assert_eq!(request.ip_allow_list[0].rule, "10.0.0.0/24");
    }

    #[test]
    fn test_parse_scopes_rejects_malformed() {
        assert!(parse_scopes(vec!["orders:read".to_string()]).is_ok());
        assert!(parse_scopes(vec!["not a scope".to_string()]).is_err());
    }

    #[test]
    fn test_parse_ip_entries_rejects_malformed() {
        let ok = parse_ip_entries(vec![IpAllowEntryRequest {
            rule: "10.0.0.0/24".to_string(),
            description: None,
        }]);
        assert!(ok.is_ok());

        let bad = parse_ip_entries(vec![IpAllowEntryRequest {
            rule: "10.0.0.0/99".to_string(),
            description: None,
        }]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_response_never_contains_hash() {
        let key = ApiKey::new(
            ApiKeyId::generate(),
            ClientId::generate(),
            "key",
            "sha256$salt$digest",
            "ak_live_abc12345",
            60,
        );

        let response = ApiKeyResponse::from_entity(&key, KeyStatus::Active);
        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("sha256$"));
        assert!(!json.contains("secret_hash"));
        assert!(json.contains("\"key_prefix\":\"ak_live_abc12345\""));
        assert!(json.contains("\"status\":\"active\""));
    }

    #[test]
    fn test_issued_response_contains_secret_and_warning() {
        let key = ApiKey::new(
            ApiKeyId::generate(),
            ClientId::generate(),
            "key",
            "sha256$salt$digest",
            "ak_live_abc12345",
            60,
        );

        let response = IssuedApiKeyResponse {
            api_key: ApiKeyResponse::from_entity(&key, KeyStatus::Active),
            secret: "ak_live_abc12345rest-of-secret".to_string(),
            warning: "Store this secret now.".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"secret\":\"ak_live_abc12345rest-of-secret\""));
        assert!(json.contains("\"warning\""));
    }

    #[test]
    fn test_status_query_deserialization() {
        let query: ListApiKeysQuery = serde_json::from_str(r#"{"status": "revoked"}"#).unwrap();
        assert_eq!(query.status, Some(KeyStatus::Revoked));
    }
}
