//! In-memory API key repository implementation

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, IpAllowEntry, KeyStatus, Scope,
};
use crate::domain::client::ClientId;
use crate::domain::DomainError;

/// In-memory implementation of [`ApiKeyRepository`]
///
/// The prefix index maps a prefix to the ids of all keys sharing it, so a
/// prefix collision degrades to a slightly larger candidate set instead of
/// an error.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: RwLock<HashMap<String, ApiKey>>,
    prefix_index: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;
        let mut prefix_index = self.prefix_index.write().await;

        let id = api_key.id().as_str().to_string();

        if keys.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "API key with ID '{}' already exists",
                id
            )));
        }

        if keys
            .values()
            .any(|existing| existing.secret_hash() == api_key.secret_hash())
        {
            return Err(DomainError::conflict(
                "API key with this secret hash already exists",
            ));
        }

        prefix_index
            .entry(api_key.key_prefix().to_string())
            .or_default()
            .push(id.clone());
        keys.insert(id, api_key.clone());

        Ok(api_key)
    }

    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id.as_str()).cloned())
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;
        let id = api_key.id().as_str().to_string();

        if !keys.contains_key(&id) {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )));
        }

        keys.insert(id, api_key.clone());
        Ok(api_key.clone())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let prefix_index = self.prefix_index.read().await;

        let Some(ids) = prefix_index.get(prefix) else {
            return Ok(Vec::new());
        };

        let keys = self.keys.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| keys.get(id).cloned())
            .collect())
    }

    async fn list_by_client(
        &self,
        client_id: &ClientId,
        status: Option<KeyStatus>,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        let now = Utc::now();

        let mut result: Vec<ApiKey> = keys
            .values()
            .filter(|key| key.client_id() == client_id)
            .filter(|key| status.is_none_or(|wanted| key.status(now) == wanted))
            .cloned()
            .collect();

        result.sort_by_key(|key| key.created_at());
        Ok(result)
    }

    async fn replace_scopes(
        &self,
        id: &ApiKeyId,
        scopes: Vec<Scope>,
    ) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        let key = keys
            .get_mut(id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        key.set_scopes(scopes);
        Ok(key.clone())
    }

    async fn replace_ip_allow_list(
        &self,
        id: &ApiKeyId,
        entries: Vec<IpAllowEntry>,
    ) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        let key = keys
            .get_mut(id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        key.set_ip_allow_list(entries);
        Ok(key.clone())
    }

    async fn record_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
        ip: IpAddr,
    ) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;

        let key = keys
            .get_mut(id.as_str())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        key.record_usage(at, ip);
        Ok(())
    }
}
