//! API key management service
//!
//! Issuance, mutation and revocation. Validation of presented secrets lives
//! in the auth pipeline; this service is the administrative surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::api_key::{
    validate_key_name, validate_rate_limit, ApiKey, ApiKeyId, ApiKeyRepository, IpAllowEntry,
    KeyStatus, Scope,
};
use crate::domain::client::{ClientId, ClientRepository};
use crate::domain::clock::Clock;
use crate::domain::DomainError;

use super::generator::{GeneratedKey, KeyGenerator};
use super::rate_limiter::FixedWindowRateLimiter;

/// Warning returned alongside every freshly issued secret
pub const ONE_TIME_SECRET_WARNING: &str =
    "Store this secret now. It cannot be retrieved again; a lost secret requires issuing a new key.";

/// Result of issuing a new API key
///
/// The only place the plaintext secret ever leaves the engine.
#[derive(Debug)]
pub struct IssuedApiKey {
    pub api_key: ApiKey,
    pub secret: String,
    pub warning: &'static str,
}

/// Parameters for issuing a new key
#[derive(Debug, Clone)]
pub struct CreateApiKey {
    pub name: String,
    pub scopes: Vec<Scope>,
    pub rate_limit_per_minute: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_allow_list: Vec<IpAllowEntry>,
}

impl CreateApiKey {
    pub fn new(name: impl Into<String>, scopes: Vec<Scope>) -> Self {
        Self {
            name: name.into(),
            scopes,
            rate_limit_per_minute: None,
            expires_at: None,
            ip_allow_list: Vec::new(),
        }
    }

    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limit_per_minute = Some(requests_per_minute);
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_ip_allow_list(mut self, entries: Vec<IpAllowEntry>) -> Self {
        self.ip_allow_list = entries;
        self
    }
}

/// API key service
#[derive(Debug)]
pub struct ApiKeyService {
    keys: Arc<dyn ApiKeyRepository>,
    clients: Arc<dyn ClientRepository>,
    generator: KeyGenerator,
    rate_limiter: Arc<FixedWindowRateLimiter>,
    clock: Arc<dyn Clock>,
    default_rate_limit: u32,
}

impl ApiKeyService {
    pub fn new(
        keys: Arc<dyn ApiKeyRepository>,
        clients: Arc<dyn ClientRepository>,
        generator: KeyGenerator,
        rate_limiter: Arc<FixedWindowRateLimiter>,
        clock: Arc<dyn Clock>,
        default_rate_limit: u32,
    ) -> Self {
        Self {
            keys,
            clients,
            generator,
            rate_limiter,
            clock,
            default_rate_limit,
        }
    }

    /// Issue a new key under a client. The plaintext secret is returned
    /// exactly once.
    pub async fn create(
        &self,
        client_id: &ClientId,
        request: CreateApiKey,
    ) -> Result<IssuedApiKey, DomainError> {
        let generated = self.generator.generate();
        self.create_from_generated(client_id, request, generated)
            .await
    }

    /// Issue a key with a caller-supplied secret.
    ///
    /// Used for the bootstrap admin key and deterministic integration
    /// tests; production issuance always goes through [`Self::create`].
    pub async fn create_with_secret(
        &self,
        client_id: &ClientId,
        request: CreateApiKey,
        secret: &str,
    ) -> Result<IssuedApiKey, DomainError> {
        let generated = self.generator.from_secret(secret);
        self.create_from_generated(client_id, request, generated)
            .await
    }

    async fn create_from_generated(
        &self,
        client_id: &ClientId,
        request: CreateApiKey,
        generated: GeneratedKey,
    ) -> Result<IssuedApiKey, DomainError> {
        validate_key_name(&request.name).map_err(|e| DomainError::validation(e.to_string()))?;

        let rate_limit = request
            .rate_limit_per_minute
            .unwrap_or(self.default_rate_limit);
        validate_rate_limit(rate_limit).map_err(|e| DomainError::validation(e.to_string()))?;

        let client = self
            .clients
            .get(client_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Client '{}' not found", client_id)))?;

        if !client.is_usable() {
            return Err(DomainError::validation(format!(
                "Client '{}' is not active; cannot issue keys",
                client_id
            )));
        }

        let mut api_key = ApiKey::new(
            ApiKeyId::generate(),
            client_id.clone(),
            request.name.trim(),
            &generated.hash,
            &generated.prefix,
            rate_limit,
        )
        .with_scopes(request.scopes)
        .with_ip_allow_list(request.ip_allow_list);

        if let Some(expires_at) = request.expires_at {
            api_key = api_key.with_expiration(expires_at);
        }

        let created = self.keys.create(api_key).await?;

        info!(
            key_id = %created.id(),
            client_id = %client_id,
            prefix = %created.key_prefix(),
            "API key issued"
        );

        Ok(IssuedApiKey {
            api_key: created,
            secret: generated.secret,
            warning: ONE_TIME_SECRET_WARNING,
        })
    }

    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        self.keys.get(id).await
    }

    pub async fn list_by_client(
        &self,
        client_id: &ClientId,
        status: Option<KeyStatus>,
    ) -> Result<Vec<ApiKey>, DomainError> {
        self.keys.list_by_client(client_id, status).await
    }

    pub async fn rename(&self, id: &ApiKeyId, name: &str) -> Result<ApiKey, DomainError> {
        validate_key_name(name).map_err(|e| DomainError::validation(e.to_string()))?;

        let mut key = self.get_required(id).await?;
        key.set_name(name.trim());
        self.keys.update(&key).await
    }

    pub async fn set_rate_limit(
        &self,
        id: &ApiKeyId,
        requests_per_minute: u32,
    ) -> Result<ApiKey, DomainError> {
        validate_rate_limit(requests_per_minute)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let mut key = self.get_required(id).await?;
        key.set_rate_limit(requests_per_minute);
        let updated = self.keys.update(&key).await?;

        // Counters restart under the new ceiling
        self.rate_limiter.reset(id.as_str()).await;

        Ok(updated)
    }

    pub async fn set_expiration(
        &self,
        id: &ApiKeyId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, DomainError> {
        let mut key = self.get_required(id).await?;
        key.set_expiration(expires_at);
        self.keys.update(&key).await
    }

    /// Replace the full scope set atomically
    pub async fn replace_scopes(
        &self,
        id: &ApiKeyId,
        scopes: Vec<Scope>,
    ) -> Result<ApiKey, DomainError> {
        info!(key_id = %id, count = scopes.len(), "Replacing API key scopes");
        self.keys.replace_scopes(id, scopes).await
    }

    /// Replace the IP allow-list atomically
    pub async fn replace_ip_allow_list(
        &self,
        id: &ApiKeyId,
        entries: Vec<IpAllowEntry>,
    ) -> Result<ApiKey, DomainError> {
        info!(key_id = %id, count = entries.len(), "Replacing API key IP allow-list");
        self.keys.replace_ip_allow_list(id, entries).await
    }

    /// Revoke a key. Terminal; revoking an already-revoked key is a no-op
    /// that returns the stored state.
    pub async fn revoke(
        &self,
        id: &ApiKeyId,
        revoked_by: Option<String>,
        reason: Option<String>,
    ) -> Result<ApiKey, DomainError> {
        let mut key = self.get_required(id).await?;

        if key.is_revoked() {
            return Ok(key);
        }

        key.revoke(revoked_by, reason);
        let updated = self.keys.update(&key).await?;

        self.rate_limiter.reset(id.as_str()).await;

        info!(key_id = %id, "API key revoked");
        Ok(updated)
    }

    pub async fn deactivate(&self, id: &ApiKeyId) -> Result<ApiKey, DomainError> {
        let mut key = self.get_required(id).await?;
        key.deactivate();
        self.keys.update(&key).await
    }

    pub async fn activate(&self, id: &ApiKeyId) -> Result<ApiKey, DomainError> {
        let mut key = self.get_required(id).await?;

        if key.is_revoked() {
            return Err(DomainError::validation(
                "Revoked keys cannot be reactivated; issue a new key instead",
            ));
        }

        key.activate();
        self.keys.update(&key).await
    }

    /// Effective status of a key right now
    pub fn status_of(&self, key: &ApiKey) -> KeyStatus {
        key.status(self.clock.now())
    }

    async fn get_required(&self, id: &ApiKeyId) -> Result<ApiKey, DomainError> {
        self.keys
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }
}
