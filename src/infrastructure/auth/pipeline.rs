//! Credential validation pipeline
//!
//! An explicit, ordered list of check functions composed by one
//! coordinator. Each check is independently unit-testable and
//! short-circuits with a distinct internal failure code; the caller-facing
//! message never distinguishes "not found" from "wrong secret".
//!
//! Check order is load-bearing: revocation and inactivity are terminal
//! administrative states and must win over expiry, and all three precede
//! the IP allow-list.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::api_key::{ip_allowed, ApiKey, ApiKeyRepository};
use crate::domain::auth::{AuthFailure, ValidatedKey};
use crate::domain::client::{Client, ClientRepository};
use crate::domain::clock::Clock;
use crate::infrastructure::api_key::KeyGenerator;

/// The ordered validation state machine
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    keys: Arc<dyn ApiKeyRepository>,
    clients: Arc<dyn ClientRepository>,
    generator: KeyGenerator,
    clock: Arc<dyn Clock>,
}

impl ValidationPipeline {
    pub fn new(
        keys: Arc<dyn ApiKeyRepository>,
        clients: Arc<dyn ClientRepository>,
        generator: KeyGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            keys,
            clients,
            generator,
            clock,
        }
    }

    /// Run the full check sequence for a presented secret.
    ///
    /// On success, schedules a fire-and-forget last-used update that is not
    /// bound to the caller's cancellation.
    pub async fn validate(
        &self,
        secret: &str,
        client_ip: IpAddr,
    ) -> Result<ValidatedKey, AuthFailure> {
        check_presence(secret)?;

        let candidates = self.lookup_candidates(secret).await?;
        let key = check_secret(&self.generator, secret, candidates)?;

        check_not_revoked(&key)?;

        let client = self.owning_client(&key).await?;
        check_active(&key, client.as_ref())?;
        check_not_expired(&key, self.clock.now())?;
        check_ip_allowed(&key, client_ip)?;

        self.spawn_last_used_update(&key, client_ip);

        Ok(assemble_result(key, client))
    }

    async fn lookup_candidates(&self, secret: &str) -> Result<Vec<ApiKey>, AuthFailure> {
        let prefix = self.generator.extract_prefix(secret);
        debug!(prefix = %prefix, "Looking up API key candidates");

        self.keys.find_by_prefix(prefix).await.map_err(|e| {
            warn!("Credential store lookup failed: {}", e);
            AuthFailure::StoreUnavailable
        })
    }

    async fn owning_client(&self, key: &ApiKey) -> Result<Option<Client>, AuthFailure> {
        self.clients.get(key.client_id()).await.map_err(|e| {
            warn!("Credential store client lookup failed: {}", e);
            AuthFailure::StoreUnavailable
        })
    }

    /// Best-effort last-used tracking; detached from the request so neither
    /// cancellation nor a store hiccup can affect the validation result.
    fn spawn_last_used_update(&self, key: &ApiKey, client_ip: IpAddr) {
        let keys = self.keys.clone();
        let key_id = key.id().clone();
        let now = self.clock.now();

        tokio::spawn(async move {
            if let Err(e) = keys.record_last_used(&key_id, now, client_ip).await {
                warn!(key_id = %key_id, "Failed to record API key last-used: {}", e);
            }
        });
    }
}

// Individual checks, in pipeline order.

fn check_presence(secret: &str) -> Result<(), AuthFailure> {
    if secret.trim().is_empty() {
        return Err(AuthFailure::MissingCredential);
    }
    Ok(())
}

/// Verify the presented secret against every candidate's stored hash.
///
/// Each comparison is constant-time; an empty candidate set and a hash
/// mismatch both surface as `InvalidKey`.
fn check_secret(
    generator: &KeyGenerator,
    secret: &str,
    candidates: Vec<ApiKey>,
) -> Result<ApiKey, AuthFailure> {
    candidates
        .into_iter()
        .find(|candidate| generator.verify_secret(secret, candidate.secret_hash()))
        .ok_or(AuthFailure::InvalidKey)
}

fn check_not_revoked(key: &ApiKey) -> Result<(), AuthFailure> {
    if key.is_revoked() {
        return Err(AuthFailure::Revoked);
    }
    Ok(())
}

fn check_active(key: &ApiKey, client: Option<&Client>) -> Result<(), AuthFailure> {
    if !key.is_active() {
        return Err(AuthFailure::Inactive);
    }

    match client {
        Some(client) if client.is_usable() => Ok(()),
        // A missing owner row is treated the same as a deactivated one
        _ => Err(AuthFailure::Inactive),
    }
}

fn check_not_expired(key: &ApiKey, now: chrono::DateTime<chrono::Utc>) -> Result<(), AuthFailure> {
    if key.is_expired_at(now) {
        return Err(AuthFailure::Expired);
    }
    Ok(())
}

fn check_ip_allowed(key: &ApiKey, client_ip: IpAddr) -> Result<(), AuthFailure> {
    if !ip_allowed(key.ip_allow_list(), client_ip) {
        return Err(AuthFailure::IpNotAllowed);
    }
    Ok(())
}

fn assemble_result(key: ApiKey, client: Option<Client>) -> ValidatedKey {
    let client_name = client.map(|c| c.name().to_string()).unwrap_or_default();

    ValidatedKey {
        api_key_id: key.id().clone(),
        client_id: key.client_id().clone(),
        client_name,
        scopes: key.scopes().to_vec(),
        rate_limit_per_minute: key.rate_limit_per_minute(),
    }
}
