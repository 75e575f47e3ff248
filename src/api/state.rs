//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::api_key::ApiKeyService;
use crate::infrastructure::auth::AuthEngine;
use crate::infrastructure::client::ClientService;
use crate::infrastructure::usage::{UsageLogger, UsageService};

/// Shared services handed to every handler and middleware layer
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<ClientService>,
    pub api_keys: Arc<ApiKeyService>,
    pub usage: Arc<UsageService>,
    pub engine: Arc<AuthEngine>,
    pub usage_logger: UsageLogger,
    /// Header the engine expects the secret in
    pub auth_header: String,
}
