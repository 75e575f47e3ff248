//! Admin API
//!
//! Management endpoints are protected by the engine itself: each route
//! group requires a management scope, so operating the gateway needs a key
//! with `clients:manage` / `keys:manage` / `usage:*` grants (the bootstrap
//! admin key carries `*`).

pub mod api_keys;
pub mod clients;
pub mod usage;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use super::middleware::{require_scope, ScopedAuth};
use super::state::AppState;
use crate::domain::api_key::Scope;

pub fn create_admin_router(state: AppState) -> Router<AppState> {
    let clients_routes = Router::new()
        .route(
            "/clients",
            post(clients::create_client).get(clients::list_clients),
        )
        .route(
            "/clients/{client_id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route(
            "/clients/{client_id}/activate",
            post(clients::activate_client),
        )
        .route(
            "/clients/{client_id}/deactivate",
            post(clients::deactivate_client),
        )
        .route_layer(middleware::from_fn_with_state(
            ScopedAuth::new(state.clone(), Scope::new("clients:manage").unwrap()),
            require_scope,
        ));

    let keys_routes = Router::new()
        .route(
            "/clients/{client_id}/api-keys",
            post(api_keys::create_api_key).get(api_keys::list_api_keys),
        )
        .route(
            "/api-keys/{key_id}",
            get(api_keys::get_api_key).put(api_keys::update_api_key),
        )
        .route("/api-keys/{key_id}/scopes", put(api_keys::replace_scopes))
        .route(
            "/api-keys/{key_id}/ip-allow-list",
            put(api_keys::replace_ip_allow_list),
        )
        .route("/api-keys/{key_id}/revoke", post(api_keys::revoke_api_key))
        .route_layer(middleware::from_fn_with_state(
            ScopedAuth::new(state.clone(), Scope::new("keys:manage").unwrap()),
            require_scope,
        ));

    let usage_read_routes = Router::new()
        .route("/api-keys/{key_id}/usage", get(usage::key_usage))
        .route_layer(middleware::from_fn_with_state(
            ScopedAuth::new(state.clone(), Scope::new("usage:read").unwrap()),
            require_scope,
        ));

    let usage_manage_routes = Router::new()
        .route("/usage", delete(usage::purge_usage))
        .route_layer(middleware::from_fn_with_state(
            ScopedAuth::new(state, Scope::new("usage:manage").unwrap()),
            require_scope,
        ));

    Router::new()
        .merge(clients_routes)
        .merge(keys_routes)
        .merge(usage_read_routes)
        .merge(usage_manage_routes)
}
