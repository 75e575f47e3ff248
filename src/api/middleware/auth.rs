//! API key authentication middleware
//!
//! The reference adapter for the engine: extracts the secret and caller IP,
//! asks the engine for a decision, maps denials to responses, and writes
//! exactly one usage record per attempt - carrying the final status and the
//! full request latency on the success path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, Extensions, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::Scope;
use crate::domain::auth::ValidatedKey;
use crate::domain::usage::{AuthOutcome, UsageRecord};
use crate::infrastructure::auth::{AuthRequest, AuthzDecision};

static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// The authenticated identity, available to handlers via request extensions
#[derive(Debug, Clone)]
pub struct AuthContext(pub ValidatedKey);

/// Per-route middleware state: the shared services plus the one scope this
/// route requires
#[derive(Clone)]
pub struct ScopedAuth {
    pub state: AppState,
    pub scope: Scope,
}

impl ScopedAuth {
    pub fn new(state: AppState, scope: Scope) -> Self {
        Self { state, scope }
    }
}

/// Authenticate, authorize against the route's scope, rate limit, and audit
pub async fn require_scope(
    State(scoped): State<ScopedAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let secret = extract_secret(request.headers(), &scoped.state.auth_header);
    let client_ip = client_ip(request.headers(), request.extensions());
    let endpoint = request.uri().path().to_string();
    let method = request.method().to_string();

    let decision = scoped
        .state
        .engine
        .authorize(AuthRequest {
            secret: secret.as_deref(),
            client_ip,
            required_scope: &scoped.scope,
        })
        .await;

    match decision {
        AuthzDecision::Allowed { key, rate } => {
            metrics::counter!("auth_attempts_total", "outcome" => "success").increment(1);

            let api_key_id = key.api_key_id.clone();
            request.extensions_mut().insert(AuthContext(key));

            let mut response = next.run(request).await;

            let headers = response.headers_mut();
            headers.insert(RATELIMIT_LIMIT.clone(), HeaderValue::from(rate.limit));
            headers.insert(RATELIMIT_REMAINING.clone(), HeaderValue::from(rate.remaining));

            scoped.state.usage_logger.log(
                UsageRecord::new(
                    endpoint,
                    method,
                    client_ip,
                    AuthOutcome::Success,
                    response.status().as_u16(),
                )
                .with_api_key(api_key_id.as_str())
                .with_latency_ms(started.elapsed().as_millis() as u64),
            );

            response
        }
        AuthzDecision::Denied {
            failure,
            api_key_id,
            retry_after_secs,
        } => {
            metrics::counter!("auth_attempts_total", "outcome" => failure.as_str()).increment(1);
            debug!(outcome = failure.as_str(), %client_ip, "Request denied");

            let error =
                ApiError::from_auth_failure(&failure, &scoped.state.auth_header, retry_after_secs);

            let mut record = UsageRecord::new(
                endpoint,
                method,
                client_ip,
                AuthOutcome::from(&failure),
                error.status.as_u16(),
            )
            .with_latency_ms(started.elapsed().as_millis() as u64)
            .with_error_detail(failure.to_string());

            if let Some(id) = api_key_id {
                record = record.with_api_key(id.as_str());
            }

            scoped.state.usage_logger.log(record);

            error.into_response()
        }
    }
}

/// Pull the secret from the configured header, falling back to a bearer
/// token. Returns None when neither is present.
fn extract_secret(headers: &HeaderMap, header_name: &str) -> Option<String> {
    if let Some(value) = headers.get(header_name) {
        if let Ok(value) = value.to_str() {
            return Some(value.trim().to_string());
        }
    }

    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    None
}

/// Caller IP: forwarded headers first (the service sits behind a proxy in
/// every real deployment), then the socket address
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse() {
                return ip;
            }
        }
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
