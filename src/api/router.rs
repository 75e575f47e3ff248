use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::admin;
use super::health;
use super::state::AppState;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .route("/ready", get(health::ready_check))
        // Management API, guarded by the engine itself
        .nest("/admin", admin::create_admin_router(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::api_key::Scope;
    use crate::domain::client::{Client, ClientId, ClientRepository};
    use crate::domain::clock::SystemClock;
    use crate::domain::usage::{AuthOutcome, UsageQuery, UsageRepository};
    use crate::infrastructure::api_key::{
        ApiKeyService, CreateApiKey, FixedWindowRateLimiter, InMemoryApiKeyRepository,
        KeyGenerator,
    };
    use crate::infrastructure::auth::{AuthEngine, ValidationPipeline};
    use crate::infrastructure::client::{ClientService, InMemoryClientRepository};
    use crate::infrastructure::usage::{
        InMemoryUsageRepository, UsageLogger, UsageLoggerConfig, UsageService,
    };

    struct TestApp {
        router: Router,
        usage_repo: Arc<InMemoryUsageRepository>,
        admin_secret: String,
        limited_secret: String,
    }

    /// Full stack over in-memory stores, with an admin key (scope `*`) and
    /// a restricted key (scope `usage:read`, 2 rpm)
    async fn test_app() -> TestApp {
        let keys = Arc::new(InMemoryApiKeyRepository::new());
        let clients = Arc::new(InMemoryClientRepository::new());
        let usage_repo = Arc::new(InMemoryUsageRepository::new());
        let clock: Arc<dyn crate::domain::clock::Clock> = Arc::new(SystemClock);
        let generator = KeyGenerator::test();
        let rate_limiter = Arc::new(FixedWindowRateLimiter::new(clock.clone()));

        let client = Client::new(ClientId::generate(), "Acme Corp", "ops@example.com");
        let client_id = client.id().clone();
        clients.create(client).await.unwrap();

        let api_keys = Arc::new(ApiKeyService::new(
            keys.clone(),
            clients.clone(),
            generator.clone(),
            rate_limiter.clone(),
            clock.clone(),
            60,
        ));

        let admin = api_keys
            .create(
                &client_id,
                CreateApiKey::new("admin", vec![Scope::new("*").unwrap()]),
            )
            .await
            .unwrap();

        let limited = api_keys
            .create(
                &client_id,
                CreateApiKey::new("limited", vec![Scope::new("usage:read").unwrap()])
                    .with_rate_limit(2),
            )
            .await
            .unwrap();

        let pipeline =
            ValidationPipeline::new(keys.clone(), clients.clone(), generator, clock.clone());
        let engine = Arc::new(AuthEngine::new(pipeline, rate_limiter, clock.clone()));

        let state = AppState {
            clients: Arc::new(ClientService::new(clients)),
            api_keys,
            usage: Arc::new(UsageService::new(usage_repo.clone())),
            engine,
            usage_logger: UsageLogger::spawn(
                usage_repo.clone(),
                UsageLoggerConfig {
                    retry_backoff_ms: 1,
                    ..UsageLoggerConfig::default()
                },
            ),
            auth_header: "X-API-Key".to_string(),
        };

        TestApp {
            router: create_router_with_state(state),
            usage_repo,
            admin_secret: admin.secret,
            limited_secret: limited.secret,
        }
    }

    fn get_request(path: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path).method("GET");
        if let Some(secret) = secret {
            builder = builder.header("x-api-key", secret);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn usage_count(repo: &InMemoryUsageRepository, outcome: AuthOutcome) -> usize {
        for _ in 0..200 {
            let count = repo
                .count(&UsageQuery::new().with_outcome(outcome))
                .await
                .unwrap();
            if count > 0 {
                return count;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        0
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let app = test_app().await;

        let response = app
            .router
            .oneshot(get_request("/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized_with_challenge() {
        let app = test_app().await;

        let response = app
            .router
            .oneshot(get_request("/admin/clients", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(challenge.contains("X-API-Key"));

        assert_eq!(
            usage_count(&app.usage_repo, AuthOutcome::MissingCredential).await,
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_key_is_unauthorized() {
        let app = test_app().await;

        let response = app
            .router
            .oneshot(get_request(
                "/admin/clients",
                Some("ak_test_not-a-real-secret"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(usage_count(&app.usage_repo, AuthOutcome::InvalidKey).await, 1);
    }

    #[tokio::test]
    async fn test_admin_key_reaches_protected_route() {
        let app = test_app().await;

        let response = app
            .router
            .oneshot(get_request("/admin/clients", Some(&app.admin_secret)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
        assert!(response.headers().contains_key("x-ratelimit-remaining"));

        assert_eq!(usage_count(&app.usage_repo, AuthOutcome::Success).await, 1);
    }

    #[tokio::test]
    async fn test_scope_mismatch_is_forbidden() {
        let app = test_app().await;

        // `usage:read` does not cover `clients:manage`
        let response = app
            .router
            .oneshot(get_request("/admin/clients", Some(&app.limited_secret)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            usage_count(&app.usage_repo, AuthOutcome::InsufficientScope).await,
            1
        );
    }

    #[tokio::test]
    async fn test_rate_limited_request_gets_retry_after() {
        let app = test_app().await;
        // A route the limited key's scope covers; the key id segment only
        // has to parse, a 404 still exercises the full auth path
        let path = "/admin/api-keys/key-missing/usage";

        let ok1 = app
            .router
            .clone()
            .oneshot(get_request(path, Some(&app.limited_secret)))
            .await
            .unwrap();
        assert_eq!(ok1.status(), StatusCode::NOT_FOUND);

        let ok2 = app
            .router
            .clone()
            .oneshot(get_request(path, Some(&app.limited_secret)))
            .await
            .unwrap();
        assert_eq!(ok2.status(), StatusCode::NOT_FOUND);

        let limited = app
            .router
            .clone()
            .oneshot(get_request(path, Some(&app.limited_secret)))
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));

        assert_eq!(
            usage_count(&app.usage_repo, AuthOutcome::RateLimited).await,
            1
        );
    }
}
