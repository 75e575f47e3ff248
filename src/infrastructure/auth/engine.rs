//! Authorization engine
//!
//! Composes the validation pipeline, the scope matcher and the rate limiter
//! into a single transport-agnostic decision. Framework adapters translate
//! an [`AuthzDecision`] into their own response and principal types; the
//! reference adapter is the axum middleware in `api::middleware::auth`.

use std::net::IpAddr;
use std::sync::Arc;

use crate::domain::api_key::{scope_set_allows, ApiKeyId, Scope};
use crate::domain::auth::{AuthFailure, ValidatedKey};
use crate::domain::clock::Clock;
use crate::infrastructure::api_key::{FixedWindowRateLimiter, RateLimitDecision};

use super::pipeline::ValidationPipeline;

/// A single authorization request
#[derive(Debug)]
pub struct AuthRequest<'a> {
    /// The presented secret, if any header carried one
    pub secret: Option<&'a str>,
    /// Caller IP
    pub client_ip: IpAddr,
    /// The one scope this operation requires
    pub required_scope: &'a Scope,
}

/// Outcome of an authorization request
#[derive(Debug)]
pub enum AuthzDecision {
    Allowed {
        key: ValidatedKey,
        rate: RateLimitDecision,
    },
    Denied {
        failure: AuthFailure,
        /// Set when the credential resolved before the denial (e.g. scope
        /// or rate-limit failures), so the attempt can be attributed
        api_key_id: Option<ApiKeyId>,
        /// Retry-After hint for rate-limit denials
        retry_after_secs: Option<u64>,
    },
}

impl AuthzDecision {
    fn denied(failure: AuthFailure) -> Self {
        Self::Denied {
            failure,
            api_key_id: None,
            retry_after_secs: None,
        }
    }
}

/// The engine behind every protected endpoint
#[derive(Debug)]
pub struct AuthEngine {
    pipeline: ValidationPipeline,
    rate_limiter: Arc<FixedWindowRateLimiter>,
    clock: Arc<dyn Clock>,
}

impl AuthEngine {
    pub fn new(
        pipeline: ValidationPipeline,
        rate_limiter: Arc<FixedWindowRateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pipeline,
            rate_limiter,
            clock,
        }
    }

    /// Validate the credential, match the required scope, then consume rate
    /// limit quota. Rate-limit denials short-circuit before the protected
    /// operation runs but are still attributable to the key.
    pub async fn authorize(&self, request: AuthRequest<'_>) -> AuthzDecision {
        let secret = request.secret.unwrap_or_default();

        let key = match self.pipeline.validate(secret, request.client_ip).await {
            Ok(key) => key,
            Err(failure) => return AuthzDecision::denied(failure),
        };

        if !scope_set_allows(&key.scopes, request.required_scope) {
            return AuthzDecision::Denied {
                failure: AuthFailure::InsufficientScope,
                api_key_id: Some(key.api_key_id),
                retry_after_secs: None,
            };
        }

        let rate = self
            .rate_limiter
            .try_acquire(key.api_key_id.as_str(), key.rate_limit_per_minute)
            .await;

        if !rate.allowed {
            return AuthzDecision::Denied {
                failure: AuthFailure::RateLimited,
                api_key_id: Some(key.api_key_id),
                retry_after_secs: Some(rate.retry_after_secs(self.clock.now())),
            };
        }

        AuthzDecision::Allowed { key, rate }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::api_key::{ApiKey, ApiKeyId};
    use crate::domain::api_key::ApiKeyRepository;
    use crate::domain::client::{Client, ClientId, ClientRepository};
    use crate::domain::clock::test::ManualClock;
    use crate::infrastructure::api_key::{InMemoryApiKeyRepository, KeyGenerator};
    use crate::infrastructure::client::InMemoryClientRepository;

    fn test_ip() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    struct Fixture {
        engine: AuthEngine,
        clock: Arc<ManualClock>,
        secret: String,
    }

    /// Engine over in-memory stores with one key: scopes `orders:*`, 2 rpm
    async fn fixture() -> Fixture {
        let keys = Arc::new(InMemoryApiKeyRepository::new());
        let clients = Arc::new(InMemoryClientRepository::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let generator = KeyGenerator::test();

        let client = Client::new(ClientId::generate(), "Acme Corp", "ops@example.com");
        let client_id = client.id().clone();
        clients.create(client).await.unwrap();

        let generated = generator.generate();
        let key = ApiKey::new(
            ApiKeyId::generate(),
            client_id,
            "key",
            &generated.hash,
            &generated.prefix,
            2,
        )
        .with_scopes(vec![Scope::new("orders:*").unwrap()]);
        keys.create(key).await.unwrap();

        let pipeline = ValidationPipeline::new(
            keys.clone(),
            clients.clone(),
            generator,
            clock.clone(),
        );
        let engine = AuthEngine::new(
            pipeline,
            Arc::new(FixedWindowRateLimiter::new(clock.clone())),
            clock.clone(),
        );

        Fixture {
            engine,
            clock,
            secret: generated.secret,
        }
    }

    fn scope(s: &str) -> Scope {
        Scope::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_with_matching_scope() {
        let f = fixture().await;

        let decision = f
            .engine
            .authorize(AuthRequest {
                secret: Some(&f.secret),
                client_ip: test_ip(),
                required_scope: &scope("orders:read"),
            })
            .await;

        match decision {
            AuthzDecision::Allowed { key, rate } => {
                assert_eq!(key.client_name, "Acme Corp");
                assert!(rate.allowed);
                assert_eq!(rate.remaining, 1);
            }
            other => panic!("expected Allowed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_secret_denied() {
        let f = fixture().await;

        let decision = f
            .engine
            .authorize(AuthRequest {
                secret: None,
                client_ip: test_ip(),
                required_scope: &scope("orders:read"),
            })
            .await;

        match decision {
            AuthzDecision::Denied {
                failure,
                api_key_id,
                ..
            } => {
                assert_eq!(failure, AuthFailure::MissingCredential);
                assert!(api_key_id.is_none());
            }
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insufficient_scope_is_attributed() {
        let f = fixture().await;

        let decision = f
            .engine
            .authorize(AuthRequest {
                secret: Some(&f.secret),
                client_ip: test_ip(),
                required_scope: &scope("customers:read"),
            })
            .await;

        match decision {
            AuthzDecision::Denied {
                failure,
                api_key_id,
                retry_after_secs,
            } => {
                assert_eq!(failure, AuthFailure::InsufficientScope);
                assert!(api_key_id.is_some());
                assert!(retry_after_secs.is_none());
            }
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_denial_carries_retry_after() {
        let f = fixture().await;
        let required = scope("orders:read");
        let request = || AuthRequest {
            secret: Some(&f.secret),
            client_ip: test_ip(),
            required_scope: &required,
        };

        assert!(matches!(
            f.engine.authorize(request()).await,
            AuthzDecision::Allowed { .. }
        ));
        assert!(matches!(
            f.engine.authorize(request()).await,
            AuthzDecision::Allowed { .. }
        ));

        match f.engine.authorize(request()).await {
            AuthzDecision::Denied {
                failure,
                api_key_id,
                retry_after_secs,
            } => {
                assert_eq!(failure, AuthFailure::RateLimited);
                assert!(api_key_id.is_some());
                let retry = retry_after_secs.unwrap();
                assert!(retry >= 1 && retry <= 60);
            }
            other => panic!("expected Denied, got {:?}", other),
        }

        // The window rolls over and requests flow again
        f.clock.advance(Duration::seconds(61));
        assert!(matches!(
            f.engine.authorize(request()).await,
            AuthzDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_scope_failure_does_not_consume_quota() {
        let f = fixture().await;

        for _ in 0..5 {
            f.engine
                .authorize(AuthRequest {
                    secret: Some(&f.secret),
                    client_ip: test_ip(),
                    required_scope: &scope("customers:read"),
                })
                .await;
        }

        // The quota of 2 is untouched by the scope denials
        let decision = f
            .engine
            .authorize(AuthRequest {
                secret: Some(&f.secret),
                client_ip: test_ip(),
                required_scope: &scope("orders:read"),
            })
            .await;
        assert!(matches!(decision, AuthzDecision::Allowed { .. }));
    }
}
