//! Partner API Gateway
//!
//! API key authentication and authorization engine for a third-party-facing
//! API: credential issuance, the multi-stage validation pipeline,
//! scope-based authorization, per-key rate limiting and asynchronous usage
//! auditing.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use domain::api_key::{ApiKeyRepository, Scope};
use domain::client::ClientRepository;
use domain::clock::{Clock, SystemClock};
use domain::usage::UsageRepository;
use domain::DomainError;
use infrastructure::api_key::{
    ApiKeyService, CreateApiKey, FixedWindowRateLimiter, InMemoryApiKeyRepository, KeyGenerator,
};
use infrastructure::auth::{AuthEngine, ValidationPipeline};
use infrastructure::client::{ClientService, InMemoryClientRepository};
use infrastructure::storage::{
    run_migrations, PostgresApiKeyRepository, PostgresClientRepository, PostgresUsageRepository,
};
use infrastructure::usage::{
    InMemoryUsageRepository, UsageLogger, UsageLoggerConfig, UsageService,
};

/// Create the application state with all services initialized
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (client_repo, key_repo, usage_repo) = create_repositories(config).await?;

    let generator = KeyGenerator::new(&config.auth.key_marker);
    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(clock.clone()));

    let usage_logger = UsageLogger::spawn(
        usage_repo.clone(),
        UsageLoggerConfig {
            buffer_size: config.usage.buffer_size,
            batch_size: config.usage.batch_size,
            retry_attempts: config.usage.retry_attempts,
            retry_backoff_ms: config.usage.retry_backoff_ms,
        },
    );

    let clients = Arc::new(ClientService::new(client_repo.clone()));
    let api_keys = Arc::new(ApiKeyService::new(
        key_repo.clone(),
        client_repo.clone(),
        generator.clone(),
        rate_limiter.clone(),
        clock.clone(),
        config.rate_limit.default_requests_per_minute,
    ));
    let usage = Arc::new(UsageService::new(usage_repo));

    let pipeline = ValidationPipeline::new(key_repo, client_repo, generator, clock.clone());
    let engine = Arc::new(AuthEngine::new(pipeline, rate_limiter, clock));

    let bootstrap_secret = config
        .auth
        .bootstrap_admin_key
        .clone()
        .or_else(|| std::env::var("ADMIN_API_KEY").ok());

    if let Some(secret) = bootstrap_secret {
        create_bootstrap_admin_key(&clients, &api_keys, &secret).await?;
    }

    Ok(AppState {
        clients,
        api_keys,
        usage,
        engine,
        usage_logger,
        auth_header: config.auth.header_name.clone(),
    })
}

type Repositories = (
    Arc<dyn ClientRepository>,
    Arc<dyn ApiKeyRepository>,
    Arc<dyn UsageRepository>,
);

async fn create_repositories(config: &AppConfig) -> anyhow::Result<Repositories> {
    match config.storage.backend.as_str() {
        "postgres" => {
            let database_url = std::env::var("DATABASE_URL").map_err(|_| {
                anyhow::anyhow!("DATABASE_URL is required for the postgres storage backend")
            })?;

            info!("Connecting to PostgreSQL...");
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;

            run_migrations(&pool).await?;
            info!("PostgreSQL storage ready");

            Ok((
                Arc::new(PostgresClientRepository::new(pool.clone())),
                Arc::new(PostgresApiKeyRepository::new(pool.clone())),
                Arc::new(PostgresUsageRepository::new(pool)),
            ))
        }
        "memory" => {
            info!("Using in-memory storage");
            Ok((
                Arc::new(InMemoryClientRepository::new()),
                Arc::new(InMemoryApiKeyRepository::new()),
                Arc::new(InMemoryUsageRepository::new()),
            ))
        }
        other => Err(anyhow::anyhow!("Unknown storage backend '{}'", other)),
    }
}

const BOOTSTRAP_CLIENT_NAME: &str = "Platform Operators";

/// Create a full-access admin key from a configured secret, so a fresh
/// deployment can be managed before any other key exists
async fn create_bootstrap_admin_key(
    clients: &ClientService,
    api_keys: &ApiKeyService,
    secret: &str,
) -> anyhow::Result<()> {
    let client = match clients.find_by_name(BOOTSTRAP_CLIENT_NAME).await? {
        Some(client) => client,
        None => {
            clients
                .create(infrastructure::client::CreateClient {
                    name: BOOTSTRAP_CLIENT_NAME.to_string(),
                    contact_email: "ops@localhost".to_string(),
                    contact_phone: None,
                })
                .await?
        }
    };

    let scopes = vec![Scope::new("*").map_err(|e| anyhow::anyhow!(e.to_string()))?];

    match api_keys
        .create_with_secret(
            client.id(),
            CreateApiKey::new("Bootstrap Admin Key", scopes),
            secret,
        )
        .await
    {
        Ok(issued) => {
            info!(key_id = %issued.api_key.id(), "Bootstrap admin key created");
            Ok(())
        }
        // Restart with the same configured secret
        Err(DomainError::Conflict { .. }) => {
            info!("Bootstrap admin key already present");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
