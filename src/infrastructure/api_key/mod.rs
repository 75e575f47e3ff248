//! API key infrastructure: generation, storage, rate limiting, management

mod generator;
mod rate_limiter;
mod repository;
mod service;

pub use generator::{GeneratedKey, KeyGenerator};
pub use rate_limiter::{FixedWindowRateLimiter, RateLimitDecision};
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeyService, CreateApiKey, IssuedApiKey, ONE_TIME_SECRET_WARNING};
