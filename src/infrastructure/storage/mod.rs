//! Storage backends
//!
//! The in-memory repositories live with their domains; this module holds
//! the Postgres implementations of the same contracts.

mod postgres;

pub use postgres::{
    run_migrations, PostgresApiKeyRepository, PostgresClientRepository, PostgresUsageRepository,
};
