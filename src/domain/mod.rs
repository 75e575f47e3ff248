//! Domain layer - Core entities, contracts and invariants

pub mod api_key;
pub mod auth;
pub mod client;
pub mod clock;
pub mod error;
pub mod usage;

pub use api_key::{
    ip_allowed, scope_set_allows, ApiKey, ApiKeyId, ApiKeyRepository, IpAllowEntry, IpRule,
    KeyStatus, Scope,
};
pub use auth::{AuthFailure, ValidatedKey};
pub use client::{Client, ClientId, ClientRepository};
pub use clock::{Clock, SystemClock};
pub use error::DomainError;
pub use usage::{AuthOutcome, UsageAggregate, UsageQuery, UsageRecord, UsageRecordId, UsageRepository};
