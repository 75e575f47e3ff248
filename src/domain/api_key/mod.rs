//! API key domain
//!
//! Entities and contracts for long-lived API key credentials: the key
//! itself, its granted scopes, its IP allow-list and the store contract.

mod entity;
mod ip_allow;
mod repository;
mod scope;
mod validation;

pub use entity::{ApiKey, ApiKeyId, KeyStatus};
pub use ip_allow::{ip_allowed, IpAllowEntry, IpRule, IpRuleParseError};
pub use repository::ApiKeyRepository;
pub use scope::{scope_set_allows, Scope, ScopeParseError};
pub use validation::{validate_key_name, validate_rate_limit, KeyValidationError};
