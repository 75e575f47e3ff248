//! Usage record entities
//!
//! One immutable row per authentication attempt, success or failure. Rows
//! are only ever removed by the bulk retention purge.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::auth::AuthFailure;

/// Unique identifier for a usage record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageRecordId(String);

impl UsageRecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("usage-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UsageRecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UsageRecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UsageRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome recorded for an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    Success,
    MissingCredential,
    InvalidKey,
    Revoked,
    Inactive,
    Expired,
    IpNotAllowed,
    InsufficientScope,
    RateLimited,
    StoreUnavailable,
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::MissingCredential => "missing_credential",
            Self::InvalidKey => "invalid_key",
            Self::Revoked => "revoked",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::IpNotAllowed => "ip_not_allowed",
            Self::InsufficientScope => "insufficient_scope",
            Self::RateLimited => "rate_limited",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl From<&AuthFailure> for AuthOutcome {
    fn from(failure: &AuthFailure) -> Self {
        match failure {
            AuthFailure::MissingCredential => Self::MissingCredential,
            AuthFailure::InvalidKey => Self::InvalidKey,
            AuthFailure::Revoked => Self::Revoked,
            AuthFailure::Inactive => Self::Inactive,
            AuthFailure::Expired => Self::Expired,
            AuthFailure::IpNotAllowed => Self::IpNotAllowed,
            AuthFailure::InsufficientScope => Self::InsufficientScope,
            AuthFailure::RateLimited => Self::RateLimited,
            AuthFailure::StoreUnavailable => Self::StoreUnavailable,
        }
    }
}

impl std::fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single authentication attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique ID
    id: UsageRecordId,
    /// Key the attempt resolved to; None when the credential never resolved
    pub api_key_id: Option<String>,
    /// Request path
    pub endpoint: String,
    /// HTTP method
    pub method: String,
    /// Caller IP
    pub client_ip: IpAddr,
    /// When the attempt happened
    pub timestamp: DateTime<Utc>,
    /// Pipeline outcome
    pub outcome: AuthOutcome,
    /// Resulting HTTP status code
    pub status_code: u16,
    /// Request latency in milliseconds
    pub latency_ms: u64,
    /// Internal error detail for operator diagnosis
    pub error_detail: Option<String>,
}

impl UsageRecord {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        client_ip: IpAddr,
        outcome: AuthOutcome,
        status_code: u16,
    ) -> Self {
        Self {
            id: UsageRecordId::generate(),
            api_key_id: None,
            endpoint: endpoint.into(),
            method: method.into(),
            client_ip,
            timestamp: Utc::now(),
            outcome,
            status_code,
            latency_ms: 0,
            error_detail: None,
        }
    }

    pub fn with_api_key(mut self, api_key_id: impl Into<String>) -> Self {
        self.api_key_id = Some(api_key_id.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &UsageRecordId {
        &self.id
    }
}

/// Aggregated usage for a key over a time range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageAggregate {
    /// Total number of attempts
    pub total_requests: u64,
    /// Attempts that authenticated and completed
    pub successful_requests: u64,
    /// Denied or failed attempts
    pub failed_requests: u64,
    /// Average latency in milliseconds
    pub avg_latency_ms: f64,
    /// Attempts per endpoint
    pub by_endpoint: HashMap<String, u64>,
    /// Attempts per resulting status code
    pub by_status_code: HashMap<u16, u64>,
}

impl UsageAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a record into the aggregate
    pub fn add_record(&mut self, record: &UsageRecord) {
        self.total_requests += 1;

        if record.outcome.is_success() {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        // Running average latency
        let prev_total = self.avg_latency_ms * (self.total_requests - 1) as f64;
        self.avg_latency_ms = (prev_total + record.latency_ms as f64) / self.total_requests as f64;

        *self.by_endpoint.entry(record.endpoint.clone()).or_insert(0) += 1;
        *self.by_status_code.entry(record.status_code).or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }

        self.successful_requests as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ip() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[test]
    fn test_usage_record_creation() {
        let record = UsageRecord::new("/v1/orders", "GET", test_ip(), AuthOutcome::Success, 200)
            .with_api_key("key-1")
            .with_latency_ms(12);

        assert!(record.id().as_str().starts_with("usage-"));
        assert_eq!(record.api_key_id, Some("key-1".to_string()));
        assert_eq!(record.endpoint, "/v1/orders");
        assert_eq!(record.status_code, 200);
        assert_eq!(record.latency_ms, 12);
        assert!(record.outcome.is_success());
    }

    #[test]
    fn test_unresolved_credential_has_no_key_id() {
        let record = UsageRecord::new("/v1/orders", "GET", test_ip(), AuthOutcome::InvalidKey, 401)
            .with_error_detail("invalid API key");

        assert!(record.api_key_id.is_none());
        assert_eq!(record.error_detail, Some("invalid API key".to_string()));
    }

    #[test]
    fn test_outcome_from_failure() {
        assert_eq!(
            AuthOutcome::from(&AuthFailure::Revoked),
            AuthOutcome::Revoked
        );
        assert_eq!(
            AuthOutcome::from(&AuthFailure::RateLimited),
            AuthOutcome::RateLimited
        );
    }

    #[test]
    fn test_aggregate_counts_and_breakdowns() {
        let mut aggregate = UsageAggregate::new();

        aggregate.add_record(
            &UsageRecord::new("/v1/orders", "GET", test_ip(), AuthOutcome::Success, 200)
                .with_latency_ms(10),
        );
        aggregate.add_record(
            &UsageRecord::new("/v1/orders", "POST", test_ip(), AuthOutcome::Success, 200)
                .with_latency_ms(30),
        );
        aggregate.add_record(
            &UsageRecord::new("/v1/reports", "GET", test_ip(), AuthOutcome::RateLimited, 429)
                .with_latency_ms(2),
        );

        assert_eq!(aggregate.total_requests, 3);
        assert_eq!(aggregate.successful_requests, 2);
        assert_eq!(aggregate.failed_requests, 1);
        assert!((aggregate.avg_latency_ms - 14.0).abs() < 0.01);
        assert_eq!(aggregate.by_endpoint.get("/v1/orders"), Some(&2));
        assert_eq!(aggregate.by_endpoint.get("/v1/reports"), Some(&1));
        assert_eq!(aggregate.by_status_code.get(&200), Some(&2));
        assert_eq!(aggregate.by_status_code.get(&429), Some(&1));
        assert!((aggregate.success_rate() - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_aggregate_success_rate() {
        assert_eq!(UsageAggregate::new().success_rate(), 0.0);
    }
}
