//! Usage repository trait

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::record::{AuthOutcome, UsageAggregate, UsageRecord};
use crate::domain::DomainError;

/// Query parameters for usage records
#[derive(Debug, Clone, Default)]
pub struct UsageQuery {
    /// Filter by API key ID
    pub api_key_id: Option<String>,
    /// Filter by outcome
    pub outcome: Option<AuthOutcome>,
    /// Start timestamp (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// End timestamp (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records to return
    pub limit: Option<usize>,
    /// Offset for pagination
    pub offset: Option<usize>,
}

impl UsageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key_id: impl Into<String>) -> Self {
        self.api_key_id = Some(api_key_id.into());
        self
    }

    pub fn with_outcome(mut self, outcome: AuthOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a record passes the query's filters (ignores limit/offset)
    pub fn matches(&self, record: &UsageRecord) -> bool {
        if let Some(ref api_key_id) = self.api_key_id {
            if record.api_key_id.as_deref() != Some(api_key_id.as_str()) {
                return false;
            }
        }

        if let Some(outcome) = self.outcome {
            if record.outcome != outcome {
                return false;
            }
        }

        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }

        if let Some(to) = self.to {
            if record.timestamp >= to {
                return false;
            }
        }

        true
    }
}

/// Repository for append-only usage records
#[async_trait]
pub trait UsageRepository: Send + Sync + Debug {
    /// Append a single record
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError>;

    /// Append a batch of records
    async fn append_batch(&self, records: Vec<UsageRecord>) -> Result<(), DomainError>;

    /// Query records, newest first
    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, DomainError>;

    /// Count records matching a query
    async fn count(&self, query: &UsageQuery) -> Result<usize, DomainError>;

    /// Aggregate records matching a query
    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageAggregate, DomainError>;

    /// Retention purge: delete all records older than the cutoff
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError>;
}
