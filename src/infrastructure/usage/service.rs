//! Usage reporting service
//!
//! Read side of the audit trail: per-key aggregation over a time range and
//! the bulk retention purge. Writes go through the logger, never here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::api_key::ApiKeyId;
use crate::domain::usage::{UsageAggregate, UsageQuery, UsageRecord, UsageRepository};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct UsageService {
    repository: Arc<dyn UsageRepository>,
}

impl UsageService {
    pub fn new(repository: Arc<dyn UsageRepository>) -> Self {
        Self { repository }
    }

    /// Total/success/failure counts, average latency and per-endpoint /
    /// per-status breakdowns for one key over a time range
    pub async fn aggregate_for_key(
        &self,
        api_key_id: &ApiKeyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<UsageAggregate, DomainError> {
        let mut query = UsageQuery::new().with_api_key(api_key_id.as_str());
        query.from = from;
        query.to = to;

        self.repository.aggregate(&query).await
    }

    pub async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, DomainError> {
        self.repository.query(query).await
    }

    /// Retention purge: bulk-delete records older than the cutoff
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let purged = self.repository.delete_before(cutoff).await?;
        info!(purged, %cutoff, "Usage retention purge completed");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::usage::AuthOutcome;
    use crate::infrastructure::usage::InMemoryUsageRepository;

    fn record(key: &ApiKeyId, outcome: AuthOutcome, at: DateTime<Utc>) -> UsageRecord {
        let status = if outcome.is_success() { 200 } else { 401 };
        UsageRecord::new(
            "/v1/orders",
            "GET",
            "10.0.0.5".parse().unwrap(),
            outcome,
            status,
        )
        .with_api_key(key.as_str())
        .with_timestamp(at)
        .with_latency_ms(10)
    }

    #[tokio::test]
    async fn test_aggregate_for_key_respects_time_range() {
        let repository = Arc::new(InMemoryUsageRepository::new());
        let service = UsageService::new(repository.clone());
        let key_id = ApiKeyId::generate();
        let now = Utc::now();

        repository
            .append_batch(vec![
                record(&key_id, AuthOutcome::Success, now - Duration::hours(3)),
                record(&key_id, AuthOutcome::Success, now - Duration::minutes(30)),
                record(&key_id, AuthOutcome::InvalidKey, now - Duration::minutes(10)),
            ])
            .await
            .unwrap();

        let aggregate = service
            .aggregate_for_key(&key_id, Some(now - Duration::hours(1)), Some(now))
            .await
            .unwrap();

        assert_eq!(aggregate.total_requests, 2);
        assert_eq!(aggregate.successful_requests, 1);
        assert_eq!(aggregate.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_purge_before() {
        let repository = Arc::new(InMemoryUsageRepository::new());
        let service = UsageService::new(repository.clone());
        let key_id = ApiKeyId::generate();
        let now = Utc::now();

        repository
            .append_batch(vec![
                record(&key_id, AuthOutcome::Success, now - Duration::days(90)),
                record(&key_id, AuthOutcome::Success, now),
            ])
            .await
            .unwrap();

        let purged = service
            .purge_before(now - Duration::days(30))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        let remaining = service.query(&UsageQuery::new()).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }
}
