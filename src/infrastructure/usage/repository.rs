//! In-memory usage repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::usage::{UsageAggregate, UsageQuery, UsageRecord, UsageRepository};
use crate::domain::DomainError;

/// In-memory implementation of [`UsageRepository`]
///
/// Append-only; rows leave only through `delete_before`.
#[derive(Debug, Default)]
pub struct InMemoryUsageRepository {
    records: RwLock<Vec<UsageRecord>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }

    async fn append_batch(&self, batch: Vec<UsageRecord>) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        records.extend(batch);
        Ok(())
    }

    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, DomainError> {
        let records = self.records.read().await;

        let mut result: Vec<UsageRecord> = records
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(result.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, query: &UsageQuery) -> Result<usize, DomainError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| query.matches(record)).count())
    }

    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageAggregate, DomainError> {
        let records = self.records.read().await;

        let mut aggregate = UsageAggregate::new();
        for record in records.iter().filter(|record| query.matches(record)) {
            aggregate.add_record(record);
        }

        Ok(aggregate)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.timestamp >= cutoff);
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::usage::AuthOutcome;

    fn record(key: &str, outcome: AuthOutcome, at: DateTime<Utc>) -> UsageRecord {
        let status = if outcome.is_success() { 200 } else { 401 };
        UsageRecord::new(
            "/v1/orders",
            "GET",
            "10.0.0.5".parse().unwrap(),
            outcome,
            status,
        )
        .with_api_key(key)
        .with_timestamp(at)
    }

    #[tokio::test]
    async fn test_append_and_query() {
        let repo = InMemoryUsageRepository::new();
        let now = Utc::now();

        repo.append(record("key-1", AuthOutcome::Success, now))
            .await
            .unwrap();
        repo.append(record("key-2", AuthOutcome::InvalidKey, now))
            .await
            .unwrap();

        let all = repo.query(&UsageQuery::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let key1_only = repo
            .query(&UsageQuery::new().with_api_key("key-1"))
            .await
            .unwrap();
        assert_eq!(key1_only.len(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_paginates() {
        let repo = InMemoryUsageRepository::new();
        let now = Utc::now();

        for i in 0..5 {
            repo.append(record(
                "key-1",
                AuthOutcome::Success,
                now - Duration::minutes(i),
            ))
            .await
            .unwrap();
        }

        let page = repo
            .query(&UsageQuery::new().with_limit(2).with_offset(1))
            .await
            .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].timestamp, now - Duration::minutes(1));
        assert_eq!(page[1].timestamp, now - Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_append_batch_and_count() {
        let repo = InMemoryUsageRepository::new();
        let now = Utc::now();

        repo.append_batch(vec![
            record("key-1", AuthOutcome::Success, now),
            record("key-1", AuthOutcome::RateLimited, now),
            record("key-2", AuthOutcome::Success, now),
        ])
        .await
        .unwrap();

        assert_eq!(repo.count(&UsageQuery::new()).await.unwrap(), 3);
        assert_eq!(
            repo.count(&UsageQuery::new().with_api_key("key-1"))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            repo.count(&UsageQuery::new().with_outcome(AuthOutcome::RateLimited))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_aggregate() {
        let repo = InMemoryUsageRepository::new();
        let now = Utc::now();

        repo.append_batch(vec![
            record("key-1", AuthOutcome::Success, now),
            record("key-1", AuthOutcome::Success, now),
            record("key-1", AuthOutcome::Expired, now),
        ])
        .await
        .unwrap();

        let aggregate = repo
            .aggregate(&UsageQuery::new().with_api_key("key-1"))
            .await
            .unwrap();

        assert_eq!(aggregate.total_requests, 3);
        assert_eq!(aggregate.successful_requests, 2);
        assert_eq!(aggregate.failed_requests, 1);
        assert_eq!(aggregate.by_status_code.get(&401), Some(&1));
    }

    #[tokio::test]
    async fn test_delete_before_purges_old_rows() {
        let repo = InMemoryUsageRepository::new();
        let now = Utc::now();

        repo.append_batch(vec![
            record("key-1", AuthOutcome::Success, now - Duration::days(100)),
            record("key-1", AuthOutcome::Success, now - Duration::days(10)),
            record("key-1", AuthOutcome::Success, now),
        ])
        .await
        .unwrap();

        let purged = repo
            .delete_before(now - Duration::days(30))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert_eq!(repo.count(&UsageQuery::new()).await.unwrap(), 2);
    }
}
