//! Postgres-backed repositories
//!
//! Entities are stored as JSONB documents alongside the handful of columns
//! the specialized lookups filter on (prefix, client id, timestamps). The
//! hot-path operations stay single-row: prefix lookup hits an index and the
//! last-used update patches two JSON fields in place.

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, IpAllowEntry, KeyStatus, Scope,
};
use crate::domain::client::{Client, ClientId, ClientRepository};
use crate::domain::usage::{UsageAggregate, UsageQuery, UsageRecord, UsageRepository};
use crate::domain::DomainError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE,
    data JSONB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS clients_active_name_idx
    ON clients (name) WHERE NOT deleted;

CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    key_prefix TEXT NOT NULL,
    secret_hash TEXT NOT NULL UNIQUE,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS api_keys_prefix_idx ON api_keys (key_prefix);
CREATE INDEX IF NOT EXISTS api_keys_client_idx ON api_keys (client_id);

CREATE TABLE IF NOT EXISTS usage_records (
    id TEXT PRIMARY KEY,
    api_key_id TEXT,
    recorded_at TIMESTAMPTZ NOT NULL,
    outcome TEXT NOT NULL,
    data JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS usage_records_key_time_idx
    ON usage_records (api_key_id, recorded_at);
"#;

/// Create the schema if it does not exist yet
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(storage_error)?;
    }
    Ok(())
}

fn storage_error(e: sqlx::Error) -> DomainError {
    DomainError::storage(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn to_json<T: serde::Serialize>(entity: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(entity).map_err(|e| DomainError::storage(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| DomainError::storage(e.to_string()))
}

// ============================================================================
// Clients
// ============================================================================

#[derive(Debug, Clone)]
pub struct PostgresClientRepository {
    pool: PgPool,
}

impl PostgresClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    async fn create(&self, client: Client) -> Result<Client, DomainError> {
        let result = sqlx::query(
            "INSERT INTO clients (id, name, deleted, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(client.id().as_str())
        .bind(client.name())
        .bind(client.is_deleted())
        .bind(to_json(&client)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(client),
            Err(e) if is_unique_violation(&e) => Err(DomainError::conflict(format!(
                "Client named '{}' already exists",
                client.name()
            ))),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn get(&self, id: &ClientId) -> Result<Option<Client>, DomainError> {
        let row = sqlx::query("SELECT data FROM clients WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .transpose()
    }

    async fn update(&self, client: &Client) -> Result<Client, DomainError> {
        let result = sqlx::query(
            "UPDATE clients SET name = $2, deleted = $3, data = $4 WHERE id = $1",
        )
        .bind(client.id().as_str())
        .bind(client.name())
        .bind(client.is_deleted())
        .bind(to_json(client)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(DomainError::not_found(format!(
                "Client '{}' not found",
                client.id()
            ))),
            Ok(_) => Ok(client.clone()),
            Err(e) if is_unique_violation(&e) => Err(DomainError::conflict(format!(
                "Client named '{}' already exists",
                client.name()
            ))),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Client>, DomainError> {
        let row = sqlx::query("SELECT data FROM clients WHERE name = $1 AND NOT deleted")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .transpose()
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<Client>, DomainError> {
        let rows = sqlx::query(
            "SELECT data FROM clients WHERE $1 OR NOT deleted ORDER BY data->>'created_at'",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .collect()
    }
}

// ============================================================================
// API keys
// ============================================================================

#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read-modify-write of one key's document under a row lock
    async fn update_locked<F>(&self, id: &ApiKeyId, mutate: F) -> Result<ApiKey, DomainError>
    where
        F: FnOnce(&mut ApiKey),
    {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let row = sqlx::query("SELECT data FROM api_keys WHERE id = $1 FOR UPDATE")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        let mut key: ApiKey = from_json(row.get::<serde_json::Value, _>("data"))?;
        mutate(&mut key);

        sqlx::query("UPDATE api_keys SET data = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(to_json(&key)?)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(key)
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let result = sqlx::query(
            "INSERT INTO api_keys (id, client_id, key_prefix, secret_hash, data) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(api_key.id().as_str())
        .bind(api_key.client_id().as_str())
        .bind(api_key.key_prefix())
        .bind(api_key.secret_hash())
        .bind(to_json(&api_key)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(api_key),
            Err(e) if is_unique_violation(&e) => Err(DomainError::conflict(
                "API key with this ID or secret hash already exists",
            )),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query("SELECT data FROM api_keys WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .transpose()
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let done = sqlx::query("UPDATE api_keys SET data = $2 WHERE id = $1")
            .bind(api_key.id().as_str())
            .bind(to_json(api_key)?)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if done.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        Ok(api_key.clone())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query("SELECT data FROM api_keys WHERE key_prefix = $1")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .collect()
    }

    async fn list_by_client(
        &self,
        client_id: &ClientId,
        status: Option<KeyStatus>,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(
            "SELECT data FROM api_keys WHERE client_id = $1 ORDER BY data->>'created_at'",
        )
        .bind(client_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let now = Utc::now();
        let keys: Vec<ApiKey> = rows
            .into_iter()
            .map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .collect::<Result<_, _>>()?;

        Ok(keys
            .into_iter()
            .filter(|key| status.is_none_or(|wanted| key.status(now) == wanted))
            .collect())
    }

    async fn replace_scopes(
        &self,
        id: &ApiKeyId,
        scopes: Vec<Scope>,
    ) -> Result<ApiKey, DomainError> {
        self.update_locked(id, |key| key.set_scopes(scopes)).await
    }

    async fn replace_ip_allow_list(
        &self,
        id: &ApiKeyId,
        entries: Vec<IpAllowEntry>,
    ) -> Result<ApiKey, DomainError> {
        self.update_locked(id, |key| key.set_ip_allow_list(entries))
            .await
    }

    async fn record_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
        ip: IpAddr,
    ) -> Result<(), DomainError> {
        // Single-row in-place patch; no read-modify-write on the hot path
        let done = sqlx::query(
            "UPDATE api_keys SET data = jsonb_set(\
                 jsonb_set(data, '{last_used_at}', to_jsonb($2::timestamptz)),\
                 '{last_used_ip}', to_jsonb($3::text)\
             ) WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(at)
        .bind(ip.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if done.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                id
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Usage records
// ============================================================================

#[derive(Debug, Clone)]
pub struct PostgresUsageRepository {
    pool: PgPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_query(query: &UsageQuery, count_only: bool) -> sqlx::QueryBuilder<'_, sqlx::Postgres> {
        let mut builder = sqlx::QueryBuilder::new(if count_only {
            "SELECT COUNT(*) AS count FROM usage_records WHERE TRUE"
        } else {
            "SELECT data FROM usage_records WHERE TRUE"
        });

        if let Some(ref api_key_id) = query.api_key_id {
            builder.push(" AND api_key_id = ").push_bind(api_key_id.as_str());
        }

        if let Some(outcome) = query.outcome {
            builder.push(" AND outcome = ").push_bind(outcome.as_str());
        }

        if let Some(from) = query.from {
            builder.push(" AND recorded_at >= ").push_bind(from);
        }

        if let Some(to) = query.to {
            builder.push(" AND recorded_at < ").push_bind(to);
        }

        if !count_only {
            builder.push(" ORDER BY recorded_at DESC");

            if let Some(limit) = query.limit {
                builder.push(" LIMIT ").push_bind(limit as i64);
            }

            if let Some(offset) = query.offset {
                builder.push(" OFFSET ").push_bind(offset as i64);
            }
        }

        builder
    }
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn append(&self, record: UsageRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO usage_records (id, api_key_id, recorded_at, outcome, data) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id().as_str())
        .bind(record.api_key_id.as_deref())
        .bind(record.timestamp)
        .bind(record.outcome.as_str())
        .bind(to_json(&record)?)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn append_batch(&self, records: Vec<UsageRecord>) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        for record in &records {
            sqlx::query(
                "INSERT INTO usage_records (id, api_key_id, recorded_at, outcome, data) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(record.id().as_str())
            .bind(record.api_key_id.as_deref())
            .bind(record.timestamp)
            .bind(record.outcome.as_str())
            .bind(to_json(record)?)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)
    }

    async fn query(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, DomainError> {
        let mut builder = Self::select_query(query, false);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| from_json(row.get::<serde_json::Value, _>("data")))
            .collect()
    }

    async fn count(&self, query: &UsageQuery) -> Result<usize, DomainError> {
        let mut builder = Self::select_query(query, true);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.get::<i64, _>("count") as usize)
    }

    async fn aggregate(&self, query: &UsageQuery) -> Result<UsageAggregate, DomainError> {
        // Aggregation folds in Rust over the filtered rows; the breakdown
        // maps don't map cleanly onto one SQL statement
        let unpaged = UsageQuery {
            limit: None,
            offset: None,
            ..query.clone()
        };
        let records = self.query(&unpaged).await?;

        let mut aggregate = UsageAggregate::new();
        for record in &records {
            aggregate.add_record(record);
        }

        Ok(aggregate)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let done = sqlx::query("DELETE FROM usage_records WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(done.rows_affected() as usize)
    }
}
