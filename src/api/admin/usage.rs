//! Usage reporting admin endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::ApiKeyId;
use crate::domain::usage::UsageAggregate;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageRangeQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyUsageResponse {
    pub api_key_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(flatten)]
    pub aggregate: UsageAggregate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurgeUsageQuery {
    pub before: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeUsageResponse {
    pub purged: usize,
    pub before: String,
}

/// GET /admin/api-keys/{key_id}/usage
pub async fn key_usage(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
    Query(range): Query<UsageRangeQuery>,
) -> Result<Json<KeyUsageResponse>, ApiError> {
    let id = ApiKeyId::new(key_id)?;

    // 404 for unknown keys instead of an empty aggregate
    state
        .api_keys
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key '{}' not found", id)))?;

    let aggregate = state
        .usage
        .aggregate_for_key(&id, range.from, range.to)
        .await?;

    Ok(Json(KeyUsageResponse {
        api_key_id: id.as_str().to_string(),
        from: range.from.map(|dt| dt.to_rfc3339()),
        to: range.to.map(|dt| dt.to_rfc3339()),
        aggregate,
    }))
}

/// DELETE /admin/usage?before=<timestamp>
pub async fn purge_usage(
    State(state): State<AppState>,
    Query(query): Query<PurgeUsageQuery>,
) -> Result<Json<PurgeUsageResponse>, ApiError> {
    debug!(before = %query.before, "Purging usage records");

    let purged = state.usage.purge_before(query.before).await?;

    Ok(Json(PurgeUsageResponse {
        purged,
        before: query.before.to_rfc3339(),
    }))
}
