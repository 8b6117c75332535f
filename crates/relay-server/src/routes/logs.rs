use axum::extract::{Query, State};
use axum::Json;
use relay_core::event::PartitionKey;
use relay_core::query::LogQuery;
use relay_core::RelayError;
use serde::Deserialize;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogParams {
    pub partition_key: Option<String>,
    pub exec_id: Option<String>,
    pub status: Option<String>,
    /// Free-text search.
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub order: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/logs: raw events of one partition, filtered for the log viewer.
pub async fn query_logs(
    State(app): State<AppState>,
    Query(params): Query<LogParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let partition = super::PartitionParams {
        partition_key: params.partition_key.clone(),
    }
    .key()?;
    let query = LogQuery::from_params(
        params.exec_id,
        params.status,
        params.q,
        params.from.as_deref(),
        params.to.as_deref(),
        params.order.as_deref(),
        params.limit,
    )?;
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let fetched = store.fetch(&partition)?;
        let total = fetched.events.len();
        let events = query.apply(fetched.events);
        Ok::<_, RelayError>(serde_json::json!({
            "partition_key": partition,
            "total": total,
            "returned": events.len(),
            "skipped_lines": fetched.skipped,
            "events": events,
        }))
    })
    .await
    .map_err(join_error)??;
    Ok(Json(result))
}

/// GET /api/logs/partitions: partitions with stored events, newest first.
pub async fn list_partitions(
    State(app): State<AppState>,
) -> Result<Json<Vec<PartitionKey>>, AppError> {
    let store = app.store.clone();
    let mut partitions = tokio::task::spawn_blocking(move || store.partitions())
        .await
        .map_err(join_error)??;
    partitions.reverse();
    Ok(Json(partitions))
}
