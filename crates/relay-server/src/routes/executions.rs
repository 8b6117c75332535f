use axum::extract::{Path, Query, State};
use axum::Json;
use relay_core::event::PartitionKey;
use relay_core::reconcile::{ExecutionRecord, ReconcileStats, Reconciler};
use relay_core::store::EventStore;
use relay_core::RelayError;

use super::{join_error, PartitionParams};
use crate::error::AppError;
use crate::state::AppState;

/// Reconciled view of one partition.
pub(crate) struct PartitionView {
    pub reconciler: Reconciler,
    pub skipped: usize,
}

pub(crate) fn reconcile_partition(
    store: &dyn EventStore,
    partition: &PartitionKey,
) -> relay_core::Result<PartitionView> {
    let fetched = store.fetch(partition)?;
    let mut reconciler = Reconciler::new();
    reconciler.extend(fetched.events);
    Ok(PartitionView {
        reconciler,
        skipped: fetched.skipped,
    })
}

#[derive(serde::Serialize)]
struct ExecutionsResponse {
    partition_key: PartitionKey,
    stats: ReconcileStats,
    skipped_lines: usize,
    executions: Vec<ExecutionRecord>,
}

/// GET /api/executions?partitionKey=YYYYMMDD: canonical records, most recent first.
pub async fn list_executions(
    State(app): State<AppState>,
    Query(params): Query<PartitionParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let partition = params.key()?;
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let view = reconcile_partition(store.as_ref(), &partition)?;
        let response = ExecutionsResponse {
            stats: view.reconciler.stats(),
            skipped_lines: view.skipped,
            executions: view.reconciler.records(),
            partition_key: partition,
        };
        Ok::<_, RelayError>(serde_json::to_value(response)?)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(result))
}

/// GET /api/executions/{exec_id}?partitionKey=YYYYMMDD
pub async fn get_execution(
    State(app): State<AppState>,
    Path(exec_id): Path<String>,
    Query(params): Query<PartitionParams>,
) -> Result<Json<ExecutionRecord>, AppError> {
    let partition = params.key()?;
    let store = app.store.clone();
    let record = tokio::task::spawn_blocking(move || {
        reconcile_partition(store.as_ref(), &partition)?
            .reconciler
            .get(&exec_id)
            .ok_or(RelayError::ExecutionNotFound(exec_id))
    })
    .await
    .map_err(join_error)??;
    Ok(Json(record))
}
