use axum::extract::{Path, Query, State};
use axum::Json;
use relay_core::context::AlertContext;
use relay_core::credentials::ChainedSecrets;
use relay_core::route::{route, RoutingOutcome};
use relay_core::RelayError;
use serde_json::Value;

use super::executions::reconcile_partition;
use super::{join_error, PartitionParams};
use crate::error::AppError;
use crate::state::AppState;

fn route_with_current_config(app: &AppState, ctx: &AlertContext) -> Result<RoutingOutcome, RelayError> {
    let config = app.reload_config()?;
    let secrets = ChainedSecrets::standard(&app.root)?;
    Ok(route(ctx, &config, &secrets))
}

/// POST /api/route: preview routing for an ad-hoc alert context.
///
/// Nothing is dispatched. Secrets in the returned instructions are redacted.
pub async fn route_context(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<RoutingOutcome>, AppError> {
    let ctx: AlertContext = serde_json::from_value(body)
        .map_err(|e| AppError::bad_request(format!("invalid alert context: {e}")))?;
    if ctx.exec_id().trim().is_empty() {
        return Err(AppError::bad_request("exec_id is required"));
    }
    let ctx = ctx.enrich_from_resources();
    let outcome = tokio::task::spawn_blocking(move || route_with_current_config(&app, &ctx))
        .await
        .map_err(join_error)??;
    Ok(Json(outcome))
}

/// POST /api/executions/{exec_id}/route?partitionKey=YYYYMMDD: route a
/// stored execution as the dispatcher would see it.
pub async fn route_execution(
    State(app): State<AppState>,
    Path(exec_id): Path<String>,
    Query(params): Query<PartitionParams>,
) -> Result<Json<RoutingOutcome>, AppError> {
    let partition = params.key()?;
    let outcome = tokio::task::spawn_blocking(move || {
        let record = reconcile_partition(app.store.as_ref(), &partition)?
            .reconciler
            .get(&exec_id)
            .ok_or(RelayError::ExecutionNotFound(exec_id))?;
        let ctx = AlertContext::from(record).enrich_from_resources();
        route_with_current_config(&app, &ctx)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::route::RouteReason;
    use serde_json::json;

    fn app_with_routing(dir: &tempfile::TempDir) -> AppState {
        let config = relay_core::config::RoutingConfig::parse(
            r##"{
                "defaults": { "chat": { "target": "#alerts", "secret": "tok-default" } },
                "teams": { "payments": { "chat": { "target": "#payments", "secret": "tok-pay" } } },
                "rules": [
                    { "when": { "statusIn": ["failed"] }, "then": [ { "type": "chat", "team": "payments" } ] },
                    { "when": { "any": "*" }, "then": [ { "type": "chat" } ] }
                ]
            }"##,
        )
        .unwrap();
        config.save(dir.path()).unwrap();
        AppState::new(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn preview_routes_and_redacts() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app_with_routing(&dir);
        let body = json!({ "exec_id": "E1", "status": "failed", "timestamp": "2025-09-15T10:06:00Z" });
        let outcome = route_context(State(app), Json(body)).await.unwrap().0;
        assert_eq!(outcome.reason, RouteReason::Matched);
        assert_eq!(outcome.matched_rules, vec![0, 1]);
        let targets: Vec<&str> = outcome.instructions.iter().map(|i| i.target.as_str()).collect();
        assert_eq!(targets, vec!["#payments", "#alerts"]);

        let rendered = serde_json::to_string(&outcome).unwrap();
        assert!(!rendered.contains("tok-pay"));
        assert!(!rendered.contains("tok-default"));
    }

    #[tokio::test]
    async fn preview_requires_exec_id() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app_with_routing(&dir);
        let result = route_context(State(app), Json(json!({ "status": "failed" }))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn routes_stored_execution() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app_with_routing(&dir);
        let partition = relay_core::event::PartitionKey::parse("20250915").unwrap();
        app.store
            .append(
                &partition,
                &[
                    relay_core::event::LogEvent::new("E2", "running", "2025-09-15T10:05:00Z"),
                    relay_core::event::LogEvent::new("E2", "succeeded", "2025-09-15T10:10:00Z"),
                ],
            )
            .unwrap();
        let params = Query(PartitionParams {
            partition_key: Some("20250915".into()),
        });
        let outcome = route_execution(State(app), Path("E2".into()), params)
            .await
            .unwrap()
            .0;
        assert_eq!(outcome.status, "succeeded");
        assert_eq!(outcome.matched_rules, vec![1]);
    }
}
