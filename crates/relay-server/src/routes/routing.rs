use axum::extract::State;
use axum::Json;
use relay_core::config::{has_errors, ChannelSet, RoutingConfig};
use relay_core::types::ChannelKind;
use relay_core::RelayError;
use serde_json::{json, Map, Value};

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// `{ "chat": bool, "incident": bool }` for one credential scope.
fn secret_flags(set: &ChannelSet) -> Value {
    let mut flags = Map::new();
    for &kind in ChannelKind::all() {
        flags.insert(kind.to_string(), Value::Bool(set.secret_configured(kind)));
    }
    Value::Object(flags)
}

/// The document as the console edits it: secret-free, plus which scopes
/// have a secret stored.
fn routing_view(config: &RoutingConfig) -> Result<Value, RelayError> {
    let teams: Map<String, Value> = config
        .teams
        .iter()
        .map(|(name, set)| (name.clone(), secret_flags(set)))
        .collect();
    Ok(json!({
        "config": serde_json::to_value(config)?,
        "secret_configured": {
            "defaults": secret_flags(&config.defaults),
            "teams": teams,
        },
        "warnings": config.validate(),
    }))
}

fn parse_document(body: Value) -> Result<RoutingConfig, RelayError> {
    serde_json::from_value(body).map_err(|e| RelayError::ConfigParse(e.to_string()))
}

/// GET /api/routing: current routing config, freshly read from disk.
pub async fn get_routing(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let config = app.reload_config()?;
        routing_view(&config)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(result))
}

/// PUT /api/routing: replace the whole document.
///
/// Inline secrets in the body are moved to the secret store; the document on
/// disk never contains them. Validation errors reject the save with 400 and
/// the full list of findings.
pub async fn put_routing(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let config = parse_document(body)?;
    let warnings = config.validate();
    if has_errors(&warnings) {
        return Err(AppError::invalid_config(warnings));
    }
    let result = tokio::task::spawn_blocking(move || {
        config.save(&app.root)?;
        let saved = app.reload_config()?;
        routing_view(&saved)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(result))
}

/// POST /api/routing/validate: check a document without saving it.
pub async fn validate_routing(Json(body): Json<Value>) -> Result<Json<Value>, AppError> {
    let config = parse_document(body)?;
    let warnings = config.validate();
    Ok(Json(json!({
        "valid": !has_errors(&warnings),
        "warnings": warnings,
    })))
}
