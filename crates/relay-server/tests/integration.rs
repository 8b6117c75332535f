use axum::http::StatusCode;
use http_body_util::BodyExt;
use relay_core::event::{LogEvent, PartitionKey};
use relay_core::store::{EventStore, JsonlEventStore};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROUTING: &str = r##"{
    "defaults": {
        "chat": { "target": "#alerts" },
        "incident": { "target": "ops-default" }
    },
    "teams": {
        "payments": { "chat": { "target": "#payments" } },
        "platform": { "chat": { "target": "#platform" } }
    },
    "rules": [
        {
            "name": "payments-failures",
            "when": { "statusIn": ["failed", "error"] },
            "then": [ { "type": "chat", "team": "payments" } ]
        },
        {
            "name": "everything",
            "when": { "any": "*" },
            "then": [ { "type": "chat", "team": "platform" } ]
        }
    ]
}"##;

/// A project with a routing document, chat secrets, and one day of events.
fn init_project(dir: &TempDir) {
    let config = relay_core::config::RoutingConfig::parse(ROUTING).unwrap();
    config.save(dir.path()).unwrap();
    relay_core::credentials::set_secrets(
        dir.path(),
        &[("CHAT_TOKEN_DEFAULT".to_string(), "tok-default".to_string())],
    )
    .unwrap();

    let store = JsonlEventStore::new(dir.path());
    store
        .append(
            &PartitionKey::parse("20250915").unwrap(),
            &[
                LogEvent::new("E1", "pending", "2025-09-15T10:00:00Z"),
                LogEvent::new("E1", "running", "2025-09-15T10:05:00Z"),
                LogEvent::new("E1", "failed", "2025-09-15T10:06:00Z"),
                LogEvent::new("E2", "running", "2025-09-15T10:05:00Z"),
                LogEvent::new("E2", "succeeded", "2025-09-15T10:10:00Z"),
            ],
        )
        .unwrap();
}

async fn send(app: axum::Router, req: axum::http::Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    send(app, req).await
}

/// Send a request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn with_json(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, req).await
}

// ---------------------------------------------------------------------------
// Health / executions / logs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_ok() {
    let dir = TempDir::new().unwrap();
    let (status, json) = get(relay_server::build_router(dir.path().to_path_buf()), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn executions_are_reconciled() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/executions?partitionKey=20250915").await;
    assert_eq!(status, StatusCode::OK);
    let executions = json["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0]["exec_id"], "E2");
    assert_eq!(executions[0]["status"], "succeeded");
    assert_eq!(executions[1]["exec_id"], "E1");
    assert_eq!(executions[1]["status"], "failed");
    assert_eq!(executions[1]["timestamp"], "2025-09-15T10:06:00Z");
}

#[tokio::test]
async fn single_execution_and_404() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app.clone(), "/api/executions/E1?partitionKey=20250915").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["event_count"], 3);

    let (status, json) = get(app, "/api/executions/nope?partitionKey=20250915").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn invalid_partition_key_is_400() {
    let dir = TempDir::new().unwrap();
    let app = relay_server::build_router(dir.path().to_path_buf());
    let (status, _) = get(app, "/api/executions?partitionKey=2025-09-15").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logs_are_filtered_and_ordered() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());
    let (status, json) = get(app, "/api/logs?partitionKey=20250915&execId=E1&order=asc&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["status"], "pending");
    assert_eq!(events[1]["status"], "running");
}

// ---------------------------------------------------------------------------
// Routing config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn routing_config_round_trip() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());

    let (status, json) = get(app.clone(), "/api/routing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["rules"].as_array().unwrap().len(), 2);
    assert_eq!(json["secret_configured"]["defaults"]["chat"], true);

    let mut doc = json["config"].clone();
    doc["teams"]["payments"]["chat"]["secret"] = serde_json::json!("tok-pay");
    let (status, json) = with_json(app.clone(), "PUT", "/api/routing", doc).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["secret_configured"]["teams"]["payments"]["chat"], true);

    let on_disk = std::fs::read_to_string(relay_core::paths::routing_path(dir.path())).unwrap();
    assert!(!on_disk.contains("tok-pay"));
}

#[tokio::test]
async fn routing_put_rejects_errors_with_findings() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());
    let doc = serde_json::json!({
        "rules": [
            { "when": { "any": "*", "namespace": "x" }, "then": [ { "type": "chat" } ] }
        ]
    });
    let (status, json) = with_json(app.clone(), "PUT", "/api/routing", doc).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!json["warnings"].as_array().unwrap().is_empty());

    // The previous document is untouched.
    let (_, json) = get(app, "/api/routing").await;
    assert_eq!(json["config"]["rules"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn routing_put_malformed_is_400() {
    let dir = TempDir::new().unwrap();
    let app = relay_server::build_router(dir.path().to_path_buf());
    let doc = serde_json::json!({ "rules": [ { "when": { "bogus": 1 }, "then": [] } ] });
    let (status, _) = with_json(app, "PUT", "/api/routing", doc).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_execution_goes_to_both_teams() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let app = relay_server::build_router(dir.path().to_path_buf());
    let (status, json) = with_json(
        app,
        "POST",
        "/api/executions/E1/route?partitionKey=20250915",
        serde_json::Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reason"], "matched");
    let instructions = json["instructions"].as_array().unwrap();
    assert_eq!(instructions.len(), 2);
    assert_eq!(instructions[0]["target"], "#payments");
    assert_eq!(instructions[1]["target"], "#platform");
    // Neither team has its own secret; both fall back to the default.
    assert_eq!(instructions[0]["scope"], "default");
    assert_eq!(instructions[0]["secret"], "***");
}

#[tokio::test]
async fn preview_reports_missing_credentials_per_action() {
    let dir = TempDir::new().unwrap();
    let config = relay_core::config::RoutingConfig::parse(
        r##"{ "rules": [ { "when": { "any": "*" }, "then": [ { "type": "incident" }, { "type": "chat", "channel": "#x" } ] } ] }"##,
    )
    .unwrap();
    config.save(dir.path()).unwrap();
    relay_core::credentials::set_secrets(
        dir.path(),
        &[("CHAT_TOKEN_DEFAULT".to_string(), "tok".to_string())],
    )
    .unwrap();

    let app = relay_server::build_router(dir.path().to_path_buf());
    let body = serde_json::json!({ "exec_id": "E9", "status": "failed" });
    let (status, json) = with_json(app, "POST", "/api/route", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["instructions"].as_array().unwrap().len(), 1);
    assert_eq!(json["failures"].as_array().unwrap().len(), 1);
    assert_eq!(json["failures"][0]["channel"], "incident");
}

#[tokio::test]
async fn preview_accepts_unrecognized_severity_label() {
    let dir = TempDir::new().unwrap();
    let config = relay_core::config::RoutingConfig::parse(
        r##"{ "rules": [ { "when": { "any": "*" }, "then": [ { "type": "chat", "channel": "#x" } ] } ] }"##,
    )
    .unwrap();
    config.save(dir.path()).unwrap();

    let app = relay_server::build_router(dir.path().to_path_buf());
    let body = serde_json::json!({
        "exec_id": "E10",
        "status": "failed",
        "timestamp": "2025-09-15T10:06:00Z",
        "severity": "critical"
    });
    let (status, json) = with_json(app, "POST", "/api/route", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reason"], "matched");
}
