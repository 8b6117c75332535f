pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Executions
        .route("/api/executions", get(routes::executions::list_executions))
        .route(
            "/api/executions/{exec_id}",
            get(routes::executions::get_execution),
        )
        .route(
            "/api/executions/{exec_id}/route",
            post(routes::route::route_execution),
        )
        // Logs
        .route("/api/logs", get(routes::logs::query_logs))
        .route("/api/logs/partitions", get(routes::logs::list_partitions))
        // Routing config
        .route(
            "/api/routing",
            get(routes::routing::get_routing).put(routes::routing::put_routing),
        )
        .route(
            "/api/routing/validate",
            post(routes::routing::validate_routing),
        )
        // Route preview
        .route("/api/route", post(routes::route::route_context))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the relay API server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Start the relay API server on a pre-bound listener.
///
/// The caller can read the actual port before starting, which matters when
/// `port = 0` lets the OS pick one.
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root);

    tracing::info!("relay API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
