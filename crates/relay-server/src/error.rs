use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::config::ConfigWarning;
use relay_core::RelayError;

// ---------------------------------------------------------------------------
// Internal sentinels
// ---------------------------------------------------------------------------

/// Carries an explicit 404 through the `anyhow::Error` chain.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

/// A rejected routing document, with every validation finding so the
/// console can show them next to the editor.
#[derive(Debug)]
struct InvalidConfigError(Vec<ConfigWarning>);

impl std::fmt::Display for InvalidConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "routing config rejected: {} error(s)", self.0.iter().filter(|w| w.is_error()).count())
    }
}

impl std::error::Error for InvalidConfigError {}

// ---------------------------------------------------------------------------
// AppError, the unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(RelayError::InvalidQuery(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    /// Construct a 400 carrying validation findings.
    pub fn invalid_config(warnings: Vec<ConfigWarning>) -> Self {
        Self(InvalidConfigError(warnings).into())
    }
}

fn status_for(err: &RelayError) -> StatusCode {
    match err {
        RelayError::NotInitialized
        | RelayError::ConfigParse(_)
        | RelayError::ConfigInvalid(_)
        | RelayError::InvalidSeverity(_)
        | RelayError::InvalidPartitionKey(_)
        | RelayError::InvalidChannel(_)
        | RelayError::InvalidTeamName(_)
        | RelayError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        RelayError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
        RelayError::MissingCredential { .. } | RelayError::MissingTarget { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RelayError::DispatchFailed { .. } => StatusCode::BAD_GATEWAY,
        RelayError::Io(_) | RelayError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }
        if let Some(invalid) = self.0.downcast_ref::<InvalidConfigError>() {
            let body = serde_json::json!({
                "error": invalid.to_string(),
                "warnings": invalid.0,
            });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let status = self
            .0
            .downcast_ref::<RelayError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
