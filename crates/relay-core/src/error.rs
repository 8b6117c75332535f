use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("not initialized: run 'relay init'")]
    NotInitialized,

    #[error("routing config is malformed: {0}")]
    ConfigParse(String),

    #[error("routing config rejected: {0}")]
    ConfigInvalid(String),

    #[error("no secret configured for {channel} channel (team: {})", team.as_deref().unwrap_or("default"))]
    MissingCredential {
        channel: String,
        team: Option<String>,
    },

    #[error("no target configured for {channel} channel (team: {})", team.as_deref().unwrap_or("default"))]
    MissingTarget {
        channel: String,
        team: Option<String>,
    },

    #[error("invalid severity '{0}': expected Sev0..Sev4")]
    InvalidSeverity(String),

    #[error("invalid partition key '{0}': expected YYYYMMDD")]
    InvalidPartitionKey(String),

    #[error("unknown channel '{0}': must be chat or incident")]
    InvalidChannel(String),

    #[error("invalid team name '{0}': must be alphanumeric with hyphens or underscores")]
    InvalidTeamName(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("dispatch to {channel} target '{target}' failed: {message}")]
    DispatchFailed {
        channel: String,
        target: String,
        message: String,
    },

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
