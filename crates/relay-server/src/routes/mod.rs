pub mod executions;
pub mod health;
pub mod logs;
pub mod route;
pub mod routing;

use relay_core::event::PartitionKey;
use serde::Deserialize;

/// `?partitionKey=YYYYMMDD`; absent means today (UTC).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionParams {
    #[serde(default)]
    pub partition_key: Option<String>,
}

impl PartitionParams {
    pub fn key(&self) -> relay_core::Result<PartitionKey> {
        match self.partition_key.as_deref().map(str::trim) {
            None | Some("") => Ok(PartitionKey::today()),
            Some(raw) => PartitionKey::parse(raw),
        }
    }
}

/// Join a blocking task, mapping a panic or cancellation to a 500.
pub(crate) fn join_error(e: tokio::task::JoinError) -> crate::error::AppError {
    crate::error::AppError(anyhow::anyhow!("task join error: {e}"))
}
