pub mod config;
pub mod executions;
pub mod init;
pub mod logs;
pub mod route;
pub mod secrets;
pub mod serve;

use anyhow::Context;
use relay_core::event::PartitionKey;

/// `--partition` value, or today's partition (UTC).
pub fn partition_or_today(raw: Option<&str>) -> anyhow::Result<PartitionKey> {
    match raw {
        Some(raw) => PartitionKey::parse(raw).context("invalid --partition"),
        None => Ok(PartitionKey::today()),
    }
}
