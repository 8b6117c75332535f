//! Raw execution events and their day partitions.

use crate::error::{RelayError, Result};
use crate::serde_ext::lenient_bool;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// LogEvent
// ---------------------------------------------------------------------------

/// One status transition reported by a worker. Never mutated after it is
/// written; the reconciler derives everything else from these.
///
/// Field aliases accept the PascalCase entity names the log table uses
/// (`ExecId`, `RequestedAt`, `OnCall`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default, alias = "ExecId", alias = "execId", skip_serializing_if = "Option::is_none")]
    pub exec_id: Option<String>,
    #[serde(default, alias = "Status")]
    pub status: String,
    /// ISO-8601 timestamp, kept raw so an unparseable value can still take
    /// part in reconciliation.
    #[serde(default, alias = "RequestedAt", alias = "requestedAt", alias = "timestamp")]
    pub requested_at: String,
    #[serde(default, alias = "Runbook", skip_serializing_if = "Option::is_none")]
    pub runbook: Option<String>,
    #[serde(default, alias = "Log", skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, alias = "Severity", skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(
        default,
        alias = "OnCall",
        alias = "oncall",
        alias = "onCall",
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub on_call: Option<bool>,
    #[serde(
        default,
        alias = "ResourceInfo",
        alias = "resource_info",
        skip_serializing_if = "Option::is_none"
    )]
    pub resources: Option<serde_json::Value>,
    #[serde(default, alias = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "Id", alias = "schemaId", skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(
        default,
        alias = "Worker",
        alias = "initiator",
        alias = "Initiator",
        skip_serializing_if = "Option::is_none"
    )]
    pub worker: Option<String>,
    #[serde(
        default,
        alias = "MonitorCondition",
        alias = "monitorCondition",
        skip_serializing_if = "Option::is_none"
    )]
    pub monitor_condition: Option<String>,
    #[serde(default, alias = "Url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "Run_Args", alias = "runArgs", skip_serializing_if = "Option::is_none")]
    pub run_args: Option<String>,
    #[serde(default, alias = "RowKey", alias = "rowKey", skip_serializing_if = "Option::is_none")]
    pub row_key: Option<String>,
}

impl LogEvent {
    pub fn new(
        exec_id: impl Into<String>,
        status: impl Into<String>,
        requested_at: impl Into<String>,
    ) -> Self {
        Self {
            exec_id: Some(exec_id.into()),
            status: status.into(),
            requested_at: requested_at.into(),
            ..Self::default()
        }
    }

    /// Trimmed execution identifier, `None` when missing or blank.
    pub fn exec_id(&self) -> Option<&str> {
        self.exec_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.requested_at)
    }
}

/// Parse the timestamp formats seen in the log table: RFC 3339 with offset,
/// or a naive `YYYY-MM-DDTHH:MM:SS[.frac]` / `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// PartitionKey
// ---------------------------------------------------------------------------

/// Day partition of the event store, `YYYYMMDD` (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let valid = raw.len() == 8
            && raw.bytes().all(|b| b.is_ascii_digit())
            && NaiveDate::parse_from_str(raw, "%Y%m%d").is_ok();
        if !valid {
            return Err(RelayError::InvalidPartitionKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn today() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    pub fn for_timestamp(ts: DateTime<Utc>) -> Self {
        Self::for_date(ts.date_naive())
    }

    /// Partition an event belongs to, from its timestamp. `None` when the
    /// timestamp does not parse.
    pub fn for_event(event: &LogEvent) -> Option<Self> {
        event.timestamp().map(Self::for_timestamp)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PartitionKey {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        PartitionKey::parse(s)
    }
}

impl TryFrom<String> for PartitionKey {
    type Error = RelayError;

    fn try_from(s: String) -> Result<Self> {
        PartitionKey::parse(&s)
    }
}

impl From<PartitionKey> for String {
    fn from(p: PartitionKey) -> String {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
