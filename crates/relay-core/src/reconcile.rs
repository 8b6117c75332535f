//! Folding raw status events into one canonical record per execution.
//!
//! This is the only place the status-priority fold lives. The CLI, the HTTP
//! API and the routing pass all go through [`reconcile`] or [`Reconciler`].
//!
//! The winner of a group is the maximum under a total order on events:
//!
//! 1. status priority (see [`crate::status::priority`]);
//! 2. parsed timestamp, where an unparseable timestamp loses to any parseable one;
//! 3. raw timestamp string, raw status, row key, then the serialized event.
//!
//! Because the order is total, the fold is commutative, associative and
//! idempotent: any arrival order, batched or incremental, yields the same record.

use crate::event::LogEvent;
use crate::status;
use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// Deserialization goes through [`WireRecord`] so a severity label that does
/// not parse is kept in `raw_severity` instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRecord")]
pub struct ExecutionRecord {
    pub exec_id: String,
    /// Literal raw status of the winning event.
    pub status: String,
    /// Raw timestamp of the winning event.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runbook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_severity: Option<String>,
    #[serde(default)]
    pub on_call: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    #[serde(default)]
    pub event_count: usize,
}

#[derive(Deserialize)]
struct WireRecord {
    exec_id: String,
    status: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    runbook: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_ext::severity_label")]
    severity: Option<String>,
    #[serde(default)]
    raw_severity: Option<String>,
    #[serde(default)]
    on_call: bool,
    #[serde(default)]
    worker: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    schema_id: Option<String>,
    #[serde(default)]
    monitor_condition: Option<String>,
    #[serde(default)]
    resources: Option<serde_json::Value>,
    #[serde(default)]
    event_count: usize,
}

impl From<WireRecord> for ExecutionRecord {
    fn from(wire: WireRecord) -> Self {
        let severity = wire.severity.as_deref().and_then(Severity::parse);
        let raw_severity = wire.raw_severity.or(wire.severity);
        Self {
            exec_id: wire.exec_id,
            status: wire.status,
            timestamp: wire.timestamp,
            runbook: wire.runbook,
            severity,
            raw_severity,
            on_call: wire.on_call,
            worker: wire.worker,
            name: wire.name,
            schema_id: wire.schema_id,
            monitor_condition: wire.monitor_condition,
            resources: wire.resources,
            event_count: wire.event_count,
        }
    }
}

impl ExecutionRecord {
    /// A bare record, mostly useful for routing previews and tests.
    pub fn new(
        exec_id: impl Into<String>,
        status: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            exec_id: exec_id.into(),
            status: status.into(),
            timestamp: timestamp.into(),
            runbook: None,
            severity: None,
            raw_severity: None,
            on_call: false,
            worker: None,
            name: None,
            schema_id: None,
            monitor_condition: None,
            resources: None,
            event_count: 0,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        crate::event::parse_timestamp(&self.timestamp)
    }

    pub fn status_priority(&self) -> u8 {
        status::priority(&self.status)
    }

    pub fn is_final(&self) -> bool {
        status::is_final(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Event ordering
// ---------------------------------------------------------------------------

/// Total order used to pick the winning event. `Greater` wins.
fn compare_events(a: &LogEvent, b: &LogEvent) -> Ordering {
    status::priority(&a.status)
        .cmp(&status::priority(&b.status))
        .then_with(|| a.timestamp().cmp(&b.timestamp()))
        .then_with(|| a.requested_at.cmp(&b.requested_at))
        .then_with(|| a.status.cmp(&b.status))
        .then_with(|| a.row_key.cmp(&b.row_key))
        .then_with(|| {
            let ja = serde_json::to_string(a).unwrap_or_default();
            let jb = serde_json::to_string(b).unwrap_or_default();
            ja.cmp(&jb)
        })
}

fn first_some<T: Clone>(events: &[&LogEvent], f: impl Fn(&LogEvent) -> Option<T>) -> Option<T> {
    events.iter().find_map(|e| f(e))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build the record for one execution's events (all sharing `exec_id`).
fn fold_group(exec_id: &str, group: &[LogEvent]) -> Option<ExecutionRecord> {
    let mut ranked: Vec<&LogEvent> = group.iter().collect();
    ranked.sort_by(|a, b| compare_events(b, a));
    let winner = *ranked.first()?;

    let raw_severity = first_some(&ranked, |e| non_blank(&e.severity));
    Some(ExecutionRecord {
        exec_id: exec_id.to_string(),
        status: winner.status.clone(),
        timestamp: winner.requested_at.clone(),
        runbook: first_some(&ranked, |e| non_blank(&e.runbook)),
        severity: raw_severity.as_deref().and_then(Severity::parse),
        raw_severity,
        on_call: first_some(&ranked, |e| e.on_call).unwrap_or(false),
        worker: first_some(&ranked, |e| non_blank(&e.worker)),
        name: first_some(&ranked, |e| non_blank(&e.name)),
        schema_id: first_some(&ranked, |e| non_blank(&e.schema_id)),
        monitor_condition: first_some(&ranked, |e| non_blank(&e.monitor_condition)),
        resources: first_some(&ranked, |e| e.resources.clone().filter(|v| !v.is_null())),
        event_count: group.len(),
    })
}

/// Most recent execution first; records with unparseable timestamps last.
fn compare_records(a: &ExecutionRecord, b: &ExecutionRecord) -> Ordering {
    b.parsed_timestamp()
        .cmp(&a.parsed_timestamp())
        .then_with(|| a.exec_id.cmp(&b.exec_id))
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub total: usize,
    /// Events with no execution identifier. Expected, not an error.
    pub discarded: usize,
    pub executions: usize,
}

/// Incremental form of [`reconcile`]: push events as they arrive and read the
/// records at any point.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    groups: BTreeMap<String, Vec<LogEvent>>,
    total: usize,
    discarded: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one event. Exact duplicates (redelivery) are ignored.
    pub fn push(&mut self, event: LogEvent) {
        self.total += 1;
        let Some(exec_id) = event.exec_id().map(str::to_string) else {
            self.discarded += 1;
            tracing::debug!(status = %event.status, "discarding event without execution id");
            return;
        };
        let group = self.groups.entry(exec_id).or_default();
        if !group.contains(&event) {
            group.push(event);
        }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = LogEvent>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn get(&self, exec_id: &str) -> Option<ExecutionRecord> {
        let group = self.groups.get(exec_id.trim())?;
        fold_group(exec_id.trim(), group)
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> = self
            .groups
            .iter()
            .filter_map(|(id, group)| fold_group(id, group))
            .collect();
        records.sort_by(compare_records);
        records
    }

    pub fn stats(&self) -> ReconcileStats {
        ReconcileStats {
            total: self.total,
            discarded: self.discarded,
            executions: self.groups.len(),
        }
    }
}

/// Fold events into one record per execution, most recent first.
pub fn reconcile(events: &[LogEvent]) -> Vec<ExecutionRecord> {
    reconcile_with_stats(events).0
}

pub fn reconcile_with_stats(events: &[LogEvent]) -> (Vec<ExecutionRecord>, ReconcileStats) {
    let mut reconciler = Reconciler::new();
    reconciler.extend(events.iter().cloned());
    let stats = reconciler.stats();
    if stats.discarded > 0 {
        tracing::debug!(
            discarded = stats.discarded,
            total = stats.total,
            "events without execution id excluded from reconciliation"
        );
    }
    (reconciler.records(), stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
