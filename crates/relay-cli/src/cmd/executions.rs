use crate::output::{cell, print_json, print_table};
use anyhow::Context;
use relay_core::reconcile::Reconciler;
use relay_core::store::{EventStore, JsonlEventStore};
use std::path::Path;

pub fn run(root: &Path, partition: Option<&str>, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let partition = super::partition_or_today(partition)?;
    let fetched = JsonlEventStore::new(root)
        .fetch(&partition)
        .with_context(|| format!("failed to read partition {partition}"))?;

    let mut reconciler = Reconciler::new();
    reconciler.extend(fetched.events);
    let stats = reconciler.stats();
    let mut records = reconciler.records();
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if json {
        return print_json(&serde_json::json!({
            "partition_key": partition,
            "stats": stats,
            "skipped_lines": fetched.skipped,
            "executions": records,
        }));
    }

    if records.is_empty() {
        println!("No executions in partition {partition}.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.exec_id.clone(),
                r.status.clone(),
                cell(Some(&r.timestamp)),
                r.severity
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| cell(r.raw_severity.as_deref())),
                cell(r.runbook.as_deref()),
                r.event_count.to_string(),
            ]
        })
        .collect();
    print_table(
        &["EXEC ID", "STATUS", "TIMESTAMP", "SEVERITY", "RUNBOOK", "EVENTS"],
        rows,
    );
    println!(
        "\n{} execution(s) from {} event(s); {} without an execution id, {} unreadable line(s).",
        stats.executions, stats.total, stats.discarded, fetched.skipped
    );
    Ok(())
}
