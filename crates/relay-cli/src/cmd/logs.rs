use crate::output::{cell, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use relay_core::event::{LogEvent, PartitionKey};
use relay_core::query::LogQuery;
use relay_core::store::{EventStore, JsonlEventStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum LogsSubcommand {
    /// Filter raw events of one partition
    Query {
        /// Partition key YYYYMMDD (default: today, UTC)
        #[arg(long, short = 'p')]
        partition: Option<String>,
        /// Only this execution
        #[arg(long = "exec")]
        exec_id: Option<String>,
        /// Only this status (case-insensitive)
        #[arg(long)]
        status: Option<String>,
        /// Case-insensitive text search
        #[arg(long, short = 'q')]
        text: Option<String>,
        /// Earliest timestamp, ISO-8601
        #[arg(long)]
        from: Option<String>,
        /// Latest timestamp, ISO-8601
        #[arg(long)]
        to: Option<String>,
        /// asc or desc
        #[arg(long)]
        order: Option<String>,
        /// Maximum events returned
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Append events from a JSON array or JSON-lines file to the store
    Ingest {
        /// File to read; `-` reads stdin
        file: PathBuf,
        /// Store everything in this partition instead of each event's own day
        #[arg(long, short = 'p')]
        partition: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: LogsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        LogsSubcommand::Query {
            partition,
            exec_id,
            status,
            text,
            from,
            to,
            order,
            limit,
        } => {
            let partition = super::partition_or_today(partition.as_deref())?;
            let query = LogQuery::from_params(
                exec_id,
                status,
                text,
                from.as_deref(),
                to.as_deref(),
                order.as_deref(),
                limit,
            )?;
            query_logs(root, &partition, &query, json)
        }
        LogsSubcommand::Ingest { file, partition } => {
            let partition = partition
                .as_deref()
                .map(PartitionKey::parse)
                .transpose()
                .context("invalid --partition")?;
            ingest(root, &file, partition, json)
        }
    }
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

fn query_logs(root: &Path, partition: &PartitionKey, query: &LogQuery, json: bool) -> anyhow::Result<()> {
    let fetched = JsonlEventStore::new(root)
        .fetch(partition)
        .with_context(|| format!("failed to read partition {partition}"))?;
    let events = query.apply(fetched.events);

    if json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No matching events in partition {partition}.");
        return Ok(());
    }
    let rows = events
        .iter()
        .map(|e| {
            vec![
                cell(Some(&e.requested_at)),
                cell(e.exec_id()),
                cell(Some(&e.status)),
                cell(e.severity.as_deref()),
                cell(e.log.as_deref().map(first_line)),
            ]
        })
        .collect();
    print_table(&["REQUESTED AT", "EXEC ID", "STATUS", "SEVERITY", "LOG"], rows);
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

/// A JSON array of events, or one event per line.
fn parse_events(content: &str) -> anyhow::Result<Vec<LogEvent>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("invalid JSON array of events");
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid event on line {}", n + 1))
        })
        .collect()
}

fn read_input(file: &Path) -> anyhow::Result<String> {
    if file == Path::new("-") {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn ingest(root: &Path, file: &Path, partition: Option<PartitionKey>, json: bool) -> anyhow::Result<()> {
    let events = parse_events(&read_input(file)?)?;

    let mut batches: BTreeMap<PartitionKey, Vec<LogEvent>> = BTreeMap::new();
    for mut event in events {
        let key = match &partition {
            Some(key) => key.clone(),
            None => PartitionKey::for_event(&event).with_context(|| {
                format!(
                    "event for {} has no parseable timestamp ('{}'); pass --partition",
                    event.exec_id().unwrap_or("<no exec id>"),
                    event.requested_at
                )
            })?,
        };
        if event.row_key.is_none() {
            event.row_key = Some(uuid::Uuid::new_v4().to_string());
        }
        batches.entry(key).or_default().push(event);
    }

    let store = JsonlEventStore::new(root);
    let mut written = BTreeMap::new();
    for (key, batch) in &batches {
        let count = store
            .append(key, batch)
            .with_context(|| format!("failed to append to partition {key}"))?;
        written.insert(key.to_string(), count);
    }
    tracing::info!(partitions = written.len(), "events ingested");

    if json {
        return print_json(&serde_json::json!({ "written": written }));
    }
    if written.is_empty() {
        println!("No events found in {}.", file.display());
    }
    for (key, count) in &written {
        println!("  {key}: {count} event(s)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_and_lines() {
        let array = r#"[{"exec_id":"E1","status":"failed","requested_at":"2025-09-15T10:06:00Z"}]"#;
        assert_eq!(parse_events(array).unwrap().len(), 1);
        let lines = "{\"ExecId\":\"E1\",\"Status\":\"pending\"}\n\n{\"ExecId\":\"E2\",\"Status\":\"running\"}\n";
        let events = parse_events(lines).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].exec_id(), Some("E2"));
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let err = parse_events("{\"status\":\"ok\"}\nnot json\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn ingest_splits_by_day_and_assigns_row_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("events.jsonl");
        std::fs::write(
            &file,
            "{\"exec_id\":\"E1\",\"status\":\"pending\",\"requested_at\":\"2025-09-14T23:59:00Z\"}\n\
             {\"exec_id\":\"E1\",\"status\":\"failed\",\"requested_at\":\"2025-09-15T00:01:00Z\"}\n",
        )
        .unwrap();
        ingest(dir.path(), &file, None, true).unwrap();

        let store = JsonlEventStore::new(dir.path());
        let keys: Vec<String> = store.partitions().unwrap().into_iter().map(String::from).collect();
        assert_eq!(keys, vec!["20250914", "20250915"]);
        let day = store.fetch(&PartitionKey::parse("20250915").unwrap()).unwrap();
        assert!(day.events[0].row_key.is_some());
    }

    #[test]
    fn undated_event_needs_explicit_partition() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("events.json");
        std::fs::write(&file, r#"[{"exec_id":"E1","status":"failed","requested_at":"soon"}]"#).unwrap();
        assert!(ingest(dir.path(), &file, None, true).is_err());
        let key = PartitionKey::parse("20250915").unwrap();
        ingest(dir.path(), &file, Some(key.clone()), true).unwrap();
        assert_eq!(JsonlEventStore::new(dir.path()).fetch(&key).unwrap().events.len(), 1);
    }
}
