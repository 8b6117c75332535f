use crate::error::Result;
use crate::event::{LogEvent, PartitionKey};
use crate::paths;
use std::path::{Path, PathBuf};

/// Events read from one partition. Lines that failed to parse are counted,
/// not returned.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub events: Vec<LogEvent>,
    pub skipped: usize,
}

/// Append-only source of raw events, keyed by day partition.
pub trait EventStore: Send + Sync {
    fn fetch(&self, partition: &PartitionKey) -> Result<Fetched>;

    fn append(&self, partition: &PartitionKey, events: &[LogEvent]) -> Result<usize>;

    /// Partitions present in the store, oldest first.
    fn partitions(&self) -> Result<Vec<PartitionKey>>;
}

/// One `YYYYMMDD.jsonl` file per partition under `.relay/logs/`.
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    root: PathBuf,
}

impl JsonlEventStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn file(&self, partition: &PartitionKey) -> PathBuf {
        paths::partition_log_path(&self.root, partition.as_str())
    }
}

impl EventStore for JsonlEventStore {
    fn fetch(&self, partition: &PartitionKey) -> Result<Fetched> {
        let path = self.file(partition);
        if !path.exists() {
            return Ok(Fetched::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut fetched = Fetched::default();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(line) {
                Ok(event) => fetched.events.push(event),
                Err(e) => {
                    fetched.skipped += 1;
                    tracing::warn!(
                        partition = %partition,
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed event line"
                    );
                }
            }
        }
        Ok(fetched)
    }

    fn append(&self, partition: &PartitionKey, events: &[LogEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut buf = String::new();
        for event in events {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }
        crate::io::append_text(&self.file(partition), &buf)?;
        Ok(events.len())
    }

    fn partitions(&self) -> Result<Vec<PartitionKey>> {
        let dir = paths::logs_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| PartitionKey::parse(s).ok())
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> PartitionKey {
        PartitionKey::parse(s).unwrap()
    }

    #[test]
    fn append_then_fetch() {
        let dir = TempDir::new().unwrap();
        let store = JsonlEventStore::new(dir.path());
        let p = key("20250915");
        store
            .append(&p, &[LogEvent::new("E1", "pending", "2025-09-15T10:00:00Z")])
            .unwrap();
        store
            .append(&p, &[LogEvent::new("E1", "failed", "2025-09-15T10:06:00Z")])
            .unwrap();
        let fetched = store.fetch(&p).unwrap();
        assert_eq!(fetched.events.len(), 2);
        assert_eq!(fetched.events[1].status, "failed");
        assert_eq!(fetched.skipped, 0);

        let on_disk = std::fs::read_to_string(paths::partition_log_path(dir.path(), "20250915")).unwrap();
        assert_eq!(on_disk.lines().count(), 2);
    }

    #[test]
    fn missing_partition_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonlEventStore::new(dir.path());
        let fetched = store.fetch(&key("20250101")).unwrap();
        assert!(fetched.events.is_empty());
        assert!(store.partitions().unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        let path = paths::partition_log_path(dir.path(), "20250915");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "{\"ExecId\":\"E1\",\"Status\":\"failed\",\"RequestedAt\":\"2025-09-15T10:06:00Z\"}\n\
             not json\n\
             \n\
             [1,2]\n\
             {\"exec_id\":\"E2\",\"status\":\"pending\",\"requested_at\":\"2025-09-15T10:00:00Z\"}\n",
        )
        .unwrap();
        let fetched = JsonlEventStore::new(dir.path()).fetch(&key("20250915")).unwrap();
        assert_eq!(fetched.events.len(), 2);
        assert_eq!(fetched.skipped, 2);
    }

    #[test]
    fn partitions_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let store = JsonlEventStore::new(dir.path());
        for p in ["20250916", "20250914"] {
            store
                .append(&key(p), &[LogEvent::new("E", "pending", "t")])
                .unwrap();
        }
        std::fs::write(paths::logs_dir(dir.path()).join("notes.txt"), "x").unwrap();
        std::fs::write(paths::logs_dir(dir.path()).join("latest.jsonl"), "").unwrap();
        let keys: Vec<String> = store
            .partitions()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec!["20250914", "20250916"]);
    }
}
