//! Filtering raw log events for the console's log viewer.

use crate::error::{RelayError, Result};
use crate::event::{parse_timestamp, LogEvent};
use crate::status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: usize = 200;
pub const MAX_LIMIT: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" | "" => Ok(SortOrder::Desc),
            other => Err(RelayError::InvalidQuery(format!(
                "order must be asc or desc, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub exec_id: Option<String>,
    pub status: Option<String>,
    /// Case-insensitive substring over name, schema id, url, runbook, log and run args.
    pub text: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: usize,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            exec_id: None,
            status: None,
            text: None,
            from: None,
            to: None,
            order: SortOrder::Desc,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Requested limit clamped to `1..=MAX_LIMIT`; absent means [`DEFAULT_LIMIT`].
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// A range bound from user input. Empty input is no bound.
pub fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_timestamp(s).map(Some).ok_or_else(|| {
            RelayError::InvalidQuery(format!("{name} is not an ISO-8601 timestamp: '{s}'"))
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl LogQuery {
    /// Build from loosely typed request parameters, normalizing blanks and the limit.
    pub fn from_params(
        exec_id: Option<String>,
        status: Option<String>,
        text: Option<String>,
        from: Option<&str>,
        to: Option<&str>,
        order: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Self> {
        let query = Self {
            exec_id: non_blank(exec_id),
            status: non_blank(status),
            text: non_blank(text),
            from: parse_bound(from, "from")?,
            to: parse_bound(to, "to")?,
            order: order.map(str::parse::<SortOrder>).transpose()?.unwrap_or_default(),
            limit: clamp_limit(limit),
        };
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(RelayError::InvalidQuery(format!(
                    "from ({from}) is after to ({to})"
                )));
            }
        }
        Ok(query)
    }

    pub fn matches(&self, event: &LogEvent) -> bool {
        if let Some(exec_id) = &self.exec_id {
            if event.exec_id() != Some(exec_id.as_str()) {
                return false;
            }
        }
        if let Some(wanted) = &self.status {
            if status::normalize(&event.status) != status::normalize(wanted) {
                return false;
            }
        }
        if self.from.is_some() || self.to.is_some() {
            let Some(ts) = event.timestamp() else {
                return false;
            };
            if self.from.is_some_and(|from| ts < from) || self.to.is_some_and(|to| ts > to) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let haystack = [
                &event.name,
                &event.schema_id,
                &event.url,
                &event.runbook,
                &event.log,
                &event.run_args,
            ];
            let hit = haystack
                .iter()
                .filter_map(|field| field.as_deref())
                .any(|value| value.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Filter, sort by `requested_at` and truncate to the limit.
    pub fn apply(&self, events: Vec<LogEvent>) -> Vec<LogEvent> {
        let mut hits: Vec<LogEvent> = events.into_iter().filter(|e| self.matches(e)).collect();
        hits.sort_by(|a, b| {
            let ord = compare_time(a, b);
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        hits.truncate(self.limit.clamp(1, MAX_LIMIT));
        hits
    }
}

fn compare_time(a: &LogEvent, b: &LogEvent) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| a.requested_at.cmp(&b.requested_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<LogEvent> {
        let mut a = LogEvent::new("E1", "pending", "2025-09-15T10:00:00Z");
        a.runbook = Some("restart-app.py".into());
        let mut b = LogEvent::new("E1", "Failed", "2025-09-15T10:06:00Z");
        b.log = Some("Traceback: Connection REFUSED".into());
        let mut c = LogEvent::new("E2", "succeeded", "2025-09-15T11:00:00Z");
        c.name = Some("scale-out".into());
        let d = LogEvent::new("E3", "failed", "garbage");
        vec![a, b, c, d]
    }

    fn ids(events: &[LogEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| format!("{}:{}", e.exec_id().unwrap_or("-"), e.status))
            .collect()
    }

    #[test]
    fn default_is_newest_first() {
        let result = LogQuery::default().apply(events());
        assert_eq!(
            ids(&result),
            vec!["E2:succeeded", "E1:Failed", "E1:pending", "E3:failed"]
        );
    }

    #[test]
    fn ascending_order() {
        let query = LogQuery {
            order: SortOrder::Asc,
            ..LogQuery::default()
        };
        assert_eq!(ids(&query.apply(events()))[0], "E3:failed");
    }

    #[test]
    fn status_is_case_insensitive_and_exec_exact() {
        let query = LogQuery {
            status: Some("FAILED".into()),
            exec_id: Some("E1".into()),
            ..LogQuery::default()
        };
        assert_eq!(ids(&query.apply(events())), vec!["E1:Failed"]);
    }

    #[test]
    fn text_searches_several_fields() {
        let query = LogQuery {
            text: Some("refused".into()),
            ..LogQuery::default()
        };
        assert_eq!(ids(&query.apply(events())), vec!["E1:Failed"]);
        let query = LogQuery {
            text: Some("RESTART".into()),
            ..LogQuery::default()
        };
        assert_eq!(ids(&query.apply(events())), vec!["E1:pending"]);
    }

    #[test]
    fn time_range_is_inclusive_and_drops_undated() {
        let query = LogQuery::from_params(
            None,
            None,
            None,
            Some("2025-09-15T10:06:00Z"),
            Some("2025-09-15T11:00:00Z"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(ids(&query.apply(events())), vec!["E2:succeeded", "E1:Failed"]);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 200);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(99_999)), 5000);
        let query = LogQuery::from_params(None, None, None, None, None, None, Some(2)).unwrap();
        assert_eq!(query.apply(events()).len(), 2);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad_order = LogQuery::from_params(None, None, None, None, None, Some("sideways"), None);
        assert!(matches!(bad_order, Err(RelayError::InvalidQuery(_))));
        let bad_time = LogQuery::from_params(None, None, None, Some("yesterday"), None, None, None);
        assert!(matches!(bad_time, Err(RelayError::InvalidQuery(_))));
        let inverted = LogQuery::from_params(
            None,
            None,
            None,
            Some("2025-09-16T00:00:00Z"),
            Some("2025-09-15T00:00:00Z"),
            None,
            None,
        );
        assert!(matches!(inverted, Err(RelayError::InvalidQuery(_))));
    }

    #[test]
    fn blank_params_are_ignored() {
        let query = LogQuery::from_params(
            Some("  ".into()),
            Some("".into()),
            None,
            Some(""),
            None,
            Some(""),
            None,
        )
        .unwrap();
        assert_eq!(query, LogQuery::default());
    }
}
