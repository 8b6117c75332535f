//! Execution status vocabulary.
//!
//! Statuses stay raw strings end to end: workers send whatever label they
//! like, and an unknown label must surface verbatim in the reconciled record.
//! This module only ranks and classifies them.

/// Priority of a raw status in the reconciliation fold (higher wins).
///
/// | priority | statuses |
/// |---|---|
/// | 5 | succeeded, completed |
/// | 4 | failed, error |
/// | 3 | running, skipped, rejected, stopped |
/// | 2 | accepted |
/// | 1 | pending |
/// | 0 | anything else |
pub fn priority(status: &str) -> u8 {
    match normalize(status).as_str() {
        "succeeded" | "completed" => 5,
        "failed" | "error" => 4,
        "running" | "skipped" | "rejected" | "stopped" => 3,
        "accepted" => 2,
        "pending" => 1,
        _ => 0,
    }
}

/// Lowercased, trimmed form used for every status comparison.
pub fn normalize(status: &str) -> String {
    status.trim().to_ascii_lowercase()
}

/// Statuses that end an execution.
pub fn is_final(status: &str) -> bool {
    matches!(
        normalize(status).as_str(),
        "succeeded" | "completed" | "failed" | "error" | "timeout" | "stopped" | "rejected"
    )
}

/// Statuses that count as a failure when deciding whether an execution is an alert.
pub fn is_failure(status: &str) -> bool {
    matches!(normalize(status).as_str(), "failed" | "error" | "timeout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_table() {
        assert_eq!(priority("succeeded"), 5);
        assert_eq!(priority("Completed"), 5);
        assert_eq!(priority("FAILED"), 4);
        assert_eq!(priority(" error "), 4);
        for s in ["running", "skipped", "rejected", "stopped"] {
            assert_eq!(priority(s), 3, "{s}");
        }
        assert_eq!(priority("accepted"), 2);
        assert_eq!(priority("pending"), 1);
        assert_eq!(priority("routed"), 0);
        assert_eq!(priority(""), 0);
    }

    #[test]
    fn final_and_failure_sets() {
        assert!(is_final("timeout"));
        assert!(is_final("Succeeded"));
        assert!(!is_final("running"));
        assert!(!is_final("pending"));
        assert!(is_failure("timeout"));
        assert!(!is_failure("rejected"));
    }
}
