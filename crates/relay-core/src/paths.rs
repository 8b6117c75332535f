use crate::error::{RelayError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const RELAY_DIR: &str = ".relay";
pub const LOGS_DIR: &str = ".relay/logs";

pub const ROUTING_FILE: &str = ".relay/routing.json";
pub const SECRETS_FILE: &str = ".relay/secrets.env";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn relay_dir(root: &Path) -> PathBuf {
    root.join(RELAY_DIR)
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join(LOGS_DIR)
}

pub fn partition_log_path(root: &Path, partition: &str) -> PathBuf {
    logs_dir(root).join(format!("{partition}.jsonl"))
}

pub fn routing_path(root: &Path) -> PathBuf {
    root.join(ROUTING_FILE)
}

pub fn secrets_path(root: &Path) -> PathBuf {
    root.join(SECRETS_FILE)
}

// ---------------------------------------------------------------------------
// Team name validation
// ---------------------------------------------------------------------------

static TEAM_RE: OnceLock<Regex> = OnceLock::new();

fn team_re() -> &'static Regex {
    TEAM_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

/// Team names end up in secret key names (`CHAT_TOKEN_<TEAM>`), so they are
/// restricted to characters that survive upper-casing into an env var name.
pub fn validate_team_name(team: &str) -> Result<()> {
    if team.is_empty() || team.len() > 64 || !team_re().is_match(team) {
        return Err(RelayError::InvalidTeamName(team.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_team_names() {
        for team in ["payments", "platform-core", "SRE", "team_42", "a"] {
            validate_team_name(team).unwrap_or_else(|_| panic!("expected valid: {team}"));
        }
    }

    #[test]
    fn invalid_team_names() {
        for team in ["", "-payments", "has spaces", "a/b", "ops.eu"] {
            assert!(validate_team_name(team).is_err(), "expected invalid: {team}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            routing_path(root),
            PathBuf::from("/tmp/proj/.relay/routing.json")
        );
        assert_eq!(
            partition_log_path(root, "20250915"),
            PathBuf::from("/tmp/proj/.relay/logs/20250915.jsonl")
        );
        assert_eq!(
            secrets_path(root),
            PathBuf::from("/tmp/proj/.relay/secrets.env")
        );
    }
}
