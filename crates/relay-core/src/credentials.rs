//! Channel credentials: the out-of-band secret store and the precedence chain
//! that turns an action into a concrete `(target, secret)` pair.
//!
//! Secrets never live in the routing document on disk. They are stored under
//! `<KIND>_TOKEN_DEFAULT` / `<KIND>_TOKEN_<TEAM>` in `.relay/secrets.env` or
//! the process environment, merged into the in-memory config at load time and
//! stripped back out on save.

use crate::config::RoutingConfig;
use crate::error::{RelayError, Result};
use crate::paths;
use crate::types::ChannelKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

const REDACTED: &str = "***";

/// A channel secret. `Debug` and `Serialize` never reveal the value; call
/// [`Secret::expose`] at the point of use.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Normalize a raw stored value: surrounding whitespace and quotes are
    /// dropped. Empty values are no secret at all.
    pub fn new(raw: &str) -> Option<Self> {
        let value = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Secret::new(&raw).ok_or_else(|| serde::de::Error::custom("secret must not be empty"))
    }
}

/// `CHAT_TOKEN_DEFAULT`, `INCIDENT_TOKEN_PLATFORM_CORE`, ...
pub fn secret_key_name(kind: ChannelKind, team: Option<&str>) -> String {
    let scope = match team {
        Some(team) => team.trim().to_ascii_uppercase().replace('-', "_"),
        None => "DEFAULT".to_string(),
    };
    format!("{}_TOKEN_{scope}", kind.secret_prefix())
}

// ---------------------------------------------------------------------------
// SecretSource
// ---------------------------------------------------------------------------

pub trait SecretSource: Send + Sync {
    fn get(&self, key: &str) -> Option<Secret>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, key: &str) -> Option<Secret> {
        std::env::var(key).ok().as_deref().and_then(Secret::new)
    }
}

/// In-memory secrets, for tests and for documents submitted with inline secrets.
#[derive(Debug, Clone, Default)]
pub struct MapSecrets(BTreeMap<String, Secret>);

impl MapSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: &str) {
        if let Some(secret) = Secret::new(value) {
            self.0.insert(key.into(), secret);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl SecretSource for MapSecrets {
    fn get(&self, key: &str) -> Option<Secret> {
        self.0.get(key).cloned()
    }
}

/// Snapshot of `.relay/secrets.env`.
#[derive(Debug, Clone, Default)]
pub struct FileSecrets(MapSecrets);

impl FileSecrets {
    /// A missing file is an empty store.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::secrets_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut map = MapSecrets::new();
        for (key, value) in parse_env_pairs(&content) {
            map.insert(key, &value);
        }
        Ok(Self(map))
    }
}

impl SecretSource for FileSecrets {
    fn get(&self, key: &str) -> Option<Secret> {
        self.0.get(key)
    }
}

/// First source with a value wins.
#[derive(Default)]
pub struct ChainedSecrets(Vec<Box<dyn SecretSource>>);

impl ChainedSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, source: impl SecretSource + 'static) -> Self {
        self.0.push(Box::new(source));
        self
    }

    /// `.relay/secrets.env` first, then the process environment.
    pub fn standard(root: &Path) -> Result<Self> {
        Ok(Self::new().push(FileSecrets::load(root)?).push(EnvSecrets))
    }
}

impl SecretSource for ChainedSecrets {
    fn get(&self, key: &str) -> Option<Secret> {
        self.0.iter().find_map(|source| source.get(key))
    }
}

// ---------------------------------------------------------------------------
// Hydration
// ---------------------------------------------------------------------------

/// Merge stored secrets into the defaults and every configured team. Secrets
/// already present inline (a freshly submitted document) are kept.
pub fn hydrate(config: &mut RoutingConfig, source: &dyn SecretSource) {
    for &kind in ChannelKind::all() {
        let key = secret_key_name(kind, None);
        if let Some(secret) = source.get(&key) {
            let settings = config.defaults.get_or_insert(kind);
            if settings.secret.is_none() {
                settings.secret = Some(secret);
            }
        }
        for (team, set) in config.teams.iter_mut() {
            let key = secret_key_name(kind, Some(team));
            if let Some(secret) = source.get(&key) {
                let settings = set.get_or_insert(kind);
                if settings.secret.is_none() {
                    settings.secret = Some(secret);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCredential {
    pub target: String,
    pub secret: Secret,
    /// Credential set the secret came from: a team name or `default`.
    pub scope: String,
}

/// Applies the precedence chain for one channel kind:
///
/// * target: action override, then team target, then default target;
/// * secret: team secret (only when the action names a team), then default
///   secret. An action never supplies a secret.
pub struct CredentialResolver<'a> {
    config: &'a RoutingConfig,
    secrets: &'a dyn SecretSource,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(config: &'a RoutingConfig, secrets: &'a dyn SecretSource) -> Self {
        Self { config, secrets }
    }

    pub fn resolve(
        &self,
        kind: ChannelKind,
        team: Option<&str>,
        target_override: Option<&str>,
    ) -> Result<ResolvedCredential> {
        let team = team.map(str::trim).filter(|t| !t.is_empty());
        let team_settings = team
            .and_then(|t| self.config.teams.get(t))
            .and_then(|set| set.get(kind));
        let default_settings = self.config.defaults.get(kind);

        let team_secret = team.and_then(|t| {
            team_settings
                .and_then(|s| s.secret.clone())
                .or_else(|| self.secrets.get(&secret_key_name(kind, Some(t))))
                .map(|secret| (secret, t.to_string()))
        });
        let (secret, scope) = team_secret
            .or_else(|| {
                default_settings
                    .and_then(|s| s.secret.clone())
                    .or_else(|| self.secrets.get(&secret_key_name(kind, None)))
                    .map(|secret| (secret, "default".to_string()))
            })
            .ok_or_else(|| RelayError::MissingCredential {
                channel: kind.to_string(),
                team: team.map(str::to_string),
            })?;

        let configured = non_blank(target_override)
            .or_else(|| team_settings.and_then(|s| non_blank(s.target.as_deref())))
            .or_else(|| default_settings.and_then(|s| non_blank(s.target.as_deref())));
        let target = match (configured, kind) {
            (Some(target), _) => target,
            (None, ChannelKind::Incident) => team.unwrap_or("default").to_string(),
            (None, ChannelKind::Chat) => {
                return Err(RelayError::MissingTarget {
                    channel: kind.to_string(),
                    team: team.map(str::to_string),
                })
            }
        };

        Ok(ResolvedCredential {
            target,
            secret,
            scope,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// secrets.env maintenance
// ---------------------------------------------------------------------------

/// Merge `pairs` into `.relay/secrets.env` and make sure the file is gitignored.
pub fn set_secrets(root: &Path, pairs: &[(String, String)]) -> Result<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    let path = paths::secrets_path(root);
    let existing = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        String::new()
    };
    let merged = merge_env_pairs(&existing, pairs);
    crate::io::atomic_write(&path, merged.as_bytes())?;
    crate::io::ensure_gitignore_entry(root, paths::SECRETS_FILE)?;
    tracing::info!(count = pairs.len(), "secrets updated");
    Ok(())
}

/// Remove keys from `.relay/secrets.env`. Returns the keys that were present.
pub fn unset_secrets(root: &Path, keys: &[String]) -> Result<Vec<String>> {
    let path = paths::secrets_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let existing = std::fs::read_to_string(&path)?;
    let present: Vec<String> = parse_env_key_names(&existing)
        .into_iter()
        .filter(|k| keys.contains(k))
        .collect();
    if !present.is_empty() {
        crate::io::atomic_write(&path, remove_env_keys(&existing, keys).as_bytes())?;
    }
    Ok(present)
}

/// Key names stored in `.relay/secrets.env`, in file order. Values are never returned.
pub fn secret_names(root: &Path) -> Result<Vec<String>> {
    let path = paths::secrets_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(parse_env_key_names(&std::fs::read_to_string(&path)?))
}

/// Parse `KEY=VALUE` content, skipping comments and blank lines.
pub fn parse_env_pairs(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .filter_map(|l| {
            let l = l.strip_prefix("export ").unwrap_or(l);
            l.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn parse_env_key_names(content: &str) -> Vec<String> {
    parse_env_pairs(content).into_iter().map(|(k, _)| k).collect()
}

/// Remove specified keys from env content. Order of remaining lines is preserved.
fn remove_env_keys(existing: &str, keys_to_remove: &[String]) -> String {
    let lines: Vec<&str> = existing
        .lines()
        .filter(|line| {
            if line.starts_with('#') || line.trim().is_empty() {
                return true;
            }
            !keys_to_remove
                .iter()
                .any(|k| line.starts_with(&format!("{k}=")))
        })
        .collect();
    let mut result = lines.join("\n");
    if !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Existing key order is preserved; new keys are appended; new values override existing.
fn merge_env_pairs(existing: &str, new_pairs: &[(String, String)]) -> String {
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();
    for (key, value) in new_pairs {
        let prefix = format!("{key}=");
        let found = lines.iter_mut().any(|line| {
            if line.starts_with(&prefix) {
                *line = format!("{key}={value}");
                true
            } else {
                false
            }
        });
        if !found {
            lines.push(format!("{key}={value}"));
        }
    }
    let mut result = lines.join("\n");
    if !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
