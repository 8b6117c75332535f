use crate::credentials::{self, secret_key_name, Secret, SecretSource};
use crate::error::{RelayError, Result};
use crate::paths;
use crate::serde_ext::strict_bool;
use crate::types::{ChannelKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == WarnLevel::Error
    }
}

pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
    warnings.iter().any(ConfigWarning::is_error)
}

// ---------------------------------------------------------------------------
// Channel settings
// ---------------------------------------------------------------------------

/// Target and secret for one channel kind in one credential scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Chat channel or incident responder.
    #[serde(
        default,
        alias = "channel",
        alias = "responder",
        alias = "team",
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<String>,
    /// Accepted on input so a submitted document can carry secrets; never
    /// written back out.
    #[serde(default, alias = "token", alias = "apiKey", skip_serializing)]
    pub secret: Option<Secret>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSet {
    #[serde(default, alias = "slack", skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChannelSettings>,
    #[serde(default, alias = "opsgenie", skip_serializing_if = "Option::is_none")]
    pub incident: Option<ChannelSettings>,
}

impl ChannelSet {
    pub fn get(&self, kind: ChannelKind) -> Option<&ChannelSettings> {
        match kind {
            ChannelKind::Chat => self.chat.as_ref(),
            ChannelKind::Incident => self.incident.as_ref(),
        }
    }

    pub fn get_or_insert(&mut self, kind: ChannelKind) -> &mut ChannelSettings {
        match kind {
            ChannelKind::Chat => self.chat.get_or_insert_with(Default::default),
            ChannelKind::Incident => self.incident.get_or_insert_with(Default::default),
        }
    }

    pub fn secret_configured(&self, kind: ChannelKind) -> bool {
        self.get(kind).is_some_and(|s| s.secret.is_some())
    }
}

// ---------------------------------------------------------------------------
// Wildcard
// ---------------------------------------------------------------------------

/// The `any: "*"` condition. Any other value fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Wildcard;

impl TryFrom<String> for Wildcard {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        if s == "*" {
            Ok(Wildcard)
        } else {
            Err(format!("'any' only accepts \"*\", got \"{s}\""))
        }
    }
}

impl From<Wildcard> for String {
    fn from(_: Wildcard) -> String {
        "*".to_string()
    }
}

// ---------------------------------------------------------------------------
// When
// ---------------------------------------------------------------------------

/// Conditions of a rule, AND-ed together. See [`crate::rules`] for matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct When {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<Wildcard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_in: Option<Vec<String>>,
    /// Least critical severity that still matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_min: Option<Severity>,
    /// Most critical severity that still matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_max: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, alias = "alertRule", skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_alert: Option<bool>,
    #[serde(
        default,
        alias = "oncall",
        deserialize_with = "strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub on_call: Option<bool>,
    #[serde(
        default,
        deserialize_with = "strict_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub final_only: Option<bool>,
}

impl When {
    pub fn wildcard() -> Self {
        Self {
            any: Some(Wildcard),
            ..Self::default()
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.any.is_some()
    }

    /// Number of conditions set besides the wildcard. An empty `statusIn`
    /// and `finalOnly: false` constrain nothing and are not counted.
    pub fn condition_count(&self) -> usize {
        let strings = [
            &self.resource_group,
            &self.resource_group_prefix,
            &self.resource_id,
            &self.resource_name,
            &self.namespace,
            &self.schema_name,
            &self.subscription_id,
        ];
        strings.iter().filter(|s| s.is_some()).count()
            + usize::from(self.status_in.as_ref().is_some_and(|s| !s.is_empty()))
            + usize::from(self.severity_min.is_some())
            + usize::from(self.severity_max.is_some())
            + usize::from(self.is_alert.is_some())
            + usize::from(self.on_call.is_some())
            + usize::from(self.final_only == Some(true))
    }

    /// No condition and no wildcard: the clause never matches.
    pub fn is_inert(&self) -> bool {
        !self.is_wildcard() && self.condition_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Action / Rule
// ---------------------------------------------------------------------------

/// One notification to send when a rule matches. The literal target is an
/// override; the secret always comes from the team or default credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    #[serde(alias = "slack")]
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team: Option<String>,
        #[serde(default, alias = "target", skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    #[serde(alias = "opsgenie")]
    Incident {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team: Option<String>,
        #[serde(default, alias = "target", skip_serializing_if = "Option::is_none")]
        responder: Option<String>,
    },
}

impl Action {
    pub fn chat(team: Option<&str>) -> Self {
        Action::Chat {
            team: team.map(str::to_string),
            channel: None,
        }
    }

    pub fn incident(team: Option<&str>) -> Self {
        Action::Incident {
            team: team.map(str::to_string),
            responder: None,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Action::Chat { .. } => ChannelKind::Chat,
            Action::Incident { .. } => ChannelKind::Incident,
        }
    }

    pub fn team(&self) -> Option<&str> {
        match self {
            Action::Chat { team, .. } | Action::Incident { team, .. } => {
                team.as_deref().map(str::trim).filter(|t| !t.is_empty())
            }
        }
    }

    pub fn target_override(&self) -> Option<&str> {
        match self {
            Action::Chat { channel: t, .. } | Action::Incident { responder: t, .. } => {
                t.as_deref().map(str::trim).filter(|t| !t.is_empty())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub when: When,
    #[serde(default)]
    pub then: Vec<Action>,
}

impl Rule {
    /// `#2 (payments-failures)` or `#2`, for messages.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("#{index} ({name})"),
            None => format!("#{index}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoutingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub defaults: ChannelSet,
    #[serde(default)]
    pub teams: BTreeMap<String, ChannelSet>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Actions used when no rule matched a failed execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Vec<Action>>,
}

fn default_version() -> u32 {
    1
}

impl RoutingConfig {
    /// No defaults, no teams, no rules.
    pub fn empty() -> Self {
        Self {
            version: default_version(),
            defaults: ChannelSet::default(),
            teams: BTreeMap::new(),
            rules: Vec::new(),
            fallback: None,
        }
    }

    pub fn parse(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| RelayError::ConfigParse(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read `.relay/routing.json` without touching the secret store. A
    /// missing file yields the built-in default.
    pub fn read(root: &Path) -> Result<Self> {
        let path = paths::routing_path(root);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no routing config found, using built-in default");
            return Ok(default_config());
        }
        let data = std::fs::read_to_string(&path)?;
        Self::parse(&data)
    }

    /// [`RoutingConfig::read`] plus secret hydration.
    pub fn load(root: &Path, secrets: &dyn SecretSource) -> Result<Self> {
        let mut config = Self::read(root)?;
        credentials::hydrate(&mut config, secrets);
        Ok(config)
    }

    /// Validate, replace `.relay/routing.json` as a whole document with the
    /// inline secrets stripped, then move those secrets into
    /// `.relay/secrets.env`. A failed document write leaves the secret store
    /// untouched. Returns the non-fatal warnings.
    pub fn save(&self, root: &Path) -> Result<Vec<ConfigWarning>> {
        let warnings = self.validate();
        if has_errors(&warnings) {
            let messages: Vec<&str> = warnings
                .iter()
                .filter(|w| w.level == WarnLevel::Error)
                .map(|w| w.message.as_str())
                .collect();
            return Err(RelayError::ConfigInvalid(messages.join("; ")));
        }

        let mut document = self.clone();
        let secrets = document.extract_secrets();
        let data = document.to_json_pretty()?;
        crate::io::atomic_write(&paths::routing_path(root), data.as_bytes())?;
        credentials::set_secrets(root, &secrets)?;
        tracing::info!(
            rules = document.rules.len(),
            teams = document.teams.len(),
            secrets = secrets.len(),
            "routing config saved"
        );
        Ok(warnings)
    }

    /// Take inline secrets out of the document, keyed by their store name.
    pub fn extract_secrets(&mut self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for &kind in ChannelKind::all() {
            let mut take = |set: &mut ChannelSet, team: Option<&str>| {
                let secret = match kind {
                    ChannelKind::Chat => set.chat.as_mut(),
                    ChannelKind::Incident => set.incident.as_mut(),
                }
                .and_then(|s| s.secret.take());
                if let Some(secret) = secret {
                    pairs.push((secret_key_name(kind, team), secret.expose().to_string()));
                }
            };
            take(&mut self.defaults, None);
            for (team, set) in self.teams.iter_mut() {
                take(set, Some(team.as_str()));
            }
        }
        pairs
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for team in self.teams.keys() {
            if paths::validate_team_name(team).is_err() {
                warnings.push(ConfigWarning::error(format!(
                    "invalid team name '{team}' in teams"
                )));
            }
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let label = rule.label(index);
            let when = &rule.when;

            if when.is_wildcard() && when.condition_count() > 0 {
                warnings.push(ConfigWarning::error(format!(
                    "rule {label} combines the wildcard 'any' with other conditions; split it into separate rules"
                )));
            }
            if when.is_inert() {
                warnings.push(ConfigWarning::warning(format!(
                    "rule {label} has no conditions and never matches; use {{\"any\": \"*\"}} for a catch-all"
                )));
            }
            if let (Some(min), Some(max)) = (when.severity_min, when.severity_max) {
                if min.ordinal() < max.ordinal() {
                    warnings.push(ConfigWarning::error(format!(
                        "rule {label} has an empty severity range: severityMin {min} is more critical than severityMax {max}"
                    )));
                }
            }
            if rule.then.is_empty() {
                warnings.push(ConfigWarning::warning(format!(
                    "rule {label} has no actions"
                )));
            }
            self.check_action_teams(&rule.then, &format!("rule {label}"), &mut warnings);
        }

        if let Some(fallback) = &self.fallback {
            self.check_action_teams(fallback, "fallback", &mut warnings);
        }

        warnings
    }

    fn check_action_teams(&self, actions: &[Action], owner: &str, warnings: &mut Vec<ConfigWarning>) {
        for action in actions {
            let Some(team) = action.team() else { continue };
            if paths::validate_team_name(team).is_err() {
                warnings.push(ConfigWarning::error(format!(
                    "{owner} references invalid team name '{team}'"
                )));
            } else if !self.teams.contains_key(team) {
                warnings.push(ConfigWarning::warning(format!(
                    "{owner} references team '{team}' which has no entry in teams; its credentials come from {} or the defaults",
                    secret_key_name(action.kind(), Some(team))
                )));
            }
        }
    }
}

/// Used when no routing document exists: failed alerts go to the incident
/// channel and chat, everything else to chat. Failures that match no rule
/// open an incident.
pub fn default_config() -> RoutingConfig {
    RoutingConfig {
        version: default_version(),
        defaults: ChannelSet {
            chat: Some(ChannelSettings {
                target: Some("#relay-alerts".to_string()),
                secret: None,
            }),
            incident: Some(ChannelSettings {
                target: Some("default".to_string()),
                secret: None,
            }),
        },
        teams: BTreeMap::new(),
        rules: vec![
            Rule {
                name: Some("failed-alerts".to_string()),
                when: When {
                    is_alert: Some(true),
                    status_in: Some(vec!["failed".to_string(), "error".to_string()]),
                    ..When::default()
                },
                then: vec![Action::incident(None), Action::chat(None)],
            },
            Rule {
                name: Some("catch-all".to_string()),
                when: When::wildcard(),
                then: vec![Action::chat(None)],
            },
        ],
        fallback: Some(vec![Action::incident(None)]),
    }
}

// ---------------------------------------------------------------------------
// ConfigHandle
// ---------------------------------------------------------------------------

/// Shared, swappable snapshot of the routing config. A routing pass holds
/// one `Arc` for its whole duration; `replace` never mutates a snapshot in place.
#[derive(Debug)]
pub struct ConfigHandle {
    inner: RwLock<Arc<RoutingConfig>>,
}

impl ConfigHandle {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<RoutingConfig> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, config: RoutingConfig) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(config);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
