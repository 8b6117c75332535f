use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ChannelKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Chat-style channel (a workspace channel receiving a formatted message).
    #[serde(alias = "slack")]
    Chat,
    /// Incident-management channel (opens or closes an alert).
    #[serde(alias = "opsgenie")]
    Incident,
}

impl ChannelKind {
    pub fn all() -> &'static [ChannelKind] {
        &[ChannelKind::Chat, ChannelKind::Incident]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Chat => "chat",
            ChannelKind::Incident => "incident",
        }
    }

    /// Prefix of the out-of-band secret names: `<PREFIX>_TOKEN_DEFAULT`.
    pub fn secret_prefix(self) -> &'static str {
        match self {
            ChannelKind::Chat => "CHAT",
            ChannelKind::Incident => "INCIDENT",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = crate::error::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" | "slack" => Ok(ChannelKind::Chat),
            "incident" | "opsgenie" => Ok(ChannelKind::Incident),
            _ => Err(crate::error::RelayError::InvalidChannel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Alert severity, Sev0 (most critical) through Sev4 (least critical).
///
/// The derived `Ord` follows the ordinal, so `Sev0 < Sev4` even though Sev0 is
/// the more critical of the two. Use [`Severity::is_at_least_as_critical_as`]
/// when reasoning about criticality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Sev0,
    Sev1,
    Sev2,
    Sev3,
    Sev4,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Sev0,
            Severity::Sev1,
            Severity::Sev2,
            Severity::Sev3,
            Severity::Sev4,
        ]
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<Severity> {
        Severity::all().get(n as usize).copied()
    }

    /// Lenient parse used at the event boundary: `Sev2`, `sev2`, `SEV 2` and
    /// `2` all map to `Sev2`. Anything else is "no severity".
    pub fn parse(raw: &str) -> Option<Severity> {
        let lowered = raw.trim().to_ascii_lowercase();
        let digits = lowered.strip_prefix("sev").unwrap_or(&lowered).trim();
        digits.parse::<u8>().ok().and_then(Severity::from_ordinal)
    }

    pub fn is_at_least_as_critical_as(self, other: Severity) -> bool {
        self.ordinal() <= other.ordinal()
    }

    /// Incident priority label: Sev0 → P1 … Sev4 → P5.
    pub fn incident_priority(self) -> &'static str {
        match self {
            Severity::Sev0 => "P1",
            Severity::Sev1 => "P2",
            Severity::Sev2 => "P3",
            Severity::Sev3 => "P4",
            Severity::Sev4 => "P5",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Sev0 => "Sev0",
            Severity::Sev1 => "Sev1",
            Severity::Sev2 => "Sev2",
            Severity::Sev3 => "Sev3",
            Severity::Sev4 => "Sev4",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| crate::error::RelayError::InvalidSeverity(s.to_string()))
    }
}

impl TryFrom<String> for Severity {
    type Error = crate::error::RelayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> String {
        s.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
