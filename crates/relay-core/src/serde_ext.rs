//! Boundary conversions for loosely typed JSON fields.
//!
//! Upstream producers (table storage entities, the console's forms) send
//! booleans as `"true"`/`"false"` strings. They become real `bool`s here and
//! nowhere else.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn bool_from_value(value: &Value) -> Option<Option<bool>> {
    match value {
        Value::Null => Some(None),
        Value::Bool(b) => Some(Some(*b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Some(None),
            "true" => Some(Some(true)),
            "false" => Some(Some(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts `true`, `false`, `"true"`, `"false"`, `""` and `null`; any other
/// value is treated as absent. Used for event fields written by workers.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    Ok(bool_from_value(&value).flatten())
}

/// Same accepted forms as [`lenient_bool`], but anything else is an error.
/// Used for routing config, where a typo must not silently widen a rule.
pub fn strict_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    bool_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a boolean or \"true\"/\"false\", got {value}")))
}

/// Severity as sent by producers: a label such as `"Sev2"` or `"critical"`,
/// or a bare number. Kept as text so an unrecognised label survives; numbers
/// are rendered as their decimal form and anything else is treated as absent.
pub fn severity_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Lenient {
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: Option<bool>,
    }

    #[derive(Debug, Deserialize)]
    struct Strict {
        #[serde(default, deserialize_with = "strict_bool")]
        flag: Option<bool>,
    }

    #[derive(Deserialize)]
    struct Labelled {
        #[serde(default, deserialize_with = "severity_label")]
        severity: Option<String>,
    }

    #[test]
    fn severity_label_keeps_unknown_text() {
        let parse = |s: &str| serde_json::from_str::<Labelled>(s).unwrap().severity;
        assert_eq!(parse(r#"{"severity": "critical"}"#).as_deref(), Some("critical"));
        assert_eq!(parse(r#"{"severity": "Sev1"}"#).as_deref(), Some("Sev1"));
        assert_eq!(parse(r#"{"severity": 2}"#).as_deref(), Some("2"));
        assert_eq!(parse(r#"{"severity": " "}"#), None);
        assert_eq!(parse(r#"{"severity": {"level": 1}}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn lenient_accepts_strings_and_ignores_garbage() {
        let parse = |s: &str| serde_json::from_str::<Lenient>(s).unwrap().flag;
        assert_eq!(parse(r#"{"flag": "TRUE"}"#), Some(true));
        assert_eq!(parse(r#"{"flag": false}"#), Some(false));
        assert_eq!(parse(r#"{"flag": ""}"#), None);
        assert_eq!(parse(r#"{"flag": "maybe"}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn strict_rejects_garbage() {
        assert_eq!(
            serde_json::from_str::<Strict>(r#"{"flag": "false"}"#).unwrap().flag,
            Some(false)
        );
        assert!(serde_json::from_str::<Strict>(r#"{"flag": "yes"}"#).is_err());
        assert!(serde_json::from_str::<Strict>(r#"{"flag": 1}"#).is_err());
    }
}
