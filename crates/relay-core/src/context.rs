use crate::reconcile::ExecutionRecord;
use crate::serde_ext::lenient_bool;
use crate::status;
use serde::{Deserialize, Serialize};

/// An execution record plus the alert metadata rules can match on.
///
/// Plain executions carry none of the extra fields; a condition that needs
/// one of them simply fails to match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertContext {
    #[serde(flatten)]
    pub record: ExecutionRecord,
    #[serde(default, alias = "subscription_id", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, alias = "resource_group", skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, alias = "resource_id", skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, alias = "resource_name", skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(
        default,
        alias = "schema_name",
        alias = "alertRule",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_name: Option<String>,
    #[serde(
        default,
        alias = "is_alert",
        deserialize_with = "lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_alert: Option<bool>,
}

impl From<ExecutionRecord> for AlertContext {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            record,
            subscription_id: None,
            namespace: None,
            resource_group: None,
            resource_id: None,
            resource_name: None,
            schema_name: None,
            is_alert: None,
        }
    }
}

impl AlertContext {
    pub fn exec_id(&self) -> &str {
        &self.record.exec_id
    }

    /// Explicit subscription, else the segment after `/subscriptions/` in the
    /// resource id.
    pub fn subscription(&self) -> Option<String> {
        self.subscription_id
            .clone()
            .or_else(|| self.resource_id.as_deref().and_then(subscription_from_resource_id))
    }

    /// Explicit flag when present; otherwise an execution is an alert when it
    /// carries a severity or ended in a failure status.
    pub fn is_alert(&self) -> bool {
        self.is_alert.unwrap_or_else(|| {
            self.record.severity.is_some() || status::is_failure(&self.record.status)
        })
    }

    /// Fill unset alert fields from the record's `resources` blob, which
    /// workers populate with the alert payload they were triggered by.
    pub fn enrich_from_resources(mut self) -> Self {
        let Some(resources) = self.record.resources.clone() else {
            return self;
        };
        let field = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| {
                resources
                    .get(*k)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        };
        if self.resource_id.is_none() {
            self.resource_id = field(&["resourceId", "resource_id", "id"]);
        }
        if self.resource_group.is_none() {
            self.resource_group = field(&["resourceGroup", "resource_group"]);
        }
        if self.resource_name.is_none() {
            self.resource_name = field(&["resourceName", "resource_name", "name"]);
        }
        if self.namespace.is_none() {
            self.namespace = field(&["namespace"]);
        }
        if self.subscription_id.is_none() {
            self.subscription_id = field(&["subscriptionId", "subscription_id"]);
        }
        self
    }
}

/// `/subscriptions/<id>/resourceGroups/...` → `<id>`.
pub fn subscription_from_resource_id(resource_id: &str) -> Option<String> {
    let mut parts = resource_id.split('/');
    let _leading = parts.next()?;
    let marker = parts.next()?;
    if !marker.eq_ignore_ascii_case("subscriptions") {
        return None;
    }
    parts
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn subscription_derived_from_resource_id() {
        assert_eq!(
            subscription_from_resource_id("/subscriptions/abc-123/resourceGroups/rg-pay/providers/x"),
            Some("abc-123".into())
        );
        assert_eq!(subscription_from_resource_id("/tenants/abc"), None);
        assert_eq!(subscription_from_resource_id(""), None);

        let mut ctx = AlertContext::from(ExecutionRecord::new("E1", "failed", "t"));
        ctx.resource_id = Some("/subscriptions/sub-9/resourceGroups/rg".into());
        assert_eq!(ctx.subscription().as_deref(), Some("sub-9"));
        ctx.subscription_id = Some("explicit".into());
        assert_eq!(ctx.subscription().as_deref(), Some("explicit"));
    }

    #[test]
    fn alert_flag_derivation() {
        let mut ctx = AlertContext::from(ExecutionRecord::new("E1", "succeeded", "t"));
        assert!(!ctx.is_alert());
        ctx.record.severity = Some(Severity::Sev3);
        assert!(ctx.is_alert());
        ctx.record.severity = None;
        ctx.record.status = "Timeout".into();
        assert!(ctx.is_alert());
        ctx.is_alert = Some(false);
        assert!(!ctx.is_alert());
    }

    #[test]
    fn deserializes_flat_camel_case_body() {
        let body = r#"{
            "exec_id": "E7",
            "status": "failed",
            "timestamp": "2025-09-15T10:06:00Z",
            "severity": "Sev2",
            "namespace": "payments",
            "resourceGroup": "rg-pay",
            "alertRule": "cpu-high",
            "isAlert": "true"
        }"#;
        let ctx: AlertContext = serde_json::from_str(body).unwrap();
        assert_eq!(ctx.exec_id(), "E7");
        assert_eq!(ctx.record.severity, Some(Severity::Sev2));
        assert_eq!(ctx.schema_name.as_deref(), Some("cpu-high"));
        assert_eq!(ctx.resource_group.as_deref(), Some("rg-pay"));
        assert_eq!(ctx.is_alert, Some(true));
    }

    #[test]
    fn unknown_severity_label_does_not_reject_body() {
        let body = r#"{"exec_id":"E1","status":"failed","timestamp":"2025-09-15T10:06:00Z","severity":"critical"}"#;
        let ctx: AlertContext = serde_json::from_str(body).unwrap();
        assert_eq!(ctx.record.severity, None);
        assert_eq!(ctx.record.raw_severity.as_deref(), Some("critical"));
        assert!(ctx.is_alert());

        let numeric = r#"{"exec_id":"E2","status":"succeeded","severity":1}"#;
        let ctx: AlertContext = serde_json::from_str(numeric).unwrap();
        assert_eq!(ctx.record.severity, Some(Severity::Sev1));
        assert_eq!(ctx.record.raw_severity.as_deref(), Some("1"));
    }

    #[test]
    fn enrich_fills_only_missing_fields() {
        let mut record = ExecutionRecord::new("E1", "failed", "t");
        record.resources = Some(serde_json::json!({
            "resourceId": "/subscriptions/s1/resourceGroups/rg-a",
            "resourceGroup": "rg-a",
            "namespace": "ns-from-blob"
        }));
        let mut ctx = AlertContext::from(record);
        ctx.namespace = Some("explicit-ns".into());
        let ctx = ctx.enrich_from_resources();
        assert_eq!(ctx.resource_group.as_deref(), Some("rg-a"));
        assert_eq!(ctx.namespace.as_deref(), Some("explicit-ns"));
        assert_eq!(ctx.subscription().as_deref(), Some("s1"));
    }
}
