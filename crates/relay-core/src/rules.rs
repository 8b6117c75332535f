//! Rule matching.
//!
//! Evaluation is additive: every rule is checked independently and every
//! matching rule contributes its actions, in rule order. A mismatch is logged
//! at `debug` with the condition that failed.

use crate::config::{Action, RoutingConfig, When};
use crate::context::AlertContext;
use crate::status;
use serde::Serialize;

impl When {
    /// True when every present condition holds. A wildcard matches
    /// unconditionally; an inert clause never matches.
    pub fn matches(&self, ctx: &AlertContext) -> bool {
        match self.mismatch(ctx) {
            None => true,
            Some(reason) => {
                tracing::debug!(exec_id = %ctx.exec_id(), %reason, "routing mismatch");
                false
            }
        }
    }

    /// The first failing condition, or `None` when the clause matches.
    pub fn mismatch(&self, ctx: &AlertContext) -> Option<String> {
        if self.is_wildcard() {
            return None;
        }
        if self.is_inert() {
            return Some("rule has no conditions".to_string());
        }

        let record = &ctx.record;
        let status = status::normalize(&record.status);

        if self.final_only == Some(true) && !status::is_final(&status) {
            return Some(format!("status '{status}' is not final"));
        }
        if let Some(allowed) = self.status_in.as_ref().filter(|s| !s.is_empty()) {
            if !allowed.iter().any(|s| status::normalize(s) == status) {
                return Some(format!("status '{status}' not in statusIn {allowed:?}"));
            }
        }

        if let Some(min) = self.severity_min {
            match record.severity {
                Some(sev) if sev.ordinal() <= min.ordinal() => {}
                Some(sev) => return Some(format!("severity {sev} is less critical than severityMin {min}")),
                None => return Some(format!("no severity for severityMin {min}")),
            }
        }
        if let Some(max) = self.severity_max {
            match record.severity {
                Some(sev) if sev.ordinal() >= max.ordinal() => {}
                Some(sev) => return Some(format!("severity {sev} is more critical than severityMax {max}")),
                None => return Some(format!("no severity for severityMax {max}")),
            }
        }

        let subscription = ctx.subscription();
        let exact = [
            ("resourceGroup", &self.resource_group, ctx.resource_group.as_deref()),
            ("resourceId", &self.resource_id, ctx.resource_id.as_deref()),
            ("resourceName", &self.resource_name, ctx.resource_name.as_deref()),
            ("namespace", &self.namespace, ctx.namespace.as_deref()),
            ("schemaName", &self.schema_name, ctx.schema_name.as_deref()),
            ("subscriptionId", &self.subscription_id, subscription.as_deref()),
        ];
        for (field, wanted, actual) in exact {
            let Some(wanted) = wanted else { continue };
            if actual != Some(wanted.as_str()) {
                return Some(format!("{field} {actual:?} != '{wanted}'"));
            }
        }

        if let Some(prefix) = &self.resource_group_prefix {
            let group = ctx.resource_group.as_deref();
            if !group.is_some_and(|g| g.starts_with(prefix.as_str())) {
                return Some(format!("resourceGroup {group:?} does not start with '{prefix}'"));
            }
        }

        if let Some(wanted) = self.is_alert {
            let actual = ctx.is_alert();
            if wanted != actual {
                return Some(format!("isAlert {actual} != {wanted}"));
            }
        }
        if let Some(wanted) = self.on_call {
            if record.on_call != wanted {
                return Some(format!("onCall {} != {wanted}", record.on_call));
            }
        }

        None
    }
}

/// An action contributed by a matching rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedAction {
    pub rule_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    pub action: Action,
}

/// Indices of the rules whose clause matches, whether or not they have actions.
pub fn matching_rules(ctx: &AlertContext, config: &RoutingConfig) -> Vec<usize> {
    let mut matched = Vec::new();
    for (index, rule) in config.rules.iter().enumerate() {
        if !rule.when.matches(ctx) {
            continue;
        }
        tracing::info!(
            exec_id = %ctx.exec_id(),
            rule = %rule.label(index),
            actions = rule.then.len(),
            "routing rule matched"
        );
        matched.push(index);
    }
    matched
}

/// Actions of the given rules, in rule order.
pub fn actions_of(config: &RoutingConfig, rule_indices: &[usize]) -> Vec<MatchedAction> {
    rule_indices
        .iter()
        .filter_map(|&index| config.rules.get(index).map(|rule| (index, rule)))
        .flat_map(|(index, rule)| {
            rule.then.iter().map(move |action| MatchedAction {
                rule_index: index,
                rule_name: rule.name.clone(),
                action: action.clone(),
            })
        })
        .collect()
}

/// Every action of every matching rule, in rule order.
pub fn matching_actions(ctx: &AlertContext, config: &RoutingConfig) -> Vec<MatchedAction> {
    actions_of(config, &matching_rules(ctx, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rule;
    use crate::reconcile::ExecutionRecord;
    use crate::types::Severity;

    fn ctx(status: &str, severity: Option<Severity>) -> AlertContext {
        let mut record = ExecutionRecord::new("E1", status, "2025-09-15T10:06:00Z");
        record.severity = severity;
        AlertContext::from(record)
    }

    fn rule(when: When, then: Vec<Action>) -> Rule {
        Rule {
            name: None,
            when,
            then,
        }
    }

    #[test]
    fn wildcard_matches_everything() {
        let when = When::wildcard();
        assert!(when.matches(&ctx("pending", None)));
        assert!(when.matches(&ctx("whatever", Some(Severity::Sev4))));
        assert!(when.matches(&ctx("", None)));
    }

    #[test]
    fn wildcard_ignores_other_conditions() {
        let when = When {
            namespace: Some("payments".into()),
            status_in: Some(vec!["failed".into()]),
            ..When::wildcard()
        };
        assert!(when.matches(&ctx("succeeded", None)));
    }

    #[test]
    fn inert_clause_never_matches() {
        assert!(!When::default().matches(&ctx("failed", Some(Severity::Sev0))));
        let only_empty = When {
            status_in: Some(vec![]),
            ..When::default()
        };
        assert!(!only_empty.matches(&ctx("failed", None)));
    }

    #[test]
    fn status_in_is_case_insensitive() {
        let when = When {
            status_in: Some(vec!["Failed".into(), "ERROR".into()]),
            ..When::default()
        };
        assert!(when.matches(&ctx("failed", None)));
        assert!(when.matches(&ctx(" error", None)));
        assert!(!when.matches(&ctx("succeeded", None)));
    }

    #[test]
    fn severity_bounds_are_inclusive() {
        let when = When {
            severity_min: Some(Severity::Sev3),
            severity_max: Some(Severity::Sev1),
            ..When::default()
        };
        assert!(!when.matches(&ctx("failed", Some(Severity::Sev0))));
        assert!(when.matches(&ctx("failed", Some(Severity::Sev1))));
        assert!(when.matches(&ctx("failed", Some(Severity::Sev2))));
        assert!(when.matches(&ctx("failed", Some(Severity::Sev3))));
        assert!(!when.matches(&ctx("failed", Some(Severity::Sev4))));
        assert!(!when.matches(&ctx("failed", None)));
    }

    #[test]
    fn single_severity_bound_is_one_sided() {
        let at_least_sev2 = When {
            severity_min: Some(Severity::Sev2),
            ..When::default()
        };
        assert!(at_least_sev2.matches(&ctx("failed", Some(Severity::Sev0))));
        assert!(!at_least_sev2.matches(&ctx("failed", Some(Severity::Sev3))));
    }

    #[test]
    fn absent_context_field_is_a_mismatch() {
        let when = When {
            namespace: Some("payments".into()),
            ..When::default()
        };
        let mut c = ctx("failed", None);
        assert!(!when.matches(&c));
        c.namespace = Some("Payments".into());
        assert!(!when.matches(&c), "equality is case-sensitive");
        c.namespace = Some("payments".into());
        assert!(when.matches(&c));
    }

    #[test]
    fn subscription_matches_derived_value() {
        let when = When {
            subscription_id: Some("sub-1".into()),
            ..When::default()
        };
        let mut c = ctx("failed", None);
        c.resource_id = Some("/subscriptions/sub-1/resourceGroups/rg".into());
        assert!(when.matches(&c));
    }

    #[test]
    fn resource_group_prefix() {
        let when = When {
            resource_group_prefix: Some("rg-pay".into()),
            ..When::default()
        };
        let mut c = ctx("failed", None);
        c.resource_group = Some("rg-payments-eu".into());
        assert!(when.matches(&c));
        c.resource_group = Some("rg-search".into());
        assert!(!when.matches(&c));
    }

    #[test]
    fn is_alert_uses_derived_flag() {
        let when = When {
            is_alert: Some(true),
            ..When::default()
        };
        assert!(when.matches(&ctx("failed", None)));
        assert!(when.matches(&ctx("succeeded", Some(Severity::Sev2))));
        assert!(!when.matches(&ctx("succeeded", None)));
        let mut explicit = ctx("failed", None);
        explicit.is_alert = Some(false);
        assert!(!when.matches(&explicit));
    }

    #[test]
    fn final_only_and_on_call() {
        let when = When {
            final_only: Some(true),
            on_call: Some(true),
            ..When::default()
        };
        let mut c = ctx("running", None);
        c.record.on_call = true;
        assert!(!when.matches(&c));
        c.record.status = "timeout".into();
        assert!(when.matches(&c));
        c.record.on_call = false;
        assert!(!when.matches(&c));
    }

    #[test]
    fn all_matching_rules_contribute() {
        let mut config = RoutingConfig::empty();
        config.rules = vec![
            rule(
                When {
                    status_in: Some(vec!["failed".into(), "error".into()]),
                    ..When::default()
                },
                vec![Action::chat(Some("payments"))],
            ),
            rule(
                When {
                    namespace: Some("search".into()),
                    ..When::default()
                },
                vec![Action::incident(None)],
            ),
            rule(When::wildcard(), vec![Action::chat(Some("platform"))]),
        ];
        let matched = matching_actions(&ctx("failed", None), &config);
        let indices: Vec<usize> = matched.iter().map(|m| m.rule_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(matched[1].action, Action::chat(Some("platform")));
        assert_eq!(matching_rules(&ctx("failed", None), &config), vec![0, 2]);
    }
}
