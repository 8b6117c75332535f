use crate::config::{Action, RoutingConfig};
use crate::context::AlertContext;
use crate::credentials::{CredentialResolver, Secret, SecretSource};
use crate::reconcile::ExecutionRecord;
use crate::rules::{actions_of, matching_rules};
use crate::status;
use crate::types::{ChannelKind, Severity};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Notification payload
// ---------------------------------------------------------------------------

/// Channel-neutral message built from an execution record. Adapters render
/// it for their provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: Vec<String>,
    /// Incident priority `P1`..`P5`.
    pub priority: String,
    /// Stable de-duplication key on the provider side.
    pub alias: String,
    /// The alert was resolved upstream: close rather than open.
    pub close: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub status: String,
}

const DEFAULT_PRIORITY: &str = "P3";

impl Notification {
    pub fn from_record(record: &ExecutionRecord) -> Self {
        let subject = record
            .name
            .as_deref()
            .or(record.runbook.as_deref())
            .unwrap_or("execution");
        let mut body = vec![format!("Status: {}", record.status)];
        if let Some(runbook) = &record.runbook {
            body.push(format!("Runbook: {runbook}"));
        }
        match (record.severity, &record.raw_severity) {
            (Some(sev), _) => body.push(format!("Severity: {sev}")),
            (None, Some(raw)) => body.push(format!("Severity: {raw} (unrecognized)")),
            (None, None) => {}
        }
        if let Some(worker) = &record.worker {
            body.push(format!("Worker: {worker}"));
        }
        if let Some(condition) = &record.monitor_condition {
            body.push(format!("Monitor condition: {condition}"));
        }
        body.push(format!("Timestamp: {}", record.timestamp));

        Self {
            title: format!("[{}] {}: {subject}", record.exec_id, record.status),
            body,
            priority: record
                .severity
                .map(Severity::incident_priority)
                .unwrap_or(DEFAULT_PRIORITY)
                .to_string(),
            alias: record.exec_id.clone(),
            close: record
                .monitor_condition
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case("resolved")),
            severity: record.severity,
            status: record.status.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing outcome
// ---------------------------------------------------------------------------

/// One resolved, deduplicated delivery for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchInstruction {
    pub channel: ChannelKind,
    pub target: String,
    pub secret: Secret,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Credential scope the secret came from.
    pub scope: String,
    /// Rules that produced this instruction; empty for fallback deliveries.
    pub rule_indices: Vec<usize>,
    pub notification: Notification,
}

/// An action dropped because its credentials did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    pub channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    Matched,
    Fallback,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingOutcome {
    pub exec_id: String,
    pub status: String,
    pub reason: RouteReason,
    pub matched_rules: Vec<usize>,
    pub instructions: Vec<DispatchInstruction>,
    pub failures: Vec<ActionFailure>,
}

// ---------------------------------------------------------------------------
// route
// ---------------------------------------------------------------------------

/// Decide the dispatch instructions for one execution.
///
/// Credential errors are per action: the action is dropped and reported in
/// `failures`, the rest of the outcome is unaffected.
pub fn route(ctx: &AlertContext, config: &RoutingConfig, secrets: &dyn SecretSource) -> RoutingOutcome {
    let resolver = CredentialResolver::new(config, secrets);
    let notification = Notification::from_record(&ctx.record);
    let matched_rules = matching_rules(ctx, config);

    let (reason, candidates): (RouteReason, Vec<(Option<usize>, Action)>) = if !matched_rules.is_empty() {
        (
            RouteReason::Matched,
            actions_of(config, &matched_rules)
                .into_iter()
                .map(|m| (Some(m.rule_index), m.action))
                .collect(),
        )
    } else {
        match &config.fallback {
            Some(fallback) if status::is_failure(&ctx.record.status) => {
                tracing::info!(exec_id = %ctx.exec_id(), "no routing rule matched, using fallback actions");
                (
                    RouteReason::Fallback,
                    fallback.iter().cloned().map(|a| (None, a)).collect(),
                )
            }
            _ => {
                tracing::debug!(exec_id = %ctx.exec_id(), "no routing rule matched");
                (RouteReason::NoMatch, Vec::new())
            }
        }
    };

    let mut instructions: Vec<DispatchInstruction> = Vec::new();
    let mut failures = Vec::new();
    for (rule_index, action) in candidates {
        let kind = action.kind();
        let team = action.team().map(str::to_string);
        let credential = match resolver.resolve(kind, team.as_deref(), action.target_override()) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(
                    exec_id = %ctx.exec_id(),
                    channel = %kind,
                    team = team.as_deref().unwrap_or("default"),
                    error = %e,
                    "dropping routing action"
                );
                failures.push(ActionFailure {
                    rule_index,
                    channel: kind,
                    team,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if let Some(existing) = instructions
            .iter_mut()
            .find(|i| i.channel == kind && i.target == credential.target)
        {
            if let Some(index) = rule_index {
                if !existing.rule_indices.contains(&index) {
                    existing.rule_indices.push(index);
                }
            }
            continue;
        }
        instructions.push(DispatchInstruction {
            channel: kind,
            target: credential.target,
            secret: credential.secret,
            team,
            scope: credential.scope,
            rule_indices: rule_index.into_iter().collect(),
            notification: notification.clone(),
        });
    }

    RoutingOutcome {
        exec_id: ctx.exec_id().to_string(),
        status: ctx.record.status.clone(),
        reason,
        matched_rules,
        instructions,
        failures,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
