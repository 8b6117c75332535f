use crate::config::RoutingConfig;
use crate::context::AlertContext;
use crate::credentials::SecretSource;
use crate::event::LogEvent;
use crate::reconcile::{reconcile_with_stats, ExecutionRecord, ReconcileStats};
use crate::route::{route, DispatchInstruction, RoutingOutcome};
use serde::Serialize;

/// Result of one reconcile-and-route pass over a batch of events.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub stats: ReconcileStats,
    pub outcomes: Vec<RoutingOutcome>,
}

impl PassReport {
    pub fn instructions(&self) -> impl Iterator<Item = &DispatchInstruction> {
        self.outcomes.iter().flat_map(|o| o.instructions.iter())
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.failures.len()).sum()
    }
}

/// Reconcile events, then route every execution against one config snapshot.
///
/// Executions are routed independently. Nothing here performs I/O; the
/// caller hands the instructions to a dispatcher.
pub struct RoutingPass<'a> {
    config: &'a RoutingConfig,
    secrets: &'a dyn SecretSource,
}

impl<'a> RoutingPass<'a> {
    pub fn new(config: &'a RoutingConfig, secrets: &'a dyn SecretSource) -> Self {
        Self { config, secrets }
    }

    /// `enrich` turns each reconciled record into the context rules see,
    /// e.g. attaching the alert metadata a caller knows about.
    pub fn run<F>(&self, events: &[LogEvent], enrich: F) -> PassReport
    where
        F: Fn(ExecutionRecord) -> AlertContext,
    {
        let (records, stats) = reconcile_with_stats(events);
        let outcomes: Vec<RoutingOutcome> = records
            .into_iter()
            .map(|record| self.route_one(&enrich(record)))
            .collect();
        tracing::info!(
            events = stats.total,
            discarded = stats.discarded,
            executions = stats.executions,
            instructions = outcomes.iter().map(|o| o.instructions.len()).sum::<usize>(),
            "routing pass complete"
        );
        PassReport { stats, outcomes }
    }

    pub fn route_one(&self, ctx: &AlertContext) -> RoutingOutcome {
        route(ctx, self.config, self.secrets)
    }
}

/// Default enrichment: alert fields taken from the record's resource blob.
pub fn enrich_from_resources(record: ExecutionRecord) -> AlertContext {
    AlertContext::from(record).enrich_from_resources()
}
