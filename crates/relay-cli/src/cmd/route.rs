use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use relay_core::config::RoutingConfig;
use relay_core::context::AlertContext;
use relay_core::credentials::ChainedSecrets;
use relay_core::dispatch::{dispatch_all, DryRunDispatcher};
use relay_core::pass::{PassReport, RoutingPass};
use relay_core::reconcile::ExecutionRecord;
use relay_core::route::RouteReason;
use relay_core::store::{EventStore, JsonlEventStore};
use relay_core::RelayError;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Partition key YYYYMMDD (default: today, UTC)
    #[arg(long, short = 'p')]
    pub partition: Option<String>,

    /// Route a single execution
    #[arg(long = "exec")]
    pub exec_id: Option<String>,

    /// Alert namespace to match rules against
    #[arg(long)]
    pub namespace: Option<String>,

    /// Alert resource group
    #[arg(long)]
    pub resource_group: Option<String>,

    /// Alert subscription id
    #[arg(long)]
    pub subscription: Option<String>,

    /// Alert rule / schema name
    #[arg(long)]
    pub schema: Option<String>,

    /// Force the alert flag instead of deriving it
    #[arg(long, value_name = "true|false")]
    pub alert: Option<bool>,

    /// Hand the instructions to the dry-run dispatcher
    #[arg(long)]
    pub dispatch: bool,
}

impl RouteArgs {
    /// Alert fields from the command line override whatever the record's
    /// resource blob supplied.
    fn context_for(&self, record: ExecutionRecord) -> AlertContext {
        let mut ctx = AlertContext::from(record).enrich_from_resources();
        if let Some(v) = &self.namespace {
            ctx.namespace = Some(v.clone());
        }
        if let Some(v) = &self.resource_group {
            ctx.resource_group = Some(v.clone());
        }
        if let Some(v) = &self.subscription {
            ctx.subscription_id = Some(v.clone());
        }
        if let Some(v) = &self.schema {
            ctx.schema_name = Some(v.clone());
        }
        if self.alert.is_some() {
            ctx.is_alert = self.alert;
        }
        ctx
    }
}

pub fn run(root: &Path, args: RouteArgs, json: bool) -> anyhow::Result<()> {
    let partition = super::partition_or_today(args.partition.as_deref())?;
    let mut events = JsonlEventStore::new(root)
        .fetch(&partition)
        .with_context(|| format!("failed to read partition {partition}"))?
        .events;
    if let Some(exec_id) = &args.exec_id {
        events.retain(|e| e.exec_id() == Some(exec_id.as_str()));
        if events.is_empty() {
            return Err(RelayError::ExecutionNotFound(exec_id.clone()))
                .with_context(|| format!("partition {partition}"));
        }
    }

    let secrets = ChainedSecrets::standard(root).context("failed to read secrets")?;
    let config = RoutingConfig::load(root, &secrets).context("failed to load routing config")?;
    let report = RoutingPass::new(&config, &secrets).run(&events, |record| args.context_for(record));
    let dispatched = args
        .dispatch
        .then(|| dispatch_all(&DryRunDispatcher, report.instructions()));

    if json {
        return print_json(&serde_json::json!({
            "partition_key": partition,
            "stats": report.stats,
            "outcomes": report.outcomes,
            "dispatch": dispatched,
        }));
    }

    print_report(&report);
    if let Some(dispatched) = dispatched {
        println!(
            "\nDry-run dispatch: {} delivered, {} failed.",
            dispatched.delivered,
            dispatched.failures.len()
        );
    }
    Ok(())
}

fn reason_label(reason: RouteReason) -> &'static str {
    match reason {
        RouteReason::Matched => "matched",
        RouteReason::Fallback => "fallback",
        RouteReason::NoMatch => "no match",
    }
}

fn print_report(report: &PassReport) {
    if report.outcomes.is_empty() {
        println!("No executions to route.");
        return;
    }

    let mut rows = Vec::new();
    for outcome in &report.outcomes {
        if outcome.instructions.is_empty() {
            rows.push(vec![
                outcome.exec_id.clone(),
                outcome.status.clone(),
                reason_label(outcome.reason).to_string(),
                "-".into(),
                "-".into(),
                "-".into(),
                "-".into(),
            ]);
        }
        for instruction in &outcome.instructions {
            let rules: Vec<String> = instruction.rule_indices.iter().map(|i| format!("#{i}")).collect();
            rows.push(vec![
                outcome.exec_id.clone(),
                outcome.status.clone(),
                reason_label(outcome.reason).to_string(),
                instruction.channel.to_string(),
                instruction.target.clone(),
                instruction.scope.clone(),
                if rules.is_empty() { "-".into() } else { rules.join(",") },
            ]);
        }
    }
    print_table(
        &["EXEC ID", "STATUS", "REASON", "CHANNEL", "TARGET", "SCOPE", "RULES"],
        rows,
    );

    let failures: Vec<_> = report
        .outcomes
        .iter()
        .flat_map(|o| o.failures.iter().map(move |f| (o.exec_id.as_str(), f)))
        .collect();
    if !failures.is_empty() {
        println!();
        for (exec_id, failure) in failures {
            println!("[dropped] {exec_id}: {}", failure.error);
        }
    }
}
