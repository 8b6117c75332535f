//! The seam to channel adapters. Delivery mechanics (retries, rate limits,
//! provider idempotency) belong to the adapter behind [`Dispatcher`].

use crate::error::Result;
use crate::route::DispatchInstruction;
use crate::types::ChannelKind;
use serde::Serialize;

pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, instruction: &DispatchInstruction) -> Result<()>;
}

/// Logs each instruction instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunDispatcher;

impl Dispatcher for DryRunDispatcher {
    fn dispatch(&self, instruction: &DispatchInstruction) -> Result<()> {
        tracing::info!(
            channel = %instruction.channel,
            target = %instruction.target,
            scope = %instruction.scope,
            title = %instruction.notification.title,
            priority = %instruction.notification.priority,
            close = instruction.notification.close,
            "dry-run dispatch"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchFailure {
    pub channel: ChannelKind,
    pub target: String,
    pub alias: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

/// Hand every instruction to `dispatcher`. A failed delivery is recorded and
/// the remaining instructions still go out.
pub fn dispatch_all<'a>(
    dispatcher: &dyn Dispatcher,
    instructions: impl IntoIterator<Item = &'a DispatchInstruction>,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for instruction in instructions {
        match dispatcher.dispatch(instruction) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    channel = %instruction.channel,
                    target = %instruction.target,
                    error = %e,
                    "dispatch failed"
                );
                report.failures.push(DispatchFailure {
                    channel: instruction.channel,
                    target: instruction.target.clone(),
                    alias: instruction.notification.alias.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}
