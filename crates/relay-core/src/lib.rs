pub mod config;
pub mod context;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod io;
pub mod pass;
pub mod paths;
pub mod query;
pub mod reconcile;
pub mod route;
pub mod rules;
pub mod serde_ext;
pub mod status;
pub mod store;
pub mod types;

pub use error::{RelayError, Result};
pub use reconcile::{reconcile, reconcile_with_stats, ExecutionRecord, Reconciler};
pub use route::{route, DispatchInstruction, RoutingOutcome};
