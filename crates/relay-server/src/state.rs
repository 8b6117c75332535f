use relay_core::config::{ConfigHandle, RoutingConfig};
use relay_core::credentials::ChainedSecrets;
use relay_core::store::{EventStore, JsonlEventStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub store: Arc<dyn EventStore>,
    pub config: Arc<ConfigHandle>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        let store: Arc<dyn EventStore> = Arc::new(JsonlEventStore::new(&root));
        let initial = match load_config(&root) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "routing config unreadable at startup, serving an empty rule set");
                RoutingConfig::empty()
            }
        };
        Self {
            root,
            store,
            config: Arc::new(ConfigHandle::new(initial)),
        }
    }

    /// Re-read the routing document and secrets from disk and swap the
    /// snapshot. Picks up edits made by the CLI while the server runs.
    /// Blocking: call from `spawn_blocking`.
    pub fn reload_config(&self) -> relay_core::Result<Arc<RoutingConfig>> {
        let config = load_config(&self.root)?;
        self.config.replace(config);
        Ok(self.config.snapshot())
    }
}

fn load_config(root: &std::path::Path) -> relay_core::Result<RoutingConfig> {
    let secrets = ChainedSecrets::standard(root)?;
    RoutingConfig::load(root, &secrets)
}
