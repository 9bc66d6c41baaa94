use std::sync::Arc;

use sprint_core::config::ServerConfig;
use sprint_core::entity::IdScheme;
use sprint_core::hub::Hub;
use sprint_core::store::{DocumentStore, MemoryStore, RedbStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub hub: Arc<Hub>,
    pub id_scheme: IdScheme,
    pub strict_validation: bool,
}

impl AppState {
    /// Open the configured store (redb file, or memory when none is set) and
    /// create the hub.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match &config.database {
            Some(path) => {
                tracing::info!("opening document store at {}", path.display());
                Arc::new(RedbStore::open(path)?)
            }
            None => {
                tracing::warn!("no database configured; records are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: &ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            hub: Arc::new(Hub::new(&config.hub, &config.resolved_public_url())),
            id_scheme: config.id_scheme,
            strict_validation: config.strict_validation,
        }
    }
}
