use std::sync::Arc;

use rftm_core::runner::TestRunner;
use rftm_core::types::Caller;
use rftm_db::Store;
use rftm_execution::Orchestrator;
use rftm_storage::ArtifactStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc` or `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServerConfig>,
    /// Identity recorded on every write. Always `system`.
    pub caller: Caller,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        artifacts: Arc<dyn ArtifactStore>,
        runner: Arc<dyn TestRunner>,
        config: ServerConfig,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&artifacts),
            runner,
        ));
        Self {
            store,
            artifacts,
            orchestrator,
            config: Arc::new(config),
            caller: Caller::system(),
        }
    }
}
