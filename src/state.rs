// src/state.rs
// Application state: all collaborators constructed once and injected

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::chat::Orchestrator;
use crate::config::CONFIG;
use crate::files::generate::FileGenerator;
use crate::llm::ModelGateway;
use crate::session::SessionStore;

pub struct AppState {
    pub store: Arc<SessionStore>,
    pub gateway: Arc<ModelGateway>,
    pub orchestrator: Orchestrator,
    pub file_generator: FileGenerator,
}

impl AppState {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Arc::new(SessionStore::new(pool));
        let gateway = Arc::new(ModelGateway::from_config(&CONFIG));
        let orchestrator = Orchestrator::new(store.clone(), gateway.clone());
        let file_generator = FileGenerator::new("generated_files")?;

        info!("application state initialized");
        Ok(Self {
            store,
            gateway,
            orchestrator,
            file_generator,
        })
    }
}
