use std::sync::Arc;

use chrono::{DateTime, Utc};
use sparring_core::{AgentOrchestrator, Result, SparringConfig};

pub struct AppState {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn new(config: SparringConfig) -> Result<Self> {
        let orchestrator = AgentOrchestrator::from_config(config).await?;
        Ok(Self::with_orchestrator(Arc::new(orchestrator)))
    }

    pub fn with_orchestrator(orchestrator: Arc<AgentOrchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Utc::now(),
        }
    }

    pub async fn shutdown(&self) {
        log::info!("Terminating active agents...");
        match self.orchestrator.shutdown().await {
            Ok(count) => log::info!("Agent shutdown complete, {} terminated", count),
            Err(e) => log::error!("Agent shutdown failed: {}", e),
        }
    }
}
