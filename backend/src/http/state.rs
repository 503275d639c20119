//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::{Orchestrator, RecommendationApplier};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub applier: RecommendationApplier,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let applier = RecommendationApplier::new(
            Arc::clone(orchestrator.repository()),
            Arc::clone(orchestrator.clock()),
        );
        Self {
            orchestrator,
            applier,
        }
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        self.orchestrator.repository()
    }
}
