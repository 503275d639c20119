//! Engine-level error taxonomy.

use crate::config::ConfigError;
use crate::db::repository::RepositoryError;
use crate::models::{RecommendationId, RecommendationStatus, ResourceId};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An upstream read (requests, warehouses, inventory) failed.
    #[error("Upstream data unavailable while {stage}: {source}")]
    DataUnavailable {
        stage: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("{0}")]
    NotFound(String),

    /// Stock changed after generation and no longer covers the suggestion.
    #[error("Insufficient stock for resource {resource_id}: {available} left, {requested} needed")]
    InsufficientStock {
        resource_id: ResourceId,
        available: i64,
        requested: i64,
    },

    #[error("Recommendation {recommendation_id} is already {status}")]
    AlreadyResolved {
        recommendation_id: RecommendationId,
        status: RecommendationStatus,
    },

    /// Run reports are only accepted for external feeds.
    #[error("Job '{name}' is run by the engine and cannot be reported externally")]
    EngineOwnedJob { name: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn data_unavailable(stage: &'static str, source: RepositoryError) -> Self {
        EngineError::DataUnavailable { stage, source }
    }

    /// Apply/dismiss conflicts the operator has to resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientStock { .. } | EngineError::AlreadyResolved { .. }
        )
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { message, .. } => EngineError::NotFound(message),
            other => EngineError::Repository(other),
        }
    }
}
