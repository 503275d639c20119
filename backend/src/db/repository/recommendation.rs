//! Persistence of recommendations and the effects of operator decisions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::RepositoryResult;
use crate::models::{
    ApplyOutcome, DismissOutcome, DistributionLogEntry, NewRecommendation, Recommendation,
    RecommendationFeedback, RecommendationId, RecommendationStatus, RequestId,
};

/// Repository trait for the recommendation lifecycle.
///
/// Recommendations are never deleted; they only move from `pending` to one of
/// the terminal states.
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// Persist freshly generated recommendations as `pending`.
    async fn insert_recommendations(
        &self,
        recommendations: Vec<NewRecommendation>,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Recommendation>>;

    /// List recommendations, newest first, optionally filtered by status.
    async fn list_recommendations(
        &self,
        status: Option<RecommendationStatus>,
    ) -> RepositoryResult<Vec<Recommendation>>;

    async fn get_recommendation(&self, id: RecommendationId) -> RepositoryResult<Recommendation>;

    /// Map of request id to its current pending recommendation.
    async fn pending_request_refs(&self) -> RepositoryResult<HashMap<RequestId, RecommendationId>>;

    /// Apply a recommendation as one atomic unit.
    ///
    /// Within a single transaction: verify the recommendation is still
    /// pending, decrement the resource by the suggested quantity only when
    /// enough stock remains, write the distribution log entry, and mark the
    /// recommendation `applied`. Conflicts are reported through
    /// [`ApplyOutcome`] and leave no effect behind.
    async fn apply_recommendation(
        &self,
        id: RecommendationId,
        applied_at: DateTime<Utc>,
    ) -> RepositoryResult<ApplyOutcome>;

    /// Transition a pending recommendation to `dismissed`.
    async fn dismiss_recommendation(
        &self,
        id: RecommendationId,
        dismissed_at: DateTime<Utc>,
    ) -> RepositoryResult<DismissOutcome>;

    async fn record_feedback(&self, feedback: RecommendationFeedback) -> RepositoryResult<()>;

    async fn list_feedback(
        &self,
        id: RecommendationId,
    ) -> RepositoryResult<Vec<RecommendationFeedback>>;

    /// Distribution log entries, newest first.
    async fn list_distribution_logs(&self) -> RepositoryResult<Vec<DistributionLogEntry>>;
}
