//! Operator decisions on recommendations.
//!
//! `pending -> applied` and `pending -> dismissed` are the only transitions.
//! The inventory effect of an apply is delegated to
//! [`RecommendationRepository::apply_recommendation`], which performs the
//! stock check, decrement, distribution log write and status change as one
//! atomic unit.

use std::sync::Arc;

use crate::db::repository::{FullRepository, RecommendationRepository};
use crate::models::{
    ApplyOutcome, DismissOutcome, DistributionLogEntry, FeedbackAction, Recommendation,
    RecommendationFeedback, RecommendationId,
};
use crate::services::clock::Clock;
use crate::services::error::{EngineError, EngineResult};

/// Result of a successful apply.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRecommendation {
    pub recommendation: Recommendation,
    pub log_entry: DistributionLogEntry,
    pub remaining_quantity: i64,
}

/// RecommendationApplier.
#[derive(Clone)]
pub struct RecommendationApplier {
    repo: Arc<dyn FullRepository>,
    clock: Arc<dyn Clock>,
}

impl RecommendationApplier {
    pub fn new(repo: Arc<dyn FullRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Apply a pending recommendation against current inventory.
    ///
    /// Fails with `InsufficientStock` (recommendation stays pending) when the
    /// resource no longer covers the suggested quantity, and with
    /// `AlreadyResolved` when the recommendation is not pending.
    pub async fn apply(
        &self,
        id: RecommendationId,
        reason: Option<String>,
    ) -> EngineResult<AppliedRecommendation> {
        let now = self.clock.now();
        match self.repo.apply_recommendation(id, now).await? {
            ApplyOutcome::Applied {
                recommendation,
                log_entry,
                remaining_quantity,
            } => {
                log::info!(
                    "Applied recommendation {}: {} x {} from warehouse {} ({} left)",
                    id,
                    log_entry.quantity,
                    recommendation.resource_type,
                    log_entry.warehouse_id,
                    remaining_quantity
                );
                self.record_feedback(id, FeedbackAction::Applied, reason)
                    .await;
                Ok(AppliedRecommendation {
                    recommendation,
                    log_entry,
                    remaining_quantity,
                })
            }
            ApplyOutcome::NotPending(status) => {
                log::warn!("Apply rejected: recommendation {} is {}", id, status);
                Err(EngineError::AlreadyResolved {
                    recommendation_id: id,
                    status,
                })
            }
            ApplyOutcome::InsufficientStock {
                available,
                requested,
            } => {
                let resource_id = self.repo.get_recommendation(id).await?.resource_id;
                log::warn!(
                    "Apply rejected: recommendation {} needs {} of resource {}, {} available",
                    id,
                    requested,
                    resource_id,
                    available
                );
                Err(EngineError::InsufficientStock {
                    resource_id,
                    available,
                    requested,
                })
            }
        }
    }

    /// Dismiss a pending recommendation; no inventory effect.
    pub async fn dismiss(
        &self,
        id: RecommendationId,
        reason: Option<String>,
    ) -> EngineResult<Recommendation> {
        let now = self.clock.now();
        match self.repo.dismiss_recommendation(id, now).await? {
            DismissOutcome::Dismissed(recommendation) => {
                log::info!("Dismissed recommendation {}", id);
                self.record_feedback(id, FeedbackAction::Dismissed, reason)
                    .await;
                Ok(recommendation)
            }
            DismissOutcome::NotPending(status) => Err(EngineError::AlreadyResolved {
                recommendation_id: id,
                status,
            }),
        }
    }

    /// Feedback is observational; a failed write is logged and swallowed.
    async fn record_feedback(
        &self,
        id: RecommendationId,
        action: FeedbackAction,
        reason: Option<String>,
    ) {
        let feedback = RecommendationFeedback {
            recommendation_id: id,
            action,
            reason: reason.filter(|r| !r.trim().is_empty()),
            recorded_at: self.clock.now(),
        };
        if let Err(e) = self.repo.record_feedback(feedback).await {
            log::warn!("Failed to record feedback for recommendation {}: {}", id, e);
        }
    }

    pub async fn feedback_for(
        &self,
        id: RecommendationId,
    ) -> EngineResult<Vec<RecommendationFeedback>> {
        // Unknown ids are NotFound, not an empty list.
        self.repo.get_recommendation(id).await?;
        Ok(self.repo.list_feedback(id).await?)
    }
}
