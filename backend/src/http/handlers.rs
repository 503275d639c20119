//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer for business logic.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    ApplyResponse, DecisionRequest, DemandInsightsQuery, DemandInsightsResponse,
    DecisionResponse, DistributionLogEntry, FeedbackRequest, HealthResponse, JobRunReport,
    PrioritySnapshot, RecalculateResponse, Recommendation, RecommendationFeedback,
    RecommendationListQuery, SchedulerHealthRecord, SchedulerHealthResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::repository::{RecommendationRepository, ReliefDataRepository};
use crate::models::{FeedbackAction, RecommendationId, RecommendationStatus};
use crate::services::{Clock, TriggerOutcome};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

fn reason_of(body: Option<Json<DecisionRequest>>) -> Option<String> {
    body.and_then(|Json(b)| b.reason)
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Service liveness plus repository reachability.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository().health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Priorities
// =============================================================================

/// GET /v1/priorities
///
/// Ranked open requests from the last completed cycle; empty before the
/// first cycle finishes.
pub async fn list_priorities(
    State(state): State<AppState>,
) -> HandlerResult<Vec<PrioritySnapshot>> {
    let priorities = state
        .orchestrator
        .snapshot()
        .map(|s| s.priorities.clone())
        .unwrap_or_default();
    Ok(Json(priorities))
}

/// POST /v1/priorities/recalculate
///
/// Start a cycle in the background, or join the one already running.
pub async fn recalculate(
    State(state): State<AppState>,
) -> (StatusCode, Json<RecalculateResponse>) {
    let response = match state.orchestrator.trigger() {
        TriggerOutcome::Started { cycle_id } => RecalculateResponse {
            status: "started".to_string(),
            cycle_id: Some(cycle_id),
        },
        TriggerOutcome::Coalesced { cycle_id } => RecalculateResponse {
            status: "coalesced".to_string(),
            cycle_id,
        },
    };
    (StatusCode::ACCEPTED, Json(response))
}

// =============================================================================
// Recommendations
// =============================================================================

/// GET /v1/recommendations?status=pending
pub async fn list_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationListQuery>,
) -> HandlerResult<Vec<Recommendation>> {
    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(RecommendationStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown status '{}'; expected pending, applied or dismissed",
                raw
            ))
        })?),
    };
    let recommendations = state.repository().list_recommendations(status).await?;
    Ok(Json(recommendations))
}

/// GET /v1/recommendations/{id}
pub async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HandlerResult<Recommendation> {
    let recommendation = state
        .repository()
        .get_recommendation(RecommendationId::new(id))
        .await?;
    Ok(Json(recommendation))
}

/// POST /v1/recommendations/{id}/apply
///
/// 409 when stock no longer covers the suggestion or the recommendation is
/// already resolved.
pub async fn apply_recommendation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<DecisionRequest>>,
) -> HandlerResult<ApplyResponse> {
    let applied = state
        .applier
        .apply(RecommendationId::new(id), reason_of(body))
        .await?;
    Ok(Json(ApplyResponse {
        status: applied.recommendation.status.as_str().to_string(),
        recommendation: applied.recommendation,
        distribution_log: applied.log_entry,
        remaining_quantity: applied.remaining_quantity,
    }))
}

/// POST /v1/recommendations/{id}/dismiss
pub async fn dismiss_recommendation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<DecisionRequest>>,
) -> HandlerResult<DecisionResponse> {
    let recommendation = state
        .applier
        .dismiss(RecommendationId::new(id), reason_of(body))
        .await?;
    Ok(Json(DecisionResponse {
        status: recommendation.status.as_str().to_string(),
        recommendation,
    }))
}

/// POST /v1/recommendations/{id}/feedback
///
/// Operator decision expressed as feedback; runs the matching transition.
pub async fn post_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<FeedbackRequest>,
) -> HandlerResult<DecisionResponse> {
    let action = FeedbackAction::parse(&request.action).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Unknown action '{}'; expected applied or dismissed",
            request.action
        ))
    })?;
    let id = RecommendationId::new(id);
    let recommendation = match action {
        FeedbackAction::Applied => state.applier.apply(id, request.reason).await?.recommendation,
        FeedbackAction::Dismissed => state.applier.dismiss(id, request.reason).await?,
    };
    Ok(Json(DecisionResponse {
        status: recommendation.status.as_str().to_string(),
        recommendation,
    }))
}

/// GET /v1/recommendations/{id}/feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<RecommendationFeedback>> {
    let feedback = state.applier.feedback_for(RecommendationId::new(id)).await?;
    Ok(Json(feedback))
}

/// GET /v1/distribution-logs
pub async fn list_distribution_logs(
    State(state): State<AppState>,
) -> HandlerResult<Vec<DistributionLogEntry>> {
    let logs = state.repository().list_distribution_logs().await?;
    Ok(Json(logs))
}

// =============================================================================
// Demand and scheduler health
// =============================================================================

/// GET /v1/demand-insights?buckets=N
pub async fn get_demand_insights(
    State(state): State<AppState>,
    Query(query): Query<DemandInsightsQuery>,
) -> HandlerResult<DemandInsightsResponse> {
    let ring = state.orchestrator.config().demand.timeline_buckets;
    let buckets = match query.buckets {
        Some(0) => {
            return Err(AppError::BadRequest(
                "buckets must be at least 1".to_string(),
            ))
        }
        Some(n) => n.min(ring),
        None => ring,
    };

    let response = match state.orchestrator.snapshot() {
        Some(snapshot) => DemandInsightsResponse {
            heatmap: snapshot.demand_cells.clone(),
            timeline: snapshot.timeline_tail(buckets).to_vec(),
            latest_bucket_start: snapshot.latest_bucket_start(),
            generated_at: Some(snapshot.generated_at),
        },
        None => DemandInsightsResponse {
            heatmap: Vec::new(),
            timeline: Vec::new(),
            latest_bucket_start: None,
            generated_at: None,
        },
    };
    Ok(Json(response))
}

/// GET /v1/scheduler/health
pub async fn get_scheduler_health(
    State(state): State<AppState>,
) -> HandlerResult<SchedulerHealthResponse> {
    Ok(Json(SchedulerHealthResponse {
        schedulers: state.orchestrator.tracker().records(),
    }))
}

/// POST /v1/scheduler/{name}/report
///
/// Lets an external ingestion job record a run. Engine jobs answer 409.
pub async fn report_job_run(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(report): Json<JobRunReport>,
) -> HandlerResult<SchedulerHealthRecord> {
    let tracker = state.orchestrator.tracker();
    let started_at = report
        .started_at
        .unwrap_or_else(|| state.orchestrator.clock().now());
    let error = report.error.filter(|e| !e.trim().is_empty());
    tracker.report_external_run(&name, started_at, report.duration_ms, error.clone())?;
    if let Some(message) = error {
        log::warn!("External job '{}' reported failure: {}", name, message);
    }
    let record = tracker
        .record(&name)
        .ok_or_else(|| AppError::NotFound(format!("Scheduler job '{}' not found", name)))?;
    Ok(Json(record))
}
