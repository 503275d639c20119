//! Data Transfer Objects for the HTTP API.
//!
//! Engine models already derive `Serialize`, so most responses reuse them
//! directly; the types here cover request bodies, query strings and
//! envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::models::{
    DemandCell, DemandTimelinePoint, DistributionLogEntry, PrioritySnapshot, Recommendation,
    RecommendationFeedback, SchedulerHealthRecord,
};

/// Response for a manual recalculation trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateResponse {
    /// "started" or "coalesced"
    pub status: String,
    /// Cycle that will produce the next snapshot
    pub cycle_id: Option<Uuid>,
}

/// Query parameters for listing recommendations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecommendationListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Optional body for apply and dismiss.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of the feedback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// "applied" or "dismissed"
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub status: String,
    pub recommendation: Recommendation,
    pub distribution_log: DistributionLogEntry,
    pub remaining_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub status: String,
    pub recommendation: Recommendation,
}

/// Query parameters for the demand insights endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DemandInsightsQuery {
    /// Number of trailing timeline buckets (default: the whole ring)
    #[serde(default)]
    pub buckets: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandInsightsResponse {
    pub heatmap: Vec<DemandCell>,
    pub timeline: Vec<DemandTimelinePoint>,
    pub latest_bucket_start: Option<DateTime<Utc>>,
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerHealthResponse {
    pub schedulers: Vec<SchedulerHealthRecord>,
}

/// Run report posted by an out-of-process job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunReport {
    #[serde(alias = "duration_ms")]
    pub duration_ms: u64,
    /// Defaults to the time the report is received
    #[serde(default, alias = "started_at")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}
