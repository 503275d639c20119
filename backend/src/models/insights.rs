//! Engine outputs: demand signals, priority snapshots and recommendations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::relief::{RequestId, RequestPriority, RequestStatus, ResourceId, WarehouseId};
use crate::define_id_type;

define_id_type!(i64, RecommendationId);
define_id_type!(i64, DistributionLogId);

/// Resource type used for requests whose needs could not be resolved.
pub const UNSPECIFIED_RESOURCE_TYPE: &str = "unspecified";

/// Demand pressure for one (region, resource type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandCell {
    pub region: String,
    pub resource_type: String,
    pub request_count: usize,
    pub pending_count: usize,
    pub inventory_available: i64,
    pub demand_pressure: f64,
    pub median_wait_mins: Option<f64>,
}

impl DemandCell {
    pub fn key(&self) -> (&str, &str) {
        (self.region.as_str(), self.resource_type.as_str())
    }
}

/// One time-bucketed point of the demand trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandTimelinePoint {
    pub bucket_start: DateTime<Utc>,
    pub avg_demand_pressure: f64,
    pub median_wait_mins: Option<f64>,
}

/// Raw factor values behind a priority score, before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentWeights {
    pub age_weight: f64,
    pub proximity_weight: f64,
    pub hub_capacity_weight: f64,
    pub supply_pressure_weight: f64,
}

/// Ranked, explainable view of one open rescue request.
///
/// Snapshots are rebuilt from scratch on every scoring cycle and never
/// mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySnapshot {
    pub snapshot_id: Uuid,
    pub request_ref: RequestId,
    pub location: String,
    pub region: String,
    pub resource_type: String,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    pub people_count: u32,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub rationale: String,
    pub weights: ComponentWeights,
    pub nearest_warehouse_id: Option<WarehouseId>,
    pub nearest_warehouse_name: Option<String>,
    pub nearest_warehouse_distance_km: Option<f64>,
    pub hub_capacity_ratio: Option<f64>,
    pub recommendation_ref: Option<RecommendationId>,
}

impl PrioritySnapshot {
    /// People to serve; zero is treated as one.
    pub fn effective_people(&self) -> i64 {
        i64::from(self.people_count.max(1))
    }
}

/// Recommendation lifecycle. `Applied` and `Dismissed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Applied,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Applied => "applied",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(RecommendationStatus::Pending),
            "applied" => Some(RecommendationStatus::Applied),
            "dismissed" => Some(RecommendationStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RecommendationStatus::Pending)
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs captured when a recommendation was generated, so its rationale can
/// be reproduced after upstream data has moved on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationContext {
    pub demand_pressure: Option<f64>,
    /// Mean quantity of the recommended resource type across warehouses holding it.
    pub inventory_average: Option<f64>,
    pub weather_alert_level: Option<String>,
    pub supply_pressure: f64,
    pub hub_capacity_ratio: Option<f64>,
    pub logistics_weights: ComponentWeights,
    pub priority_score: i64,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<i64>,
    pub available_quantity: i64,
}

/// A recommendation ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecommendation {
    pub request_ref: Option<RequestId>,
    pub resource_id: ResourceId,
    pub resource_type: String,
    pub suggested_quantity: i64,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub destination: String,
    pub rationale: String,
    pub confidence: f64,
    pub lead_time_minutes: Option<i64>,
    pub context: RecommendationContext,
}

/// A persisted dispatch recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: RecommendationId,
    pub request_ref: Option<RequestId>,
    pub resource_id: ResourceId,
    pub resource_type: String,
    pub suggested_quantity: i64,
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub destination: String,
    pub rationale: String,
    pub confidence: f64,
    pub lead_time_minutes: Option<i64>,
    pub status: RecommendationStatus,
    pub context: RecommendationContext,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    pub fn from_new(
        id: RecommendationId,
        new: NewRecommendation,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            request_ref: new.request_ref,
            resource_id: new.resource_id,
            resource_type: new.resource_type,
            suggested_quantity: new.suggested_quantity,
            warehouse_id: new.warehouse_id,
            warehouse_name: new.warehouse_name,
            destination: new.destination,
            rationale: new.rationale,
            confidence: new.confidence,
            lead_time_minutes: new.lead_time_minutes,
            status: RecommendationStatus::Pending,
            context: new.context,
            created_at,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecommendationStatus::Pending
    }
}

/// Inventory movement written when a recommendation is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionLogEntry {
    pub id: DistributionLogId,
    pub recommendation_id: RecommendationId,
    pub resource_id: ResourceId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub destination: String,
    pub request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

/// Operator decision recorded against a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Applied,
    Dismissed,
}

impl FeedbackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackAction::Applied => "applied",
            FeedbackAction::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "applied" | "apply" => Some(FeedbackAction::Applied),
            "dismissed" | "dismiss" => Some(FeedbackAction::Dismissed),
            _ => None,
        }
    }
}

/// Observational feedback kept for future weight tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationFeedback {
    pub recommendation_id: RecommendationId,
    pub action: FeedbackAction,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of the repository-level apply transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied {
        recommendation: Recommendation,
        log_entry: DistributionLogEntry,
        remaining_quantity: i64,
    },
    NotPending(RecommendationStatus),
    InsufficientStock {
        available: i64,
        requested: i64,
    },
}

/// Outcome of the repository-level dismiss transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DismissOutcome {
    Dismissed(Recommendation),
    NotPending(RecommendationStatus),
}
