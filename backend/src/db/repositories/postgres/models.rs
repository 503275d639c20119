use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{
    distribution_logs, recommendation_feedback, recommendations, rescue_requests, resources,
    warehouses,
};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    DistributionLogEntry, DistributionLogId, FeedbackAction, NewRecommendation, Recommendation,
    RecommendationContext, RecommendationFeedback, RecommendationId, RecommendationStatus,
    RequestId, RequestPriority, RequestStatus, RescueRequest, Resource, ResourceId, Warehouse,
    WarehouseId,
};

fn invalid_column(table: &str, column: &str, value: &str) -> RepositoryError {
    RepositoryError::ValidationError {
        message: format!("Unexpected {} value '{}'", column, value),
        context: ErrorContext::new("decode_row").with_entity(table),
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = rescue_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RescueRequestRow {
    pub id: i64,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub priority: String,
    pub people_count: i32,
    pub needs_json: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RescueRequestRow {
    pub fn into_domain(self) -> RepositoryResult<RescueRequest> {
        let status = RequestStatus::parse(&self.status)
            .ok_or_else(|| invalid_column("rescue_requests", "status", &self.status))?;
        let priority = RequestPriority::parse(&self.priority)
            .ok_or_else(|| invalid_column("rescue_requests", "priority", &self.priority))?;
        // Needs are advisory; a malformed array degrades to "no needs".
        let needs: Vec<String> = serde_json::from_value(self.needs_json).unwrap_or_default();
        Ok(RescueRequest {
            id: RequestId(self.id),
            location: self.location,
            latitude: self.latitude,
            longitude: self.longitude,
            status,
            priority,
            people_count: u32::try_from(self.people_count.max(0)).unwrap_or(0),
            needs,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = warehouses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WarehouseRow {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capacity: i64,
    pub last_audited_at: Option<DateTime<Utc>>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: WarehouseId(row.id),
            name: row.name,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            capacity: row.capacity,
            last_audited_at: row.last_audited_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = resources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResourceRow {
    pub id: i64,
    pub resource_type: String,
    pub quantity: i64,
    pub unit: String,
    pub reorder_level: i64,
    pub warehouse_id: i64,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Resource {
            id: ResourceId(row.id),
            resource_type: row.resource_type,
            quantity: row.quantity,
            unit: row.unit,
            reorder_level: row.reorder_level,
            warehouse_id: WarehouseId(row.warehouse_id),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = recommendations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecommendationRow {
    pub id: i64,
    pub request_ref: Option<i64>,
    pub resource_id: i64,
    pub resource_type: String,
    pub suggested_quantity: i64,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub destination: String,
    pub rationale: String,
    pub confidence: f64,
    pub lead_time_minutes: Option<i64>,
    pub status: String,
    pub context_json: Value,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RecommendationRow {
    pub fn parsed_status(&self) -> RepositoryResult<RecommendationStatus> {
        RecommendationStatus::parse(&self.status)
            .ok_or_else(|| invalid_column("recommendations", "status", &self.status))
    }

    pub fn into_domain(self) -> RepositoryResult<Recommendation> {
        let status = self.parsed_status()?;
        let context: RecommendationContext =
            serde_json::from_value(self.context_json).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Failed to parse recommendation context: {e}"),
                    ErrorContext::new("decode_row")
                        .with_entity("recommendation")
                        .with_entity_id(self.id),
                )
            })?;
        Ok(Recommendation {
            id: RecommendationId(self.id),
            request_ref: self.request_ref.map(RequestId),
            resource_id: ResourceId(self.resource_id),
            resource_type: self.resource_type,
            suggested_quantity: self.suggested_quantity,
            warehouse_id: WarehouseId(self.warehouse_id),
            warehouse_name: self.warehouse_name,
            destination: self.destination,
            rationale: self.rationale,
            confidence: self.confidence,
            lead_time_minutes: self.lead_time_minutes,
            status,
            context,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = recommendations)]
pub struct NewRecommendationRow {
    pub request_ref: Option<i64>,
    pub resource_id: i64,
    pub resource_type: String,
    pub suggested_quantity: i64,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub destination: String,
    pub rationale: String,
    pub confidence: f64,
    pub lead_time_minutes: Option<i64>,
    pub status: String,
    pub context_json: Value,
    pub created_at: DateTime<Utc>,
}

impl NewRecommendationRow {
    pub fn from_domain(
        new: NewRecommendation,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Self> {
        let context_json = serde_json::to_value(&new.context).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Failed to encode recommendation context: {e}"),
                ErrorContext::new("insert_recommendations"),
            )
        })?;
        Ok(Self {
            request_ref: new.request_ref.map(|r| r.value()),
            resource_id: new.resource_id.value(),
            resource_type: new.resource_type,
            suggested_quantity: new.suggested_quantity,
            warehouse_id: new.warehouse_id.value(),
            warehouse_name: new.warehouse_name,
            destination: new.destination,
            rationale: new.rationale,
            confidence: new.confidence,
            lead_time_minutes: new.lead_time_minutes,
            status: RecommendationStatus::Pending.as_str().to_string(),
            context_json,
            created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = distribution_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DistributionLogRow {
    pub id: i64,
    pub recommendation_id: i64,
    pub resource_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub destination: String,
    pub request_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<DistributionLogRow> for DistributionLogEntry {
    fn from(row: DistributionLogRow) -> Self {
        DistributionLogEntry {
            id: DistributionLogId(row.id),
            recommendation_id: RecommendationId(row.recommendation_id),
            resource_id: ResourceId(row.resource_id),
            warehouse_id: WarehouseId(row.warehouse_id),
            quantity: row.quantity,
            destination: row.destination,
            request_id: row.request_id.map(RequestId),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = distribution_logs)]
pub struct NewDistributionLogRow {
    pub recommendation_id: i64,
    pub resource_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub destination: String,
    pub request_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = recommendation_feedback)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // id is only used for ordering
pub struct FeedbackRow {
    pub id: i64,
    pub recommendation_id: i64,
    pub action: String,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRow {
    pub fn into_domain(self) -> RepositoryResult<RecommendationFeedback> {
        let action = FeedbackAction::parse(&self.action)
            .ok_or_else(|| invalid_column("recommendation_feedback", "action", &self.action))?;
        Ok(RecommendationFeedback {
            recommendation_id: RecommendationId(self.recommendation_id),
            action,
            reason: self.reason,
            recorded_at: self.recorded_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = recommendation_feedback)]
pub struct NewFeedbackRow {
    pub recommendation_id: i64,
    pub action: String,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<RecommendationFeedback> for NewFeedbackRow {
    fn from(feedback: RecommendationFeedback) -> Self {
        Self {
            recommendation_id: feedback.recommendation_id.value(),
            action: feedback.action.as_str().to_string(),
            reason: feedback.reason,
            recorded_at: feedback.recorded_at,
        }
    }
}
