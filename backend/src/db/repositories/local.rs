//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. All data lives in
//! `BTreeMap`s behind a single lock, so every write (notably the apply
//! transaction) is atomic with respect to concurrent readers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::db::repository::*;
use crate::models::*;

/// Fixture format accepted by [`LocalRepository::load_seed`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub requests: Vec<RescueRequest>,
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Number of rows loaded from a seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub requests: usize,
    pub warehouses: usize,
    pub resources: usize,
}

/// In-memory local repository.
///
/// # Example
/// ```
/// use relief_priority::db::repositories::LocalRepository;
/// use relief_priority::db::repository::ReliefDataRepository;
///
/// # tokio_test_block_on(async {
/// let repo = LocalRepository::new();
/// assert!(repo.list_open_requests().await.unwrap().is_empty());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    requests: BTreeMap<RequestId, RescueRequest>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    resources: BTreeMap<ResourceId, Resource>,
    recommendations: BTreeMap<RecommendationId, Recommendation>,
    distribution_logs: Vec<DistributionLogEntry>,
    feedback: Vec<RecommendationFeedback>,

    // ID counters
    next_recommendation_id: i64,
    next_log_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            warehouses: BTreeMap::new(),
            resources: BTreeMap::new(),
            recommendations: BTreeMap::new(),
            distribution_logs: Vec::new(),
            feedback: Vec::new(),
            next_recommendation_id: 1,
            next_log_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Insert or replace a rescue request.
    pub fn upsert_request(&self, request: RescueRequest) {
        self.data.write().requests.insert(request.id, request);
    }

    pub fn upsert_warehouse(&self, warehouse: Warehouse) {
        self.data.write().warehouses.insert(warehouse.id, warehouse);
    }

    pub fn upsert_resource(&self, resource: Resource) {
        self.data.write().resources.insert(resource.id, resource);
    }

    /// Load requests, warehouses and resources, replacing rows with the same id.
    pub fn load_seed(&self, seed: SeedData) -> SeedCounts {
        let counts = SeedCounts {
            requests: seed.requests.len(),
            warehouses: seed.warehouses.len(),
            resources: seed.resources.len(),
        };
        let mut data = self.data.write();
        data.requests
            .extend(seed.requests.into_iter().map(|r| (r.id, r)));
        data.warehouses
            .extend(seed.warehouses.into_iter().map(|w| (w.id, w)));
        data.resources
            .extend(seed.resources.into_iter().map(|r| (r.id, r)));
        counts
    }

    pub fn load_seed_file(&self, path: &Path) -> RepositoryResult<SeedCounts> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration(format!(
                "Failed to read seed file {}: {}",
                path.display(),
                e
            ))
        })?;
        let seed: SeedData = serde_json::from_str(&content).map_err(|e| {
            RepositoryError::ValidationError {
                message: format!("Invalid seed file: {}", e),
                context: ErrorContext::new("load_seed_file")
                    .with_details(path.display().to_string()),
            }
        })?;
        Ok(self.load_seed(seed))
    }

    /// Overwrite a resource's quantity, simulating an out-of-band stock change.
    pub fn set_resource_quantity(&self, id: ResourceId, quantity: i64) -> bool {
        match self.data.write().resources.get_mut(&id) {
            Some(resource) => {
                resource.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn set_request_status(&self, id: RequestId, status: RequestStatus) -> bool {
        match self.data.write().requests.get_mut(&id) {
            Some(request) => {
                request.status = status;
                true
            }
            None => false,
        }
    }

    /// Set the health status for testing connection failures.
    ///
    /// While unhealthy, every read and write fails with a connection error.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        let is_healthy = data.is_healthy;
        *data = LocalData {
            is_healthy,
            ..Default::default()
        };
    }

    pub fn recommendation_count(&self) -> usize {
        self.data.read().recommendations.len()
    }

    fn ensure_healthy(data: &LocalData, operation: &str) -> RepositoryResult<()> {
        if data.is_healthy {
            Ok(())
        } else {
            Err(RepositoryError::connection_with_context(
                "Local repository is marked unhealthy",
                ErrorContext::new(operation),
            ))
        }
    }

    fn recommendation_not_found(id: RecommendationId, operation: &str) -> RepositoryError {
        RepositoryError::not_found_with_context(
            format!("Recommendation {} not found", id),
            ErrorContext::new(operation)
                .with_entity("recommendation")
                .with_entity_id(id),
        )
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReliefDataRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn list_open_requests(&self) -> RepositoryResult<Vec<RescueRequest>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_open_requests")?;
        Ok(data
            .requests
            .values()
            .filter(|r| r.status.is_open())
            .cloned()
            .collect())
    }

    async fn get_request(&self, id: RequestId) -> RepositoryResult<RescueRequest> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "get_request")?;
        data.requests.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Request {} not found", id),
                ErrorContext::new("get_request")
                    .with_entity("rescue_request")
                    .with_entity_id(id),
            )
        })
    }

    async fn list_warehouses(&self) -> RepositoryResult<Vec<Warehouse>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_warehouses")?;
        Ok(data.warehouses.values().cloned().collect())
    }

    async fn list_resources(&self) -> RepositoryResult<Vec<Resource>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_resources")?;
        Ok(data.resources.values().cloned().collect())
    }

    async fn get_resource(&self, id: ResourceId) -> RepositoryResult<Resource> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "get_resource")?;
        data.resources.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Resource {} not found", id),
                ErrorContext::new("get_resource")
                    .with_entity("resource")
                    .with_entity_id(id),
            )
        })
    }
}

#[async_trait]
impl RecommendationRepository for LocalRepository {
    async fn insert_recommendations(
        &self,
        recommendations: Vec<NewRecommendation>,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Recommendation>> {
        let mut data = self.data.write();
        Self::ensure_healthy(&data, "insert_recommendations")?;

        let mut inserted = Vec::with_capacity(recommendations.len());
        for new in recommendations {
            let id = RecommendationId(data.next_recommendation_id);
            data.next_recommendation_id += 1;
            let recommendation = Recommendation::from_new(id, new, created_at);
            data.recommendations.insert(id, recommendation.clone());
            inserted.push(recommendation);
        }
        Ok(inserted)
    }

    async fn list_recommendations(
        &self,
        status: Option<RecommendationStatus>,
    ) -> RepositoryResult<Vec<Recommendation>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_recommendations")?;
        let mut list: Vec<Recommendation> = data
            .recommendations
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn get_recommendation(&self, id: RecommendationId) -> RepositoryResult<Recommendation> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "get_recommendation")?;
        data.recommendations
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::recommendation_not_found(id, "get_recommendation"))
    }

    async fn pending_request_refs(&self) -> RepositoryResult<HashMap<RequestId, RecommendationId>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "pending_request_refs")?;
        // Iterating in id order keeps the newest pending recommendation per request.
        Ok(data
            .recommendations
            .values()
            .filter(|r| r.is_pending())
            .filter_map(|r| r.request_ref.map(|req| (req, r.id)))
            .collect())
    }

    async fn apply_recommendation(
        &self,
        id: RecommendationId,
        applied_at: DateTime<Utc>,
    ) -> RepositoryResult<ApplyOutcome> {
        // One write guard spans the check, the decrement, the log and the
        // status change.
        let mut data = self.data.write();
        Self::ensure_healthy(&data, "apply_recommendation")?;

        let recommendation = data
            .recommendations
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::recommendation_not_found(id, "apply_recommendation"))?;
        if !recommendation.is_pending() {
            return Ok(ApplyOutcome::NotPending(recommendation.status));
        }

        let resource = data.resources.get_mut(&recommendation.resource_id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Resource {} not found", recommendation.resource_id),
                ErrorContext::new("apply_recommendation")
                    .with_entity("resource")
                    .with_entity_id(recommendation.resource_id),
            )
        })?;
        if resource.quantity < recommendation.suggested_quantity {
            return Ok(ApplyOutcome::InsufficientStock {
                available: resource.quantity,
                requested: recommendation.suggested_quantity,
            });
        }
        resource.quantity -= recommendation.suggested_quantity;
        let remaining_quantity = resource.quantity;

        let log_entry = DistributionLogEntry {
            id: DistributionLogId(data.next_log_id),
            recommendation_id: id,
            resource_id: recommendation.resource_id,
            warehouse_id: recommendation.warehouse_id,
            quantity: recommendation.suggested_quantity,
            destination: recommendation.destination.clone(),
            request_id: recommendation.request_ref,
            created_at: applied_at,
        };
        data.next_log_id += 1;
        data.distribution_logs.push(log_entry.clone());

        let stored = data
            .recommendations
            .get_mut(&id)
            .ok_or_else(|| Self::recommendation_not_found(id, "apply_recommendation"))?;
        stored.status = RecommendationStatus::Applied;
        stored.resolved_at = Some(applied_at);

        Ok(ApplyOutcome::Applied {
            recommendation: stored.clone(),
            log_entry,
            remaining_quantity,
        })
    }

    async fn dismiss_recommendation(
        &self,
        id: RecommendationId,
        dismissed_at: DateTime<Utc>,
    ) -> RepositoryResult<DismissOutcome> {
        let mut data = self.data.write();
        Self::ensure_healthy(&data, "dismiss_recommendation")?;

        let stored = data
            .recommendations
            .get_mut(&id)
            .ok_or_else(|| Self::recommendation_not_found(id, "dismiss_recommendation"))?;
        if !stored.is_pending() {
            return Ok(DismissOutcome::NotPending(stored.status));
        }
        stored.status = RecommendationStatus::Dismissed;
        stored.resolved_at = Some(dismissed_at);
        Ok(DismissOutcome::Dismissed(stored.clone()))
    }

    async fn record_feedback(&self, feedback: RecommendationFeedback) -> RepositoryResult<()> {
        let mut data = self.data.write();
        Self::ensure_healthy(&data, "record_feedback")?;
        data.feedback.push(feedback);
        Ok(())
    }

    async fn list_feedback(
        &self,
        id: RecommendationId,
    ) -> RepositoryResult<Vec<RecommendationFeedback>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_feedback")?;
        Ok(data
            .feedback
            .iter()
            .filter(|f| f.recommendation_id == id)
            .cloned()
            .collect())
    }

    async fn list_distribution_logs(&self) -> RepositoryResult<Vec<DistributionLogEntry>> {
        let data = self.data.read();
        Self::ensure_healthy(&data, "list_distribution_logs")?;
        Ok(data.distribution_logs.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn seeded() -> LocalRepository {
        let repo = LocalRepository::new();
        repo.upsert_warehouse(Warehouse {
            id: WarehouseId(1),
            name: "Central".to_string(),
            location: "Depot Rd, Springfield".to_string(),
            latitude: Some(1.0),
            longitude: Some(1.0),
            capacity: 100,
            last_audited_at: None,
        });
        repo.upsert_resource(Resource {
            id: ResourceId(10),
            resource_type: "water".to_string(),
            quantity: 8,
            unit: "crates".to_string(),
            reorder_level: 2,
            warehouse_id: WarehouseId(1),
        });
        repo
    }

    fn new_recommendation(quantity: i64) -> NewRecommendation {
        NewRecommendation {
            request_ref: Some(RequestId(5)),
            resource_id: ResourceId(10),
            resource_type: "water".to_string(),
            suggested_quantity: quantity,
            warehouse_id: WarehouseId(1),
            warehouse_name: "Central".to_string(),
            destination: "Elm St, Springfield".to_string(),
            rationale: "test".to_string(),
            confidence: 0.9,
            lead_time_minutes: Some(10),
            context: RecommendationContext::default(),
        }
    }

    #[tokio::test]
    async fn test_apply_decrements_and_logs() {
        let repo = seeded();
        let inserted = repo
            .insert_recommendations(vec![new_recommendation(8)], t0())
            .await
            .unwrap();
        let id = inserted[0].id;

        let outcome = repo.apply_recommendation(id, t0()).await.unwrap();
        match outcome {
            ApplyOutcome::Applied {
                recommendation,
                log_entry,
                remaining_quantity,
            } => {
                assert_eq!(recommendation.status, RecommendationStatus::Applied);
                assert_eq!(log_entry.quantity, 8);
                assert_eq!(remaining_quantity, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let second = repo.apply_recommendation(id, t0()).await.unwrap();
        assert_eq!(second, ApplyOutcome::NotPending(RecommendationStatus::Applied));
        assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 0);
        assert_eq!(repo.list_distribution_logs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_insufficient_stock_has_no_effect() {
        let repo = seeded();
        let inserted = repo
            .insert_recommendations(vec![new_recommendation(9)], t0())
            .await
            .unwrap();

        let outcome = repo.apply_recommendation(inserted[0].id, t0()).await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::InsufficientStock {
                available: 8,
                requested: 9
            }
        );
        let stored = repo.get_recommendation(inserted[0].id).await.unwrap();
        assert!(stored.is_pending());
        assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 8);
        assert!(repo.list_distribution_logs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_refs_exclude_resolved() {
        let repo = seeded();
        let inserted = repo
            .insert_recommendations(vec![new_recommendation(1)], t0())
            .await
            .unwrap();
        assert_eq!(repo.pending_request_refs().await.unwrap().len(), 1);

        repo.dismiss_recommendation(inserted[0].id, t0()).await.unwrap();
        assert!(repo.pending_request_refs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_repository_fails_reads() {
        let repo = seeded();
        repo.set_healthy(false);
        let err = repo.list_resources().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!repo.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_recommendation_is_not_found() {
        let repo = seeded();
        let err = repo
            .apply_recommendation(RecommendationId(99), t0())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
