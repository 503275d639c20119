//! Read access to the relief domain entities.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{RequestId, RescueRequest, Resource, ResourceId, Warehouse};

/// Repository trait for the request/warehouse/resource read models.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ReliefDataRepository: Send + Sync {
    /// Check if the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// All requests whose status is `pending` or `in_progress`.
    async fn list_open_requests(&self) -> RepositoryResult<Vec<RescueRequest>>;

    /// Fetch a single request by id (any status).
    async fn get_request(&self, id: RequestId) -> RepositoryResult<RescueRequest>;

    async fn list_warehouses(&self) -> RepositoryResult<Vec<Warehouse>>;

    /// Every resource line across all warehouses.
    async fn list_resources(&self) -> RepositoryResult<Vec<Resource>>;

    /// Current state of a single resource line.
    async fn get_resource(&self, id: ResourceId) -> RepositoryResult<Resource>;
}
