//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//! - Apply runs in one transaction with a guarded stock decrement
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

use crate::db::repository::{
    ErrorContext, RecommendationRepository, ReliefDataRepository, RepositoryError,
    RepositoryResult,
};
use crate::models::{
    ApplyOutcome, DismissOutcome, DistributionLogEntry, NewRecommendation, Recommendation,
    RecommendationFeedback, RecommendationId, RecommendationStatus, RequestId, RequestStatus,
    RescueRequest, Resource, ResourceId, Warehouse,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;
        let defaults = Self::default();

        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub connections_in_use: u32,
    pub idle_connections: u32,
    pub max_size: u32,
    pub total_queries: u64,
    pub failed_queries: u64,
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Migration failed: {}", e),
                    ErrorContext::new("run_migrations"),
                )
            })?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Execute a database operation with automatic retry for transient failures.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        log::debug!("Retrying after transient error: {}", e);
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn recommendation_not_found(id: RecommendationId, operation: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Recommendation {} not found", id),
        ErrorContext::new(operation)
            .with_entity("recommendation")
            .with_entity_id(id),
    )
}

fn resource_not_found(id: ResourceId, operation: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Resource {} not found", id),
        ErrorContext::new(operation)
            .with_entity("resource")
            .with_entity_id(id),
    )
}

#[async_trait]
impl ReliefDataRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_open_requests(&self) -> RepositoryResult<Vec<RescueRequest>> {
        self.with_conn(|conn| {
            let open = [
                RequestStatus::Pending.as_str(),
                RequestStatus::InProgress.as_str(),
            ];
            let rows = rescue_requests::table
                .filter(rescue_requests::status.eq_any(open))
                .order(rescue_requests::id.asc())
                .select(RescueRequestRow::as_select())
                .load::<RescueRequestRow>(conn)
                .map_err(map_diesel_error)?;
            rows.into_iter().map(RescueRequestRow::into_domain).collect()
        })
        .await
        .map_err(|e| e.with_operation("list_open_requests"))
    }

    async fn get_request(&self, id: RequestId) -> RepositoryResult<RescueRequest> {
        self.with_conn(move |conn| {
            let row = rescue_requests::table
                .filter(rescue_requests::id.eq(id.value()))
                .select(RescueRequestRow::as_select())
                .first::<RescueRequestRow>(conn)
                .optional()
                .map_err(map_diesel_error)?;
            match row {
                Some(row) => row.into_domain(),
                None => Err(RepositoryError::not_found_with_context(
                    format!("Request {} not found", id),
                    ErrorContext::new("get_request")
                        .with_entity("rescue_request")
                        .with_entity_id(id),
                )),
            }
        })
        .await
    }

    async fn list_warehouses(&self) -> RepositoryResult<Vec<Warehouse>> {
        self.with_conn(|conn| {
            let rows = warehouses::table
                .order(warehouses::id.asc())
                .select(WarehouseRow::as_select())
                .load::<WarehouseRow>(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(Warehouse::from).collect())
        })
        .await
        .map_err(|e| e.with_operation("list_warehouses"))
    }

    async fn list_resources(&self) -> RepositoryResult<Vec<Resource>> {
        self.with_conn(|conn| {
            let rows = resources::table
                .order(resources::id.asc())
                .select(ResourceRow::as_select())
                .load::<ResourceRow>(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(Resource::from).collect())
        })
        .await
        .map_err(|e| e.with_operation("list_resources"))
    }

    async fn get_resource(&self, id: ResourceId) -> RepositoryResult<Resource> {
        self.with_conn(move |conn| {
            resources::table
                .filter(resources::id.eq(id.value()))
                .select(ResourceRow::as_select())
                .first::<ResourceRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(Resource::from)
                .ok_or_else(|| resource_not_found(id, "get_resource"))
        })
        .await
    }
}

#[async_trait]
impl RecommendationRepository for PostgresRepository {
    async fn insert_recommendations(
        &self,
        batch: Vec<NewRecommendation>,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Recommendation>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let rows = batch
                .into_iter()
                .map(|r| NewRecommendationRow::from_domain(r, created_at))
                .collect::<RepositoryResult<Vec<_>>>()?;
            conn.transaction(|tx| {
                let inserted: Vec<RecommendationRow> =
                    diesel::insert_into(recommendations::table)
                        .values(&rows)
                        .returning(RecommendationRow::as_returning())
                        .get_results(tx)
                        .map_err(map_diesel_error)?;
                inserted
                    .into_iter()
                    .map(RecommendationRow::into_domain)
                    .collect()
            })
        })
        .await
    }

    async fn list_recommendations(
        &self,
        status: Option<RecommendationStatus>,
    ) -> RepositoryResult<Vec<Recommendation>> {
        self.with_conn(move |conn| {
            let mut query = recommendations::table
                .select(RecommendationRow::as_select())
                .order((recommendations::created_at.desc(), recommendations::id.desc()))
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(recommendations::status.eq(status.as_str()));
            }
            let rows = query
                .load::<RecommendationRow>(conn)
                .map_err(map_diesel_error)?;
            rows.into_iter().map(RecommendationRow::into_domain).collect()
        })
        .await
    }

    async fn get_recommendation(&self, id: RecommendationId) -> RepositoryResult<Recommendation> {
        self.with_conn(move |conn| {
            recommendations::table
                .filter(recommendations::id.eq(id.value()))
                .select(RecommendationRow::as_select())
                .first::<RecommendationRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| recommendation_not_found(id, "get_recommendation"))?
                .into_domain()
        })
        .await
    }

    async fn pending_request_refs(&self) -> RepositoryResult<HashMap<RequestId, RecommendationId>> {
        self.with_conn(|conn| {
            let rows: Vec<(Option<i64>, i64)> = recommendations::table
                .filter(recommendations::status.eq(RecommendationStatus::Pending.as_str()))
                .filter(recommendations::request_ref.is_not_null())
                .order(recommendations::id.asc())
                .select((recommendations::request_ref, recommendations::id))
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(rows
                .into_iter()
                .filter_map(|(req, id)| req.map(|r| (RequestId(r), RecommendationId(id))))
                .collect())
        })
        .await
    }

    async fn apply_recommendation(
        &self,
        id: RecommendationId,
        applied_at: DateTime<Utc>,
    ) -> RepositoryResult<ApplyOutcome> {
        self.with_conn(move |conn| {
            conn.transaction::<ApplyOutcome, RepositoryError, _>(|tx| {
                let row = recommendations::table
                    .filter(recommendations::id.eq(id.value()))
                    .select(RecommendationRow::as_select())
                    .for_update()
                    .first::<RecommendationRow>(tx)
                    .optional()
                    .map_err(map_diesel_error)?
                    .ok_or_else(|| recommendation_not_found(id, "apply_recommendation"))?;
                let status = row.parsed_status()?;
                if status != RecommendationStatus::Pending {
                    return Ok(ApplyOutcome::NotPending(status));
                }

                let requested = row.suggested_quantity;
                // Guarded decrement: no row is touched unless enough stock remains.
                let remaining: Option<i64> = diesel::update(
                    resources::table
                        .filter(resources::id.eq(row.resource_id))
                        .filter(resources::quantity.ge(requested)),
                )
                .set(resources::quantity.eq(resources::quantity - requested))
                .returning(resources::quantity)
                .get_result(tx)
                .optional()
                .map_err(map_diesel_error)?;

                let remaining_quantity = match remaining {
                    Some(q) => q,
                    None => {
                        let available: i64 = resources::table
                            .filter(resources::id.eq(row.resource_id))
                            .select(resources::quantity)
                            .first(tx)
                            .optional()
                            .map_err(map_diesel_error)?
                            .ok_or_else(|| {
                                resource_not_found(
                                    ResourceId(row.resource_id),
                                    "apply_recommendation",
                                )
                            })?;
                        return Ok(ApplyOutcome::InsufficientStock {
                            available,
                            requested,
                        });
                    }
                };

                let log_row: DistributionLogRow = diesel::insert_into(distribution_logs::table)
                    .values(&NewDistributionLogRow {
                        recommendation_id: row.id,
                        resource_id: row.resource_id,
                        warehouse_id: row.warehouse_id,
                        quantity: requested,
                        destination: row.destination.clone(),
                        request_id: row.request_ref,
                        created_at: applied_at,
                    })
                    .returning(DistributionLogRow::as_returning())
                    .get_result(tx)
                    .map_err(map_diesel_error)?;

                let updated: RecommendationRow = diesel::update(
                    recommendations::table
                        .filter(recommendations::id.eq(row.id))
                        .filter(recommendations::status.eq(RecommendationStatus::Pending.as_str())),
                )
                .set((
                    recommendations::status.eq(RecommendationStatus::Applied.as_str()),
                    recommendations::resolved_at.eq(Some(applied_at)),
                ))
                .returning(RecommendationRow::as_returning())
                .get_result(tx)
                .map_err(map_diesel_error)?;

                Ok(ApplyOutcome::Applied {
                    recommendation: updated.into_domain()?,
                    log_entry: DistributionLogEntry::from(log_row),
                    remaining_quantity,
                })
            })
        })
        .await
    }

    async fn dismiss_recommendation(
        &self,
        id: RecommendationId,
        dismissed_at: DateTime<Utc>,
    ) -> RepositoryResult<DismissOutcome> {
        self.with_conn(move |conn| {
            conn.transaction::<DismissOutcome, RepositoryError, _>(|tx| {
                let updated: Option<RecommendationRow> = diesel::update(
                    recommendations::table
                        .filter(recommendations::id.eq(id.value()))
                        .filter(recommendations::status.eq(RecommendationStatus::Pending.as_str())),
                )
                .set((
                    recommendations::status.eq(RecommendationStatus::Dismissed.as_str()),
                    recommendations::resolved_at.eq(Some(dismissed_at)),
                ))
                .returning(RecommendationRow::as_returning())
                .get_result(tx)
                .optional()
                .map_err(map_diesel_error)?;

                if let Some(row) = updated {
                    return Ok(DismissOutcome::Dismissed(row.into_domain()?));
                }

                let current = recommendations::table
                    .filter(recommendations::id.eq(id.value()))
                    .select(RecommendationRow::as_select())
                    .first::<RecommendationRow>(tx)
                    .optional()
                    .map_err(map_diesel_error)?
                    .ok_or_else(|| recommendation_not_found(id, "dismiss_recommendation"))?;
                Ok(DismissOutcome::NotPending(current.parsed_status()?))
            })
        })
        .await
    }

    async fn record_feedback(&self, feedback: RecommendationFeedback) -> RepositoryResult<()> {
        let row = NewFeedbackRow::from(feedback);
        self.with_conn(move |conn| {
            diesel::insert_into(recommendation_feedback::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_feedback(
        &self,
        id: RecommendationId,
    ) -> RepositoryResult<Vec<RecommendationFeedback>> {
        self.with_conn(move |conn| {
            let rows = recommendation_feedback::table
                .filter(recommendation_feedback::recommendation_id.eq(id.value()))
                .order(recommendation_feedback::id.asc())
                .select(FeedbackRow::as_select())
                .load::<FeedbackRow>(conn)
                .map_err(map_diesel_error)?;
            rows.into_iter().map(FeedbackRow::into_domain).collect()
        })
        .await
    }

    async fn list_distribution_logs(&self) -> RepositoryResult<Vec<DistributionLogEntry>> {
        self.with_conn(|conn| {
            let rows = distribution_logs::table
                .order(distribution_logs::id.desc())
                .select(DistributionLogRow::as_select())
                .load::<DistributionLogRow>(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(DistributionLogEntry::from).collect())
        })
        .await
    }
}
