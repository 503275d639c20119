//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for dashboards served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Ranking
        .route("/priorities", get(handlers::list_priorities))
        .route("/priorities/recalculate", post(handlers::recalculate))
        // Recommendation lifecycle
        .route("/recommendations", get(handlers::list_recommendations))
        .route("/recommendations/{id}", get(handlers::get_recommendation))
        .route("/recommendations/{id}/apply", post(handlers::apply_recommendation))
        .route("/recommendations/{id}/dismiss", post(handlers::dismiss_recommendation))
        .route(
            "/recommendations/{id}/feedback",
            get(handlers::list_feedback).post(handlers::post_feedback),
        )
        .route("/distribution-logs", get(handlers::list_distribution_logs))
        // Demand and job health
        .route("/demand-insights", get(handlers::get_demand_insights))
        .route("/scheduler/health", get(handlers::get_scheduler_health))
        .route("/scheduler/{name}/report", post(handlers::report_job_run));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
