//! End-to-end engine scenarios over the seed fixture.

mod support;

use chrono::Duration;

use relief_priority::db::repository::{RecommendationRepository, ReliefDataRepository};
use relief_priority::models::{
    RecommendationStatus, RequestId, RequestStatus, ResourceId, SchedulerStatus,
    UNSPECIFIED_RESOURCE_TYPE,
};
use relief_priority::services::orchestrator::PRIORITY_RECALC_JOB;
use relief_priority::services::{CycleOutcome, EngineError, RecommendationApplier};

use std::sync::Arc;

#[tokio::test]
async fn test_full_cycle_over_seed_data() {
    let (repo, _clock, engine) = support::seeded_engine();

    let report = match engine.recalculate().await.unwrap() {
        CycleOutcome::Completed(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(report.priorities, 3);
    assert_eq!(report.recommendations_created, 3);
    assert!(report.generation_error.is_none());

    let snapshot = engine.snapshot().unwrap();
    let order: Vec<RequestId> = snapshot.priorities.iter().map(|p| p.request_ref).collect();
    assert_eq!(order, vec![RequestId(100), RequestId(101), RequestId(102)]);

    let water = snapshot
        .demand_cells
        .iter()
        .find(|c| c.region == "springfield" && c.resource_type == "water")
        .unwrap();
    assert_eq!(water.pending_count, 1);
    assert_eq!(water.inventory_available, 8);
    assert!((water.demand_pressure - 0.125).abs() < 1e-12);

    let kits = snapshot
        .demand_cells
        .iter()
        .find(|c| c.region == "shelbyville" && c.resource_type == "medical kits")
        .unwrap();
    assert_eq!(kits.request_count, 1);
    assert_eq!(kits.demand_pressure, 0.0);
    assert!(snapshot
        .demand_cells
        .iter()
        .all(|c| c.resource_type != UNSPECIFIED_RESOURCE_TYPE));

    let malformed = snapshot
        .priorities
        .iter()
        .find(|p| p.request_ref == RequestId(102))
        .unwrap();
    assert!(malformed.rationale.contains("malformed coordinates"));

    let pending = repo
        .list_recommendations(Some(RecommendationStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);
    let water_rec = pending
        .iter()
        .find(|r| r.request_ref == Some(RequestId(100)))
        .unwrap();
    assert_eq!(water_rec.resource_id, ResourceId(10));
    assert_eq!(water_rec.suggested_quantity, 8);
    assert!((0.0..=1.0).contains(&water_rec.confidence));
}

#[tokio::test]
async fn test_apply_exhausts_stock_and_second_apply_conflicts() {
    let (repo, clock, engine) = support::seeded_engine();
    engine.recalculate().await.unwrap();
    let applier = RecommendationApplier::new(Arc::new(repo.clone()), Arc::new(clock));

    let id = repo.pending_request_refs().await.unwrap()[&RequestId(100)];
    let applied = applier.apply(id, Some("truck 4".to_string())).await.unwrap();
    assert_eq!(applied.remaining_quantity, 0);

    let err = applier.apply(id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyResolved { .. }));
    assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 0);

    let logs = repo.list_distribution_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].quantity, 8);
    assert_eq!(logs[0].destination, "12 Elm St, Springfield");
}

#[tokio::test]
async fn test_stale_suggestion_is_rejected_after_stock_change() {
    let (repo, clock, engine) = support::seeded_engine();
    engine.recalculate().await.unwrap();
    let applier = RecommendationApplier::new(Arc::new(repo.clone()), Arc::new(clock));
    let id = repo.pending_request_refs().await.unwrap()[&RequestId(100)];

    repo.set_resource_quantity(ResourceId(10), 5);

    let err = applier.apply(id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientStock {
            available: 5,
            requested: 8,
            ..
        }
    ));
    assert!(repo.get_recommendation(id).await.unwrap().is_pending());
}

#[tokio::test]
async fn test_priority_recalc_health_ages_with_clock() {
    let (_repo, clock, engine) = support::seeded_engine();
    let interval = engine.config().scheduler.recalc_interval_secs as i64;

    let before = engine.tracker().record(PRIORITY_RECALC_JOB).unwrap();
    assert_eq!(before.status, SchedulerStatus::Never);

    engine.recalculate().await.unwrap();

    clock.advance(Duration::seconds(interval / 2));
    let status = |engine: &relief_priority::services::Orchestrator| {
        engine.tracker().record(PRIORITY_RECALC_JOB).unwrap().status
    };
    assert_eq!(status(&engine), SchedulerStatus::Healthy);

    clock.advance(Duration::seconds(interval));
    assert_eq!(status(&engine), SchedulerStatus::Warning);

    clock.advance(Duration::seconds(interval * 3 / 2));
    assert_eq!(status(&engine), SchedulerStatus::Critical);
}

#[tokio::test]
async fn test_timeline_grows_one_point_per_bucket() {
    let (_repo, clock, engine) = support::seeded_engine();

    engine.recalculate().await.unwrap();
    clock.advance(Duration::minutes(10));
    engine.recalculate().await.unwrap();
    assert_eq!(engine.snapshot().unwrap().timeline.len(), 1);

    clock.advance(Duration::hours(1));
    engine.recalculate().await.unwrap();
    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.timeline.len(), 2);
    assert_eq!(
        snapshot.latest_bucket_start(),
        Some(support::seed_now() + Duration::hours(1))
    );
}

#[tokio::test]
async fn test_fulfilled_request_leaves_the_ranking() {
    let (repo, clock, engine) = support::seeded_engine();
    engine.recalculate().await.unwrap();

    assert!(repo.set_request_status(RequestId(100), RequestStatus::Fulfilled));
    assert!(!repo.set_request_status(RequestId(999), RequestStatus::Fulfilled));
    clock.advance(Duration::minutes(5));
    engine.recalculate().await.unwrap();

    let snapshot = engine.snapshot().unwrap();
    let order: Vec<RequestId> = snapshot.priorities.iter().map(|p| p.request_ref).collect();
    assert_eq!(order, vec![RequestId(101), RequestId(102)]);
    assert!(snapshot
        .demand_cells
        .iter()
        .filter(|c| c.region == "springfield" && c.resource_type == "water")
        .all(|c| c.pending_count == 0 && c.demand_pressure == 0.0));
}
