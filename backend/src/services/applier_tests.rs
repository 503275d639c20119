use std::sync::Arc;

use crate::db::repositories::LocalRepository;
use crate::db::repository::{FullRepository, RecommendationRepository, ReliefDataRepository};
use crate::models::{
    FeedbackAction, NewRecommendation, RecommendationContext, RecommendationId,
    RecommendationStatus, RequestId, ResourceId, WarehouseId,
};
use crate::services::applier::RecommendationApplier;
use crate::services::clock::ManualClock;
use crate::services::error::EngineError;
use crate::services::test_fixtures::{resource, t0, warehouse};

fn suggestion(quantity: i64) -> NewRecommendation {
    NewRecommendation {
        request_ref: Some(RequestId(1)),
        resource_id: ResourceId(10),
        resource_type: "water".to_string(),
        suggested_quantity: quantity,
        warehouse_id: WarehouseId(1),
        warehouse_name: "North".to_string(),
        destination: "Elm St, Springfield".to_string(),
        rationale: "Dispatch water".to_string(),
        confidence: 0.8,
        lead_time_minutes: Some(15),
        context: RecommendationContext::default(),
    }
}

async fn setup(
    stock: i64,
    suggested: i64,
) -> (LocalRepository, RecommendationApplier, RecommendationId) {
    let repo = LocalRepository::new();
    repo.upsert_warehouse(warehouse(1, "North", "Depot Rd, Springfield", 40.0, -75.0));
    repo.upsert_resource(resource(10, 1, "water", stock));
    let inserted = repo
        .insert_recommendations(vec![suggestion(suggested)], t0())
        .await
        .unwrap();
    let shared: Arc<dyn FullRepository> = Arc::new(repo.clone());
    let applier = RecommendationApplier::new(shared, Arc::new(ManualClock::new(t0())));
    (repo, applier, inserted[0].id)
}

#[tokio::test]
async fn test_apply_consumes_exact_stock_once() {
    let (repo, applier, id) = setup(8, 8).await;

    let applied = applier.apply(id, None).await.unwrap();
    assert_eq!(applied.remaining_quantity, 0);
    assert_eq!(applied.recommendation.status, RecommendationStatus::Applied);
    assert_eq!(applied.recommendation.resolved_at, Some(t0()));
    assert_eq!(applied.log_entry.quantity, 8);
    assert_eq!(applied.log_entry.request_id, Some(RequestId(1)));
    assert_eq!(applied.log_entry.destination, "Elm St, Springfield");

    let second = applier.apply(id, None).await.unwrap_err();
    assert!(second.is_conflict());
    assert!(matches!(
        second,
        EngineError::AlreadyResolved {
            status: RecommendationStatus::Applied,
            ..
        }
    ));
    assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 0);
    assert_eq!(repo.list_distribution_logs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_recommendation_pending() {
    let (repo, applier, id) = setup(8, 8).await;
    repo.set_resource_quantity(ResourceId(10), 3);

    let err = applier.apply(id, None).await.unwrap_err();
    match err {
        EngineError::InsufficientStock {
            resource_id,
            available,
            requested,
        } => {
            assert_eq!(resource_id, ResourceId(10));
            assert_eq!(available, 3);
            assert_eq!(requested, 8);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let recommendation = repo.get_recommendation(id).await.unwrap();
    assert!(recommendation.is_pending());
    assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 3);
    assert!(repo.list_distribution_logs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dismiss_has_no_inventory_effect() {
    let (repo, applier, id) = setup(8, 5).await;

    let dismissed = applier
        .dismiss(id, Some("road closed".to_string()))
        .await
        .unwrap();
    assert_eq!(dismissed.status, RecommendationStatus::Dismissed);
    assert_eq!(repo.get_resource(ResourceId(10)).await.unwrap().quantity, 8);

    let err = applier.apply(id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::AlreadyResolved {
            status: RecommendationStatus::Dismissed,
            ..
        }
    ));
    assert!(applier.dismiss(id, None).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_feedback_recorded_for_transitions() {
    let (_repo, applier, id) = setup(8, 5).await;

    applier
        .dismiss(id, Some("duplicate request".to_string()))
        .await
        .unwrap();

    let feedback = applier.feedback_for(id).await.unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].action, FeedbackAction::Dismissed);
    assert_eq!(feedback[0].reason.as_deref(), Some("duplicate request"));
}

#[tokio::test]
async fn test_blank_reason_is_dropped() {
    let (_repo, applier, id) = setup(8, 5).await;

    applier.apply(id, Some("   ".to_string())).await.unwrap();

    let feedback = applier.feedback_for(id).await.unwrap();
    assert_eq!(feedback[0].action, FeedbackAction::Applied);
    assert_eq!(feedback[0].reason, None);
}

#[tokio::test]
async fn test_unknown_recommendation_is_not_found() {
    let (_repo, applier, _id) = setup(8, 5).await;

    let missing = RecommendationId(999);
    assert!(matches!(
        applier.apply(missing, None).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        applier.feedback_for(missing).await,
        Err(EngineError::NotFound(_))
    ));
}
