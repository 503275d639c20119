use proptest::prelude::*;

use crate::config::{DemandSettings, ScoringSettings, WeightSettings};
use crate::models::{RequestId, RequestStatus, RescueRequest, Resource, Warehouse, WarehouseId};
use crate::services::demand::DemandSignalAggregator;
use crate::services::priority::{PriorityScorer, NEUTRAL_FACTOR};
use crate::services::test_fixtures::{request, request_at, resource, t0, warehouse, with_needs};

fn scorer() -> PriorityScorer {
    PriorityScorer::new(&WeightSettings::default(), &ScoringSettings::default())
}

fn rank(
    scorer: &PriorityScorer,
    requests: &[RescueRequest],
    warehouses: &[Warehouse],
    resources: &[Resource],
) -> Vec<crate::models::PrioritySnapshot> {
    let demand = DemandSignalAggregator::new(&DemandSettings::default()).aggregate(
        requests, warehouses, resources, t0(),
    );
    scorer.score_all(requests, warehouses, resources, &demand, t0())
}

fn depot() -> (Vec<Warehouse>, Vec<Resource>) {
    let mut north = warehouse(1, "North", "Depot Rd, Springfield", 40.0, -75.0);
    north.capacity = 200;
    (vec![north], vec![resource(10, 1, "water", 50)])
}

#[test]
fn test_factor_curves() {
    let scorer = scorer();
    assert_eq!(scorer.age_factor(-5.0), 0.0);
    assert_eq!(scorer.age_factor(10_000.0), 720.0);
    assert_eq!(scorer.proximity_factor(Some(0.0)), 100.0);
    assert_eq!(scorer.proximity_factor(Some(10.0)), 50.0);
    assert_eq!(scorer.proximity_factor(None), NEUTRAL_FACTOR);
    assert_eq!(PriorityScorer::hub_capacity_factor(Some(0.25)), 75.0);
    assert_eq!(PriorityScorer::hub_capacity_factor(Some(3.0)), 0.0);
    assert_eq!(PriorityScorer::hub_capacity_factor(None), NEUTRAL_FACTOR);
    assert_eq!(PriorityScorer::supply_pressure_factor(Some(1.0)), 50.0);
    assert_eq!(PriorityScorer::supply_pressure_factor(Some(0.0)), 0.0);
    assert_eq!(PriorityScorer::supply_pressure_factor(Some(f64::NAN)), NEUTRAL_FACTOR);
}

#[test]
fn test_snapshot_carries_nearest_hub() {
    let (warehouses, resources) = depot();
    let requests = vec![with_needs(
        request_at(1, "Elm St, Springfield", 30, 40.0, -75.0),
        &["water"],
    )];

    let ranked = rank(&scorer(), &requests, &warehouses, &resources);

    assert_eq!(ranked.len(), 1);
    let snapshot = &ranked[0];
    assert_eq!(snapshot.nearest_warehouse_id, Some(WarehouseId(1)));
    assert_eq!(snapshot.nearest_warehouse_name.as_deref(), Some("North"));
    assert_eq!(snapshot.nearest_warehouse_distance_km, Some(0.0));
    assert_eq!(snapshot.hub_capacity_ratio, Some(0.25));
    assert_eq!(snapshot.resource_type, "water");
    assert_eq!(snapshot.weights.proximity_weight, 100.0);
    assert_eq!(snapshot.weights.hub_capacity_weight, 75.0);
    assert!(snapshot.rationale.contains("North"));
}

#[test]
fn test_malformed_coordinates_use_neutral_terms() {
    let (warehouses, resources) = depot();
    let mut broken = request(1, "Elm St, Springfield", 30);
    broken.latitude = Some(200.0);
    broken.longitude = Some(-75.0);
    let requests = vec![broken, request_at(2, "Oak St, Springfield", 30, 40.0, -75.0)];

    let ranked = rank(&scorer(), &requests, &warehouses, &resources);

    assert_eq!(ranked.len(), 2);
    let snapshot = ranked
        .iter()
        .find(|s| s.request_ref == RequestId(1))
        .unwrap();
    assert_eq!(snapshot.weights.proximity_weight, NEUTRAL_FACTOR);
    assert_eq!(snapshot.weights.hub_capacity_weight, NEUTRAL_FACTOR);
    assert_eq!(snapshot.nearest_warehouse_id, None);
    assert!(snapshot.rationale.contains("malformed coordinates"));
}

#[test]
fn test_unknown_region_is_flagged() {
    let requests = vec![request(1, "", 5), request(2, "  ,  ", 5), request(3, "", 5)];

    let ranked = rank(&scorer(), &requests, &[], &[]);

    assert_eq!(ranked.len(), 3);
    for snapshot in &ranked {
        assert_eq!(snapshot.region, "unknown");
        assert!(snapshot.rationale.contains("no region in location"));
        // The pooled "unknown" cell must not leak into the score.
        assert_eq!(snapshot.weights.supply_pressure_weight, NEUTRAL_FACTOR);
        assert!(!snapshot.rationale.contains("demand pressure"));
    }
}

#[test]
fn test_no_geolocated_warehouse_is_neutral() {
    let mut hub = warehouse(1, "North", "Depot Rd, Springfield", 0.0, 0.0);
    hub.latitude = None;
    hub.longitude = None;
    let requests = vec![request_at(1, "Elm St, Springfield", 5, 40.0, -75.0)];

    let ranked = rank(&scorer(), &requests, &[hub], &[resource(10, 1, "water", 5)]);

    assert_eq!(ranked[0].nearest_warehouse_distance_km, None);
    assert_eq!(ranked[0].weights.proximity_weight, NEUTRAL_FACTOR);
}

#[test]
fn test_nearest_hub_prefers_matching_stock() {
    let warehouses = vec![
        warehouse(1, "Near", "A Rd, Springfield", 40.0, -75.0),
        warehouse(2, "Far", "B Rd, Springfield", 40.5, -75.0),
    ];
    let resources = vec![resource(10, 1, "blankets", 30), resource(11, 2, "water", 30)];
    let requests = vec![with_needs(
        request_at(1, "Elm St, Springfield", 5, 40.0, -75.0),
        &["water"],
    )];

    let ranked = rank(&scorer(), &requests, &warehouses, &resources);

    assert_eq!(ranked[0].nearest_warehouse_id, Some(WarehouseId(2)));
}

#[test]
fn test_only_open_requests_are_ranked() {
    let mut closed = request(2, "Elm St, Springfield", 90);
    closed.status = RequestStatus::Fulfilled;
    let requests = vec![request(1, "Elm St, Springfield", 5), closed];

    let ranked = rank(&scorer(), &requests, &[], &[]);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].request_ref, RequestId(1));
}

#[test]
fn test_ties_break_by_age_then_id() {
    let weights = WeightSettings {
        age: 0.0,
        ..WeightSettings::default()
    };
    let scorer = PriorityScorer::new(&weights, &ScoringSettings::default());
    let requests = vec![
        request(3, "Elm St, Springfield", 10),
        request(2, "Elm St, Springfield", 10),
        request(1, "Elm St, Springfield", 5),
    ];

    let ranked = rank(&scorer, &requests, &[], &[]);

    let order: Vec<i64> = ranked.iter().map(|s| s.request_ref.value()).collect();
    assert_eq!(order, vec![2, 3, 1]);
    assert!(ranked.windows(2).all(|w| w[0].score == w[1].score));
}

#[test]
fn test_ranking_is_descending() {
    let (warehouses, resources) = depot();
    let requests = vec![
        request_at(1, "Elm St, Springfield", 5, 40.0, -75.0),
        request_at(2, "Oak St, Springfield", 400, 40.0, -75.0),
        request_at(3, "Pine St, Springfield", 60, 41.0, -75.0),
    ];

    let ranked = rank(&scorer(), &requests, &warehouses, &resources);

    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(ranked[0].request_ref, RequestId(2));
}

proptest! {
    #[test]
    fn prop_score_strictly_increases_with_age(younger in 0i64..700, gap in 1i64..20) {
        let older = (younger + gap).min(719);
        prop_assume!(older > younger);
        let (warehouses, resources) = depot();
        let requests = vec![
            request_at(1, "Elm St, Springfield", younger, 40.1, -75.0),
            request_at(2, "Elm St, Springfield", older, 40.1, -75.0),
        ];

        let ranked = rank(&scorer(), &requests, &warehouses, &resources);

        let score_of = |id: i64| {
            ranked
                .iter()
                .find(|s| s.request_ref == RequestId(id))
                .map(|s| s.score)
        };
        prop_assert!(score_of(2) > score_of(1));
    }

    #[test]
    fn prop_factors_stay_in_range(
        distance in 0.0f64..20_000.0,
        ratio in 0.0f64..10.0,
        pressure in 0.0f64..1e6,
    ) {
        let scorer = scorer();
        let proximity = scorer.proximity_factor(Some(distance));
        let hub = PriorityScorer::hub_capacity_factor(Some(ratio));
        let supply = PriorityScorer::supply_pressure_factor(Some(pressure));
        for factor in [proximity, hub, supply] {
            prop_assert!((0.0..=100.0).contains(&factor));
        }
    }
}
