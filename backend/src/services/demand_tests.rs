use chrono::Duration;
use proptest::prelude::*;

use crate::config::DemandSettings;
use crate::models::{DemandTimelinePoint, RequestStatus, UNSPECIFIED_RESOURCE_TYPE};
use crate::services::demand::{demand_pressure, median, DemandSignalAggregator, DemandTimeline};
use crate::services::test_fixtures::{request, resource, t0, warehouse, with_needs};

fn aggregator() -> DemandSignalAggregator {
    DemandSignalAggregator::new(&DemandSettings::default())
}

fn water_requests(count: i64) -> Vec<crate::models::RescueRequest> {
    (1..=count)
        .map(|id| with_needs(request(id, "Elm St, Springfield", 0), &["water"]))
        .collect()
}

#[test]
fn test_pressure_with_empty_inventory_equals_pending_count() {
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];
    let resources = vec![resource(10, 1, "water", 0)];

    let aggregate = aggregator().aggregate(&water_requests(5), &warehouses, &resources, t0());

    let cell = aggregate.cell("springfield", "water").unwrap();
    assert_eq!(cell.pending_count, 5);
    assert_eq!(cell.inventory_available, 0);
    assert_eq!(cell.demand_pressure, 5.0);
}

#[test]
fn test_pressure_with_stock_is_ratio() {
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];
    let resources = vec![resource(10, 1, "water", 10)];

    let aggregate = aggregator().aggregate(&water_requests(5), &warehouses, &resources, t0());

    let cell = aggregate.cell("springfield", "water").unwrap();
    assert_eq!(cell.inventory_available, 10);
    assert!((cell.demand_pressure - 0.5).abs() < 1e-12);
}

#[test]
fn test_in_progress_requests_do_not_create_pressure() {
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];
    let resources = vec![resource(10, 1, "water", 0)];
    let mut requests = water_requests(3);
    for r in &mut requests {
        r.status = RequestStatus::InProgress;
    }

    let aggregate = aggregator().aggregate(&requests, &warehouses, &resources, t0());

    let cell = aggregate.cell("springfield", "water").unwrap();
    assert_eq!(cell.request_count, 3);
    assert_eq!(cell.pending_count, 0);
    assert_eq!(cell.demand_pressure, 0.0);
}

#[test]
fn test_no_open_requests_yields_empty_cells_and_zero_point() {
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];
    let resources = vec![resource(10, 1, "water", 40)];

    let aggregate = aggregator().aggregate(&[], &warehouses, &resources, t0());

    assert!(aggregate.cells.is_empty());
    assert_eq!(aggregate.point.avg_demand_pressure, 0.0);
    assert_eq!(aggregate.point.median_wait_mins, None);
}

#[test]
fn test_closed_requests_are_ignored() {
    let mut requests = water_requests(2);
    requests[0].status = RequestStatus::Fulfilled;
    requests[1].status = RequestStatus::Cancelled;

    let aggregate = aggregator().aggregate(&requests, &[], &[], t0());

    assert!(aggregate.cells.is_empty());
}

#[test]
fn test_unresolved_needs_count_against_region_total() {
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];
    let resources = vec![resource(10, 1, "water", 6), resource(11, 1, "blankets", 4)];
    let requests = vec![with_needs(request(1, "Elm St, Springfield", 0), &["help"])];

    let aggregate = aggregator().aggregate(&requests, &warehouses, &resources, t0());

    let cell = aggregate
        .cell("springfield", UNSPECIFIED_RESOURCE_TYPE)
        .unwrap();
    assert_eq!(cell.inventory_available, 10);
    assert!((cell.demand_pressure - 0.1).abs() < 1e-12);
}

#[test]
fn test_stocked_types_reported_only_for_regions_with_demand() {
    let warehouses = vec![
        warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0),
        warehouse(2, "South", "Dock St, Shelbyville", 2.0, 2.0),
    ];
    let resources = vec![
        resource(10, 1, "water", 6),
        resource(11, 1, "blankets", 4),
        resource(12, 2, "water", 50),
    ];

    let aggregate = aggregator().aggregate(&water_requests(1), &warehouses, &resources, t0());

    let blankets = aggregate.cell("springfield", "blankets").unwrap();
    assert_eq!(blankets.request_count, 0);
    assert_eq!(blankets.demand_pressure, 0.0);
    assert_eq!(blankets.median_wait_mins, None);
    assert!(aggregate.cells.iter().all(|c| c.region == "springfield"));
}

#[test]
fn test_median_wait_per_cell_and_system_wide() {
    let requests = vec![
        with_needs(request(1, "A St, Springfield", 10), &["water"]),
        with_needs(request(2, "B St, Springfield", 30), &["water"]),
        with_needs(request(3, "C St, Shelbyville", 50), &["water"]),
    ];
    let resources = vec![resource(10, 1, "water", 5)];
    let warehouses = vec![warehouse(1, "North", "Depot Rd, Springfield", 1.0, 1.0)];

    let aggregate = aggregator().aggregate(&requests, &warehouses, &resources, t0());

    let cell = aggregate.cell("springfield", "water").unwrap();
    assert_eq!(cell.median_wait_mins, Some(20.0));
    assert_eq!(aggregate.point.median_wait_mins, Some(30.0));
}

#[test]
fn test_bucket_start_is_aligned() {
    let aggregator = aggregator();
    let now = t0() + Duration::minutes(37) + Duration::seconds(12);
    assert_eq!(aggregator.bucket_start(now), t0());
}

#[test]
fn test_median_even_and_odd() {
    assert_eq!(median(&mut []), None);
    assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
}

fn point(hours: i64, pressure: f64) -> DemandTimelinePoint {
    DemandTimelinePoint {
        bucket_start: t0() + Duration::hours(hours),
        avg_demand_pressure: pressure,
        median_wait_mins: None,
    }
}

#[test]
fn test_timeline_overwrites_same_bucket() {
    let mut timeline = DemandTimeline::new(4);
    timeline.push(point(0, 1.0));
    timeline.push(point(0, 2.0));

    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.latest(4)[0].avg_demand_pressure, 2.0);
}

#[test]
fn test_timeline_evicts_oldest() {
    let mut timeline = DemandTimeline::new(3);
    for hour in 0..5 {
        timeline.push(point(hour, hour as f64));
    }

    let points = timeline.latest(10);
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].bucket_start, t0() + Duration::hours(2));
    assert_eq!(timeline.latest_bucket_start(), Some(t0() + Duration::hours(4)));
    assert_eq!(timeline.latest(2)[0].avg_demand_pressure, 3.0);
}

proptest! {
    #[test]
    fn prop_pressure_non_negative(pending in 0usize..1000, inventory in -1000i64..1000) {
        let pressure = demand_pressure(pending, inventory);
        prop_assert!(pressure >= 0.0);
        if pending == 0 {
            prop_assert_eq!(pressure, 0.0);
        }
    }
}
