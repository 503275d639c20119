//! Builders shared by the service test suites.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{
    RequestId, RequestPriority, RequestStatus, RescueRequest, Resource, ResourceId, Warehouse,
    WarehouseId,
};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub(crate) fn request(id: i64, location: &str, minutes_ago: i64) -> RescueRequest {
    let created_at = t0() - Duration::minutes(minutes_ago);
    RescueRequest {
        id: RequestId(id),
        location: location.to_string(),
        latitude: None,
        longitude: None,
        status: RequestStatus::Pending,
        priority: RequestPriority::Medium,
        people_count: 1,
        needs: Vec::new(),
        created_at,
        updated_at: created_at,
    }
}

pub(crate) fn request_at(
    id: i64,
    location: &str,
    minutes_ago: i64,
    lat: f64,
    lon: f64,
) -> RescueRequest {
    RescueRequest {
        latitude: Some(lat),
        longitude: Some(lon),
        ..request(id, location, minutes_ago)
    }
}

pub(crate) fn with_needs(mut request: RescueRequest, needs: &[&str]) -> RescueRequest {
    request.needs = needs.iter().map(|n| n.to_string()).collect();
    request
}

pub(crate) fn warehouse(id: i64, name: &str, location: &str, lat: f64, lon: f64) -> Warehouse {
    Warehouse {
        id: WarehouseId(id),
        name: name.to_string(),
        location: location.to_string(),
        latitude: Some(lat),
        longitude: Some(lon),
        capacity: 0,
        last_audited_at: None,
    }
}

pub(crate) fn resource(id: i64, warehouse_id: i64, resource_type: &str, quantity: i64) -> Resource {
    Resource {
        id: ResourceId(id),
        resource_type: resource_type.to_string(),
        quantity,
        unit: "units".to_string(),
        reorder_level: 0,
        warehouse_id: WarehouseId(warehouse_id),
    }
}
