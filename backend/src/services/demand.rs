//! Demand signal aggregation.
//!
//! Buckets open requests and warehouse inventory by (region, resource type)
//! into [`DemandCell`]s, and summarizes each cycle as one
//! [`DemandTimelinePoint`] kept in a bounded [`DemandTimeline`].

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::config::DemandSettings;
use crate::models::{
    DemandCell, DemandTimelinePoint, RequestId, RequestStatus, RescueRequest, Resource, Warehouse,
    WarehouseId, UNSPECIFIED_RESOURCE_TYPE,
};
use crate::services::geo;

/// Median of a set of values; `None` when empty.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Minutes a request has been waiting; never negative.
pub(crate) fn wait_minutes(request: &RescueRequest, now: DateTime<Utc>) -> f64 {
    let elapsed_ms = (now - request.created_at).num_milliseconds().max(0);
    elapsed_ms as f64 / 60_000.0
}

/// `pending / max(1, inventory)`; zero whenever nothing is pending.
pub fn demand_pressure(pending_count: usize, inventory_available: i64) -> f64 {
    pending_count as f64 / inventory_available.max(1) as f64
}

/// Resource type each request is counted against.
///
/// Needs are matched against the types present in inventory; a request with
/// no resolvable need falls into the "unspecified" bucket of its region.
pub fn classify_requests(
    requests: &[RescueRequest],
    resources: &[Resource],
) -> HashMap<RequestId, String> {
    let known: BTreeSet<String> = resources.iter().map(Resource::type_key).collect();
    requests
        .iter()
        .map(|r| {
            let resource_type = geo::infer_resource_type(&r.needs, &known)
                .unwrap_or_else(|| UNSPECIFIED_RESOURCE_TYPE.to_string());
            (r.id, resource_type)
        })
        .collect()
}

/// Output of one aggregation pass.
#[derive(Debug, Clone)]
pub struct DemandAggregate {
    pub cells: Vec<DemandCell>,
    pub point: DemandTimelinePoint,
    /// Resolved resource type per open request.
    pub request_types: HashMap<RequestId, String>,
}

impl DemandAggregate {
    pub fn cell(&self, region: &str, resource_type: &str) -> Option<&DemandCell> {
        self.cells
            .iter()
            .find(|c| c.region == region && c.resource_type == resource_type)
    }

    pub fn resource_type_of(&self, id: RequestId) -> &str {
        self.request_types
            .get(&id)
            .map(String::as_str)
            .unwrap_or(UNSPECIFIED_RESOURCE_TYPE)
    }
}

#[derive(Default)]
struct CellAccumulator {
    request_count: usize,
    pending_count: usize,
    waits: Vec<f64>,
}

/// DemandSignalAggregator.
#[derive(Debug, Clone)]
pub struct DemandSignalAggregator {
    bucket_minutes: i64,
}

impl DemandSignalAggregator {
    pub fn new(settings: &DemandSettings) -> Self {
        Self {
            bucket_minutes: settings.bucket_minutes.max(1),
        }
    }

    /// Start of the timeline bucket containing `now`.
    pub fn bucket_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.bucket_minutes * 60;
        let secs = now.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(width), 0).unwrap_or(now)
    }

    /// Build a complete replacement set of cells plus this cycle's trend point.
    pub fn aggregate(
        &self,
        requests: &[RescueRequest],
        warehouses: &[Warehouse],
        resources: &[Resource],
        now: DateTime<Utc>,
    ) -> DemandAggregate {
        let open: Vec<&RescueRequest> = requests.iter().filter(|r| r.status.is_open()).collect();
        let request_types = classify_requests(requests, resources);

        // Inventory per region and type.
        let warehouse_regions: HashMap<WarehouseId, String> =
            warehouses.iter().map(|w| (w.id, w.region())).collect();
        let mut inventory: BTreeMap<(String, String), i64> = BTreeMap::new();
        let mut region_totals: HashMap<String, i64> = HashMap::new();
        for resource in resources {
            let Some(region) = warehouse_regions.get(&resource.warehouse_id) else {
                log::debug!(
                    "Resource {} references unknown warehouse {}",
                    resource.id,
                    resource.warehouse_id
                );
                continue;
            };
            let quantity = resource.quantity.max(0);
            *inventory
                .entry((region.clone(), resource.type_key()))
                .or_default() += quantity;
            *region_totals.entry(region.clone()).or_default() += quantity;
        }

        let mut accumulators: BTreeMap<(String, String), CellAccumulator> = BTreeMap::new();
        for request in &open {
            let resource_type = request_types
                .get(&request.id)
                .cloned()
                .unwrap_or_else(|| UNSPECIFIED_RESOURCE_TYPE.to_string());
            let acc = accumulators
                .entry((request.region(), resource_type))
                .or_default();
            acc.request_count += 1;
            if request.status == RequestStatus::Pending {
                acc.pending_count += 1;
            }
            acc.waits.push(wait_minutes(request, now));
        }

        // Regions with demand also report their stocked types with zero requests.
        let demand_regions: BTreeSet<String> =
            accumulators.keys().map(|(region, _)| region.clone()).collect();
        for (region, resource_type) in inventory.keys() {
            if demand_regions.contains(region) {
                accumulators
                    .entry((region.clone(), resource_type.clone()))
                    .or_default();
            }
        }

        let cells: Vec<DemandCell> = accumulators
            .into_iter()
            .map(|((region, resource_type), mut acc)| {
                let inventory_available = if resource_type == UNSPECIFIED_RESOURCE_TYPE {
                    region_totals.get(&region).copied().unwrap_or(0)
                } else {
                    inventory
                        .get(&(region.clone(), resource_type.clone()))
                        .copied()
                        .unwrap_or(0)
                };
                DemandCell {
                    demand_pressure: demand_pressure(acc.pending_count, inventory_available),
                    median_wait_mins: median(&mut acc.waits),
                    region,
                    resource_type,
                    request_count: acc.request_count,
                    pending_count: acc.pending_count,
                    inventory_available,
                }
            })
            .collect();

        let avg_demand_pressure = if cells.is_empty() {
            0.0
        } else {
            cells.iter().map(|c| c.demand_pressure).sum::<f64>() / cells.len() as f64
        };
        let mut all_waits: Vec<f64> = open.iter().map(|r| wait_minutes(r, now)).collect();

        DemandAggregate {
            point: DemandTimelinePoint {
                bucket_start: self.bucket_start(now),
                avg_demand_pressure,
                median_wait_mins: median(&mut all_waits),
            },
            cells,
            request_types,
        }
    }
}

/// Bounded ring of timeline points, oldest evicted first.
#[derive(Debug, Clone)]
pub struct DemandTimeline {
    capacity: usize,
    points: VecDeque<DemandTimelinePoint>,
}

impl DemandTimeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            points: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point; a point for the current newest bucket replaces it.
    pub fn push(&mut self, point: DemandTimelinePoint) {
        if let Some(last) = self.points.back_mut() {
            if last.bucket_start == point.bucket_start {
                *last = point;
                return;
            }
        }
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// The newest `count` points in chronological order.
    pub fn latest(&self, count: usize) -> Vec<DemandTimelinePoint> {
        let skip = self.points.len().saturating_sub(count);
        self.points.iter().skip(skip).cloned().collect()
    }

    pub fn latest_bucket_start(&self) -> Option<DateTime<Utc>> {
        self.points.back().map(|p| p.bucket_start)
    }
}
