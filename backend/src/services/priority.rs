//! Priority scoring of open rescue requests.
//!
//! Each request gets four factor values, all in `[0, 100]` except age which is
//! expressed in minutes up to a saturation cap:
//!
//! | factor          | value                                             | neutral |
//! |-----------------|---------------------------------------------------|---------|
//! | age             | `min(age_minutes, age_cap_minutes)`               | n/a     |
//! | proximity       | `100 * half / (half + distance_km)`               | 50      |
//! | hub capacity    | `100 * (1 - clamp(stock / capacity, 0, 1))`       | 50      |
//! | supply pressure | `100 * p / (1 + p)` for the matching demand cell  | 50      |
//!
//! `score = round(w_age*age + w_prox*proximity + w_hub*hub + w_supply*supply)`.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::{ScoringSettings, WeightSettings};
use crate::models::{
    ComponentWeights, PrioritySnapshot, RescueRequest, Resource, Warehouse, WarehouseId,
    UNSPECIFIED_RESOURCE_TYPE,
};
use crate::services::demand::{wait_minutes, DemandAggregate};
use crate::services::geo::{GeoPoint, UNKNOWN_REGION};

/// Value used for a factor whose inputs are unavailable.
pub const NEUTRAL_FACTOR: f64 = 50.0;

/// The nearest stocked hub chosen for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestHub {
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub distance_km: f64,
    pub capacity_ratio: Option<f64>,
}

/// Per-warehouse stock view used to locate hubs.
pub(crate) struct HubIndex<'a> {
    hubs: Vec<(&'a Warehouse, GeoPoint)>,
    totals: HashMap<WarehouseId, i64>,
    by_type: HashMap<(WarehouseId, String), i64>,
}

impl<'a> HubIndex<'a> {
    pub(crate) fn new(warehouses: &'a [Warehouse], resources: &[Resource]) -> Self {
        let mut totals: HashMap<WarehouseId, i64> = HashMap::new();
        let mut by_type: HashMap<(WarehouseId, String), i64> = HashMap::new();
        for resource in resources {
            let qty = resource.quantity.max(0);
            *totals.entry(resource.warehouse_id).or_default() += qty;
            *by_type
                .entry((resource.warehouse_id, resource.type_key()))
                .or_default() += qty;
        }
        let hubs = warehouses
            .iter()
            .filter_map(|w| w.coordinates().map(|p| (w, p)))
            .collect();
        Self {
            hubs,
            totals,
            by_type,
        }
    }

    pub(crate) fn total_stock(&self, id: WarehouseId) -> i64 {
        self.totals.get(&id).copied().unwrap_or(0)
    }

    fn stock_for(&self, id: WarehouseId, resource_type: &str) -> i64 {
        if resource_type == UNSPECIFIED_RESOURCE_TYPE {
            self.total_stock(id)
        } else {
            self.by_type
                .get(&(id, resource_type.to_string()))
                .copied()
                .unwrap_or(0)
        }
    }

    /// Nearest geolocated hub, preferring stock of `resource_type`, then any
    /// stock, then any hub at all. Ties: higher stock, then lower id.
    pub(crate) fn nearest(&self, from: GeoPoint, resource_type: &str) -> Option<NearestHub> {
        for pass in 0..3 {
            let stock_of = |id: WarehouseId| match pass {
                0 => self.stock_for(id, resource_type),
                1 => self.total_stock(id),
                _ => 1,
            };
            let best = self
                .hubs
                .iter()
                .filter(|(w, _)| stock_of(w.id) > 0)
                .map(|(w, p)| (*w, from.distance_km(p), stock_of(w.id)))
                .min_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap_or(Ordering::Equal)
                        .then(b.2.cmp(&a.2))
                        .then(a.0.id.cmp(&b.0.id))
                });
            if let Some((warehouse, distance_km, _)) = best {
                return Some(NearestHub {
                    warehouse_id: warehouse.id,
                    name: warehouse.name.clone(),
                    distance_km,
                    capacity_ratio: warehouse.capacity_ratio(self.total_stock(warehouse.id)),
                });
            }
        }
        None
    }
}

/// PriorityScorer.
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    weights: WeightSettings,
    age_cap_minutes: f64,
    proximity_half_km: f64,
}

impl PriorityScorer {
    pub fn new(weights: &WeightSettings, scoring: &ScoringSettings) -> Self {
        Self {
            weights: *weights,
            age_cap_minutes: scoring.age_cap_minutes,
            proximity_half_km: scoring.proximity_half_km,
        }
    }

    pub fn age_factor(&self, age_minutes: f64) -> f64 {
        age_minutes.max(0.0).min(self.age_cap_minutes)
    }

    pub fn proximity_factor(&self, distance_km: Option<f64>) -> f64 {
        match distance_km {
            Some(d) if d.is_finite() => {
                100.0 * self.proximity_half_km / (self.proximity_half_km + d.max(0.0))
            }
            _ => NEUTRAL_FACTOR,
        }
    }

    pub fn hub_capacity_factor(capacity_ratio: Option<f64>) -> f64 {
        match capacity_ratio {
            Some(r) if r.is_finite() => 100.0 * (1.0 - r.clamp(0.0, 1.0)),
            _ => NEUTRAL_FACTOR,
        }
    }

    pub fn supply_pressure_factor(pressure: Option<f64>) -> f64 {
        match pressure {
            Some(p) if p.is_finite() => {
                let p = p.max(0.0);
                100.0 * p / (1.0 + p)
            }
            _ => NEUTRAL_FACTOR,
        }
    }

    fn weighted(&self, factors: &ComponentWeights) -> [(&'static str, f64); 4] {
        [
            ("request age", self.weights.age * factors.age_weight),
            ("proximity to stock", self.weights.proximity * factors.proximity_weight),
            (
                "hub capacity strain",
                self.weights.hub_capacity * factors.hub_capacity_weight,
            ),
            (
                "regional supply pressure",
                self.weights.supply_pressure * factors.supply_pressure_weight,
            ),
        ]
    }

    pub fn score(&self, factors: &ComponentWeights) -> i64 {
        let total: f64 = self.weighted(factors).iter().map(|(_, v)| v).sum();
        total.round() as i64
    }

    /// Score one request. Malformed geodata never fails; the affected
    /// factors fall back to neutral values and the rationale says so.
    pub(crate) fn score_request(
        &self,
        request: &RescueRequest,
        hubs: &HubIndex<'_>,
        demand: &DemandAggregate,
        now: DateTime<Utc>,
    ) -> PrioritySnapshot {
        let region = request.region();
        let resource_type = demand.resource_type_of(request.id).to_string();
        let age_minutes = wait_minutes(request, now);

        let hub = request
            .coordinates()
            .and_then(|from| hubs.nearest(from, &resource_type));
        // Region-less requests share one pooled cell; it says nothing about this request.
        let cell = if region == UNKNOWN_REGION {
            None
        } else {
            demand.cell(&region, &resource_type)
        };

        let factors = ComponentWeights {
            age_weight: self.age_factor(age_minutes),
            proximity_weight: self.proximity_factor(hub.as_ref().map(|h| h.distance_km)),
            hub_capacity_weight: Self::hub_capacity_factor(
                hub.as_ref().and_then(|h| h.capacity_ratio),
            ),
            supply_pressure_weight: Self::supply_pressure_factor(
                cell.map(|c| c.demand_pressure),
            ),
        };
        let score = self.score(&factors);

        let dominant = self
            .weighted(&factors)
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(name, _)| name)
            .unwrap_or("request age");

        let mut rationale = format!(
            "Score {} driven by {}: waiting {:.0} min",
            score, dominant, age_minutes
        );
        match &hub {
            Some(h) => rationale.push_str(&format!(
                ", nearest stocked hub {} at {:.1} km",
                h.name, h.distance_km
            )),
            None => rationale.push_str(", no geolocated hub in reach"),
        }
        if let Some(c) = cell {
            rationale.push_str(&format!(
                ", {} demand pressure {:.2} in {}",
                resource_type, c.demand_pressure, region
            ));
        }
        if request.has_malformed_coordinates() {
            rationale.push_str(" [malformed coordinates, neutral proximity used]");
        }
        if region == UNKNOWN_REGION {
            rationale.push_str(" [no region in location, neutral supply pressure used]");
        }
        rationale.push('.');

        PrioritySnapshot {
            snapshot_id: Uuid::new_v4(),
            request_ref: request.id,
            location: request.location.clone(),
            region,
            resource_type,
            status: request.status,
            priority: request.priority,
            people_count: request.people_count,
            created_at: request.created_at,
            score,
            rationale,
            weights: factors,
            nearest_warehouse_id: hub.as_ref().map(|h| h.warehouse_id),
            nearest_warehouse_name: hub.as_ref().map(|h| h.name.clone()),
            nearest_warehouse_distance_km: hub.as_ref().map(|h| h.distance_km),
            hub_capacity_ratio: hub.as_ref().and_then(|h| h.capacity_ratio),
            recommendation_ref: None,
        }
    }

    /// Score every open request and return them ranked.
    pub fn score_all(
        &self,
        requests: &[RescueRequest],
        warehouses: &[Warehouse],
        resources: &[Resource],
        demand: &DemandAggregate,
        now: DateTime<Utc>,
    ) -> Vec<PrioritySnapshot> {
        let hubs = HubIndex::new(warehouses, resources);
        let mut snapshots: Vec<PrioritySnapshot> = requests
            .iter()
            .filter(|r| r.status.is_open())
            .map(|r| self.score_request(r, &hubs, demand, now))
            .collect();
        sort_ranked(&mut snapshots);
        snapshots
    }
}

/// Score descending, then oldest first, then lowest request id.
pub fn sort_ranked(snapshots: &mut [PrioritySnapshot]) {
    snapshots.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.request_ref.cmp(&b.request_ref))
    });
}
