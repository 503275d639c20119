//! Dispatch recommendation generation for the top-ranked requests.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::RecommendationSettings;
use crate::models::{
    NewRecommendation, PrioritySnapshot, RecommendationContext, RecommendationId, RequestId,
    Resource, ResourceId, Warehouse, WarehouseId, UNSPECIFIED_RESOURCE_TYPE,
};
use crate::services::demand::DemandAggregate;
use crate::services::geo::GeoPoint;

/// Share of confidence driven by distance; the rest comes from stock headroom.
const DISTANCE_CONFIDENCE_SHARE: f64 = 0.6;

/// A resource line chosen to serve a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSelection {
    pub resource_id: ResourceId,
    pub resource_type: String,
    pub warehouse_id: WarehouseId,
    pub distance_km: Option<f64>,
    pub available: i64,
}

/// Deterministic source choice: nearest first (unknown distance last), then
/// highest available stock, then lowest warehouse id, then lowest resource id.
fn compare_candidates(a: &SourceSelection, b: &SourceSelection) -> Ordering {
    let by_distance = match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_distance
        .then(b.available.cmp(&a.available))
        .then(a.warehouse_id.cmp(&b.warehouse_id))
        .then(a.resource_id.cmp(&b.resource_id))
}

/// RecommendationGenerator.
#[derive(Debug, Clone)]
pub struct RecommendationGenerator {
    top_k: usize,
    travel_speed_kmh: f64,
    confidence_distance_km: f64,
}

impl RecommendationGenerator {
    pub fn new(settings: &RecommendationSettings) -> Self {
        Self {
            top_k: settings.top_k,
            travel_speed_kmh: settings.travel_speed_kmh,
            confidence_distance_km: settings.confidence_distance_km,
        }
    }

    /// Minutes to cover `distance_km` at the configured travel speed.
    pub fn lead_time_minutes(&self, distance_km: Option<f64>) -> Option<i64> {
        distance_km
            .filter(|d| d.is_finite())
            .map(|d| (d.max(0.0) / self.travel_speed_kmh * 60.0).ceil() as i64)
    }

    /// Heuristic confidence in `[0, 1]`: falls with distance, rises with the
    /// stock left over after the dispatch.
    pub fn confidence(&self, distance_km: Option<f64>, quantity: i64, available: i64) -> f64 {
        let distance_term = match distance_km {
            Some(d) if d.is_finite() => (-d.max(0.0) / self.confidence_distance_km).exp(),
            _ => 0.5,
        };
        let headroom = if available > 0 {
            ((available - quantity).max(0) as f64 / available as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let stock_term = 0.5 + 0.5 * headroom;
        let raw = DISTANCE_CONFIDENCE_SHARE * distance_term
            + (1.0 - DISTANCE_CONFIDENCE_SHARE) * stock_term;
        ((raw * 100.0).round() / 100.0).clamp(0.0, 1.0)
    }

    fn candidates(
        resource_type: &str,
        origin: Option<GeoPoint>,
        resources: &[Resource],
        remaining: &HashMap<ResourceId, i64>,
        hubs: &HashMap<WarehouseId, &Warehouse>,
    ) -> Vec<SourceSelection> {
        let to_selection = |r: &Resource| {
            let distance_km = hubs.get(&r.warehouse_id).and_then(|w| w.coordinates()).and_then(
                |hub| origin.map(|from| from.distance_km(&hub)),
            );
            SourceSelection {
                resource_id: r.id,
                resource_type: r.type_key(),
                warehouse_id: r.warehouse_id,
                distance_km,
                available: remaining.get(&r.id).copied().unwrap_or(0),
            }
        };
        let stocked = |r: &&Resource| {
            hubs.contains_key(&r.warehouse_id) && remaining.get(&r.id).copied().unwrap_or(0) > 0
        };

        if resource_type != UNSPECIFIED_RESOURCE_TYPE {
            let matching: Vec<SourceSelection> = resources
                .iter()
                .filter(stocked)
                .filter(|r| r.type_key() == resource_type)
                .map(to_selection)
                .collect();
            if !matching.is_empty() {
                return matching;
            }
        }

        // Fallback: each warehouse's most abundant line.
        let mut best: HashMap<WarehouseId, SourceSelection> = HashMap::new();
        for selection in resources.iter().filter(stocked).map(to_selection) {
            match best.get(&selection.warehouse_id) {
                Some(current)
                    if current.available > selection.available
                        || (current.available == selection.available
                            && current.resource_id < selection.resource_id) => {}
                _ => {
                    best.insert(selection.warehouse_id, selection);
                }
            }
        }
        best.into_values().collect()
    }

    /// Pick the source for one request, or `None` when nothing is in stock.
    pub fn select_source(
        &self,
        snapshot: &PrioritySnapshot,
        origin: Option<GeoPoint>,
        resources: &[Resource],
        remaining: &HashMap<ResourceId, i64>,
        warehouses: &[Warehouse],
    ) -> Option<SourceSelection> {
        let hubs: HashMap<WarehouseId, &Warehouse> = warehouses.iter().map(|w| (w.id, w)).collect();
        Self::candidates(&snapshot.resource_type, origin, resources, remaining, &hubs)
            .into_iter()
            .min_by(compare_candidates)
    }

    /// Recommendations for the top-K ranked requests that have no pending
    /// recommendation yet.
    ///
    /// Stock promised to one recommendation is not offered again within the
    /// same cycle, so a batch never commits more than a resource holds.
    pub fn generate(
        &self,
        ranked: &[PrioritySnapshot],
        origins: &HashMap<RequestId, GeoPoint>,
        warehouses: &[Warehouse],
        resources: &[Resource],
        demand: &DemandAggregate,
        pending: &HashMap<RequestId, RecommendationId>,
    ) -> Vec<NewRecommendation> {
        let warehouse_names: HashMap<WarehouseId, &str> =
            warehouses.iter().map(|w| (w.id, w.name.as_str())).collect();
        let units: HashMap<ResourceId, &str> =
            resources.iter().map(|r| (r.id, r.unit.as_str())).collect();
        let mut remaining: HashMap<ResourceId, i64> =
            resources.iter().map(|r| (r.id, r.quantity.max(0))).collect();

        let mut generated = Vec::new();
        for (rank, snapshot) in ranked.iter().take(self.top_k).enumerate() {
            if pending.contains_key(&snapshot.request_ref) {
                log::debug!(
                    "Request {} already has a pending recommendation",
                    snapshot.request_ref
                );
                continue;
            }
            let origin = origins.get(&snapshot.request_ref).copied();
            let Some(source) =
                self.select_source(snapshot, origin, resources, &remaining, warehouses)
            else {
                log::info!(
                    "No stocked source for request {} ({})",
                    snapshot.request_ref,
                    snapshot.resource_type
                );
                continue;
            };

            let quantity = snapshot.effective_people().min(source.available);
            if let Some(left) = remaining.get_mut(&source.resource_id) {
                *left -= quantity;
            }

            let lead_time = self.lead_time_minutes(source.distance_km);
            let warehouse_name = warehouse_names
                .get(&source.warehouse_id)
                .copied()
                .unwrap_or_default()
                .to_string();
            let holders: Vec<i64> = resources
                .iter()
                .filter(|r| r.type_key() == source.resource_type && r.quantity > 0)
                .map(|r| r.quantity)
                .collect();
            let inventory_average = (!holders.is_empty())
                .then(|| holders.iter().sum::<i64>() as f64 / holders.len() as f64);

            let distance_text = match source.distance_km {
                Some(d) => format!("{:.1} km", d),
                None => "unknown distance".to_string(),
            };
            let eta_text = match lead_time {
                Some(m) => format!(", ETA ~{} min", m),
                None => String::new(),
            };
            let amount = match units.get(&source.resource_id).copied() {
                Some(unit) if !unit.is_empty() => format!("{} {}", quantity, unit),
                _ => quantity.to_string(),
            };
            let rationale = format!(
                "Dispatch {} of {} from {} ({}{}) to {}; request ranked #{} with score {}.",
                amount,
                source.resource_type,
                warehouse_name,
                distance_text,
                eta_text,
                snapshot.location,
                rank + 1,
                snapshot.score
            );

            generated.push(NewRecommendation {
                request_ref: Some(snapshot.request_ref),
                resource_id: source.resource_id,
                resource_type: source.resource_type.clone(),
                suggested_quantity: quantity,
                warehouse_id: source.warehouse_id,
                warehouse_name,
                destination: snapshot.location.clone(),
                rationale,
                confidence: self.confidence(source.distance_km, quantity, source.available),
                lead_time_minutes: lead_time,
                context: RecommendationContext {
                    demand_pressure: demand
                        .cell(&snapshot.region, &snapshot.resource_type)
                        .map(|c| c.demand_pressure),
                    inventory_average,
                    weather_alert_level: None,
                    supply_pressure: snapshot.weights.supply_pressure_weight,
                    hub_capacity_ratio: snapshot.hub_capacity_ratio,
                    logistics_weights: snapshot.weights,
                    priority_score: snapshot.score,
                    distance_km: source.distance_km,
                    eta_minutes: lead_time,
                    available_quantity: source.available,
                },
            });
        }
        generated
    }
}
