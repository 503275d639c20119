//! Geospatial and classification helpers shared by the aggregator, scorer and
//! generator: coordinate validation, great-circle distance, region
//! derivation and resource-type inference.

use std::collections::BTreeSet;

use crate::models::UNSPECIFIED_RESOURCE_TYPE;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Region assigned when a location string carries no usable segment.
pub const UNKNOWN_REGION: &str = "unknown";

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` for non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    pub fn from_optional(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            _ => None,
        }
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Region key of a free-form location: the last non-empty comma-separated
/// segment, trimmed and lowercased ("12 Main St, Springfield" -> "springfield").
pub fn region_from_location(location: &str) -> String {
    location
        .split(',')
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_lowercase())
        .unwrap_or_else(|| UNKNOWN_REGION.to_string())
}

/// Canonical form of a resource type label.
pub fn normalize_resource_type(raw: &str) -> String {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        UNSPECIFIED_RESOURCE_TYPE.to_string()
    } else {
        normalized
    }
}

fn singular(word: &str) -> &str {
    word.strip_suffix('s').filter(|w| !w.is_empty()).unwrap_or(word)
}

fn matches_type(need: &str, resource_type: &str) -> bool {
    if need == resource_type || singular(need) == singular(resource_type) {
        return true;
    }
    let need_words: Vec<&str> = need.split(' ').map(singular).collect();
    let type_words: Vec<&str> = resource_type.split(' ').map(singular).collect();
    type_words.iter().all(|w| need_words.contains(w))
        || need_words.iter().all(|w| type_words.contains(w))
}

/// Infer which known resource type a request needs.
///
/// Needs are tried in the order they were reported; exact matches win over
/// word matches, and ties between known types resolve alphabetically.
pub fn infer_resource_type(needs: &[String], known_types: &BTreeSet<String>) -> Option<String> {
    for need in needs {
        let need = normalize_resource_type(need);
        if need == UNSPECIFIED_RESOURCE_TYPE {
            continue;
        }
        if known_types.contains(&need) {
            return Some(need);
        }
        if let Some(found) = known_types.iter().find(|t| matches_type(&need, t)) {
            return Some(found.clone());
        }
    }
    None
}
