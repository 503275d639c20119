//! Read models for the relief domain entities the engine consumes.
//!
//! Rescue requests, warehouses and resources are owned by the surrounding
//! application; the engine only reads them (and decrements resource stock
//! through the applier).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::define_id_type;
use crate::services::geo::{self, GeoPoint};

define_id_type!(i64, RequestId);
define_id_type!(i64, WarehouseId);
define_id_type!(i64, ResourceId);

/// Lifecycle status of a rescue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    /// Only pending and in-progress requests take part in scoring.
    pub fn is_open(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(RequestStatus::Pending),
            "in_progress" | "in-progress" => Some(RequestStatus::InProgress),
            "fulfilled" => Some(RequestStatus::Fulfilled),
            "cancelled" | "canceled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }
}

/// Operator-assigned priority of a rescue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    Medium,
    High,
}

impl RequestPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestPriority::Low => "low",
            RequestPriority::Medium => "medium",
            RequestPriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(RequestPriority::Low),
            "medium" => Some(RequestPriority::Medium),
            "high" => Some(RequestPriority::High),
            _ => None,
        }
    }
}

fn default_people_count() -> u32 {
    1
}

/// A rescue request as exposed by the request repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueRequest {
    pub id: RequestId,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub status: RequestStatus,
    pub priority: RequestPriority,
    #[serde(default = "default_people_count")]
    pub people_count: u32,
    /// Free-form needs reported with the request ("water", "medical kits", ...).
    #[serde(default)]
    pub needs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RescueRequest {
    /// Validated coordinates, or `None` when missing or out of range.
    pub fn coordinates(&self) -> Option<GeoPoint> {
        GeoPoint::from_optional(self.latitude, self.longitude)
    }

    /// True when coordinates were supplied but could not be used.
    pub fn has_malformed_coordinates(&self) -> bool {
        (self.latitude.is_some() || self.longitude.is_some()) && self.coordinates().is_none()
    }

    pub fn region(&self) -> String {
        geo::region_from_location(&self.location)
    }
}

/// A warehouse (distribution hub).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Rated capacity in stock units; 0 means unknown/uncapped.
    #[serde(default)]
    pub capacity: i64,
    #[serde(default)]
    pub last_audited_at: Option<DateTime<Utc>>,
}

impl Warehouse {
    pub fn coordinates(&self) -> Option<GeoPoint> {
        GeoPoint::from_optional(self.latitude, self.longitude)
    }

    pub fn region(&self) -> String {
        geo::region_from_location(&self.location)
    }

    /// `stock / capacity`, undefined when the capacity is unknown.
    pub fn capacity_ratio(&self, stock: i64) -> Option<f64> {
        if self.capacity <= 0 {
            return None;
        }
        Some(stock.max(0) as f64 / self.capacity as f64)
    }
}

/// A stock line held by a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub reorder_level: i64,
    pub warehouse_id: WarehouseId,
}

impl Resource {
    /// Normalized type key used for matching and bucketing.
    pub fn type_key(&self) -> String {
        geo::normalize_resource_type(&self.resource_type)
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }

    pub fn below_reorder_level(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}
