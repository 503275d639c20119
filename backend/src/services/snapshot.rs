//! Immutable published engine state.
//!
//! A cycle builds a complete [`EngineSnapshot`] and then swaps it in with one
//! pointer write. Readers clone the `Arc` and never see a partial ranking.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{DemandCell, DemandTimelinePoint, PrioritySnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Ranked by score descending, oldest first on ties.
    pub priorities: Vec<PrioritySnapshot>,
    pub demand_cells: Vec<DemandCell>,
    /// Trend ring contents at publication time, oldest first.
    pub timeline: Vec<DemandTimelinePoint>,
}

impl EngineSnapshot {
    /// The newest `buckets` timeline points.
    pub fn timeline_tail(&self, buckets: usize) -> &[DemandTimelinePoint] {
        let skip = self.timeline.len().saturating_sub(buckets);
        &self.timeline[skip..]
    }

    pub fn latest_bucket_start(&self) -> Option<DateTime<Utc>> {
        self.timeline.last().map(|p| p.bucket_start)
    }
}

/// Holder of the last completed snapshot.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Option<Arc<EngineSnapshot>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: EngineSnapshot) -> Arc<EngineSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Last completed snapshot, or `None` before the first cycle finishes.
    pub fn current(&self) -> Option<Arc<EngineSnapshot>> {
        self.current.read().clone()
    }

    pub fn current_cycle_id(&self) -> Option<Uuid> {
        self.current.read().as_ref().map(|s| s.cycle_id)
    }
}
