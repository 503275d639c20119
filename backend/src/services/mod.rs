//! Service layer: the prioritization engine.
//!
//! Services sit between the repositories and the HTTP layer. Aggregation,
//! scoring and generation are pure computations over repository snapshots;
//! the applier and orchestrator own the side effects.
//!
//! ```text
//! requests/warehouses/resources
//!         │
//!         ▼
//! DemandSignalAggregator ─► PriorityScorer ─► RecommendationGenerator
//!                                                     │
//!                                    operator action  ▼
//!                                          RecommendationApplier
//! ```
//!
//! [`Orchestrator`] drives the first three as one cycle and
//! [`SchedulerHealthTracker`] observes every run.

pub mod applier;
pub mod clock;
pub mod demand;
pub mod error;
pub mod geo;
pub mod orchestrator;
pub mod priority;
pub mod recommendations;
pub mod scheduler_health;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_fixtures;

#[cfg(test)]
#[path = "demand_tests.rs"]
mod demand_tests;

#[cfg(test)]
#[path = "priority_tests.rs"]
mod priority_tests;


#[cfg(test)]
#[path = "applier_tests.rs"]
mod applier_tests;



pub use applier::{AppliedRecommendation, RecommendationApplier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use demand::{DemandAggregate, DemandSignalAggregator, DemandTimeline};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{CycleOutcome, CycleReport, Orchestrator, TriggerOutcome};
pub use priority::PriorityScorer;
pub use recommendations::RecommendationGenerator;
pub use scheduler_health::SchedulerHealthTracker;
pub use snapshot::{EngineSnapshot, SnapshotStore};
