//! Periodic and manually triggered recalculation cycles.
//!
//! One cycle runs aggregation, scoring and generation in sequence and then
//! publishes a fresh [`EngineSnapshot`]. Cycles are single-flight: a trigger
//! that arrives while a cycle is running is coalesced into that cycle.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::repository::{FullRepository, RecommendationRepository, ReliefDataRepository};
use crate::models::{
    PrioritySnapshot, RecommendationId, RequestId, RescueRequest, Resource, Warehouse,
};
use crate::services::clock::Clock;
use crate::services::demand::{DemandAggregate, DemandSignalAggregator, DemandTimeline};
use crate::services::error::{EngineError, EngineResult};
use crate::services::priority::PriorityScorer;
use crate::services::recommendations::RecommendationGenerator;
use crate::services::scheduler_health::SchedulerHealthTracker;
use crate::services::snapshot::{EngineSnapshot, SnapshotStore};

/// Composite aggregation + scoring + generation job.
pub const PRIORITY_RECALC_JOB: &str = "priority-recalc";
pub const DEMAND_AGGREGATION_JOB: &str = "demand-aggregation";
pub const RECOMMENDATION_GENERATION_JOB: &str = "recommendation-generation";

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub priorities: usize,
    pub demand_cells: usize,
    pub recommendations_created: usize,
    /// Set when generation failed but priorities were still published.
    pub generation_error: Option<String>,
}

/// Result of a synchronous recalculation request.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was in flight; its published snapshot is the result.
    Coalesced(Option<Arc<EngineSnapshot>>),
}

/// Result of a fire-and-forget trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started { cycle_id: Uuid },
    Coalesced { cycle_id: Option<Uuid> },
}

struct CycleInputs {
    requests: Vec<RescueRequest>,
    warehouses: Vec<Warehouse>,
    resources: Vec<Resource>,
}

/// Orchestrator.
pub struct Orchestrator {
    repo: Arc<dyn FullRepository>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    aggregator: DemandSignalAggregator,
    scorer: PriorityScorer,
    generator: RecommendationGenerator,
    tracker: SchedulerHealthTracker,
    store: SnapshotStore,
    timeline: Mutex<DemandTimeline>,
    cycle_lock: Arc<AsyncMutex<()>>,
    in_flight: RwLock<Option<Uuid>>,
}

impl Orchestrator {
    pub fn new(repo: Arc<dyn FullRepository>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let tracker = SchedulerHealthTracker::new(Arc::clone(&clock), &config.scheduler);
        let interval_ms = config.scheduler.recalc_interval_secs.saturating_mul(1000);
        tracker.register(
            PRIORITY_RECALC_JOB,
            "Priority recalculation",
            "Aggregates demand, re-ranks open requests and proposes dispatches",
            interval_ms,
        );
        tracker.register(
            DEMAND_AGGREGATION_JOB,
            "Demand aggregation",
            "Buckets open requests and inventory into regional demand pressure",
            interval_ms,
        );
        tracker.register(
            RECOMMENDATION_GENERATION_JOB,
            "Recommendation generation",
            "Proposes warehouse dispatches for the top-ranked requests",
            interval_ms,
        );

        Self {
            aggregator: DemandSignalAggregator::new(&config.demand),
            scorer: PriorityScorer::new(&config.weights, &config.scoring),
            generator: RecommendationGenerator::new(&config.recommendations),
            timeline: Mutex::new(DemandTimeline::new(config.demand.timeline_buckets)),
            store: SnapshotStore::new(),
            cycle_lock: Arc::new(AsyncMutex::new(())),
            in_flight: RwLock::new(None),
            tracker,
            repo,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &SchedulerHealthTracker {
        &self.tracker
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Last completed snapshot.
    pub fn snapshot(&self) -> Option<Arc<EngineSnapshot>> {
        self.store.current()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.read().is_some()
    }

    /// Run a cycle now and wait for it.
    ///
    /// If a cycle is already in flight this waits for it to finish and
    /// returns its snapshot instead of starting a second one.
    pub async fn recalculate(&self) -> EngineResult<CycleOutcome> {
        match Arc::clone(&self.cycle_lock).try_lock_owned() {
            Ok(_guard) => {
                let report = self.run_cycle(Uuid::new_v4()).await?;
                Ok(CycleOutcome::Completed(report))
            }
            Err(_) => {
                log::info!("Recalculation coalesced into the in-flight cycle");
                let _wait = self.cycle_lock.lock().await;
                Ok(CycleOutcome::Coalesced(self.store.current()))
            }
        }
    }

    /// Start a cycle in the background unless one is already running.
    pub fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        match Arc::clone(&self.cycle_lock).try_lock_owned() {
            Ok(guard) => {
                let cycle_id = Uuid::new_v4();
                *self.in_flight.write() = Some(cycle_id);
                let me = Arc::clone(self);
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = me.run_cycle(cycle_id).await {
                        log::warn!("Triggered cycle {} did not publish: {}", cycle_id, e);
                    }
                });
                TriggerOutcome::Started { cycle_id }
            }
            Err(_) => {
                let cycle_id = self.coalesced_cycle_id();
                log::info!("Recalculate trigger coalesced into cycle {:?}", cycle_id);
                TriggerOutcome::Coalesced { cycle_id }
            }
        }
    }

    /// Cycle a coalesced trigger joins. Between clearing `in_flight` and
    /// releasing the lock, that is the cycle which just published.
    pub(crate) fn coalesced_cycle_id(&self) -> Option<Uuid> {
        let in_flight = *self.in_flight.read();
        in_flight.or_else(|| self.store.current_cycle_id())
    }

    /// Drive cycles on the configured interval. The first tick fires at once.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> JoinHandle<()> {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(me.config.scheduler.recalc_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match Arc::clone(&me.cycle_lock).try_lock_owned() {
                    Ok(_guard) => {
                        if let Err(e) = me.run_cycle(Uuid::new_v4()).await {
                            log::warn!("Scheduled cycle kept the previous snapshot: {}", e);
                        }
                    }
                    Err(_) => log::debug!("Scheduled tick skipped; a cycle is already running"),
                }
            }
        })
    }

    /// Run one cycle. The caller must hold `cycle_lock`.
    async fn run_cycle(&self, cycle_id: Uuid) -> EngineResult<CycleReport> {
        *self.in_flight.write() = Some(cycle_id);
        log::info!("Starting recalculation cycle {}", cycle_id);
        let result = self
            .tracker
            .track(PRIORITY_RECALC_JOB, self.execute_cycle(cycle_id))
            .await;
        *self.in_flight.write() = None;
        result
    }

    async fn load_inputs(&self) -> EngineResult<CycleInputs> {
        let requests = self
            .repo
            .list_open_requests()
            .await
            .map_err(|e| EngineError::data_unavailable("reading rescue requests", e))?;
        let warehouses = self
            .repo
            .list_warehouses()
            .await
            .map_err(|e| EngineError::data_unavailable("reading warehouses", e))?;
        let resources = self
            .repo
            .list_resources()
            .await
            .map_err(|e| EngineError::data_unavailable("reading inventory", e))?;
        Ok(CycleInputs {
            requests,
            warehouses,
            resources,
        })
    }

    async fn generate_and_store(
        &self,
        ranked: &[PrioritySnapshot],
        inputs: &CycleInputs,
        demand: &DemandAggregate,
        now: DateTime<Utc>,
    ) -> EngineResult<(usize, HashMap<RequestId, RecommendationId>)> {
        let pending = self.repo.pending_request_refs().await?;
        let origins = inputs
            .requests
            .iter()
            .filter_map(|r| r.coordinates().map(|p| (r.id, p)))
            .collect();
        let batch = self.generator.generate(
            ranked,
            &origins,
            &inputs.warehouses,
            &inputs.resources,
            demand,
            &pending,
        );
        let created = if batch.is_empty() {
            0
        } else {
            self.repo.insert_recommendations(batch, now).await?.len()
        };
        let refs = if created == 0 {
            pending
        } else {
            self.repo.pending_request_refs().await?
        };
        Ok((created, refs))
    }

    async fn execute_cycle(&self, cycle_id: Uuid) -> EngineResult<CycleReport> {
        let now = self.clock.now();

        let (inputs, demand) = self
            .tracker
            .track(DEMAND_AGGREGATION_JOB, async {
                let inputs = self.load_inputs().await?;
                let demand = self.aggregator.aggregate(
                    &inputs.requests,
                    &inputs.warehouses,
                    &inputs.resources,
                    now,
                );
                log::info!(
                    "Aggregated {} open requests into {} demand cells",
                    inputs.requests.len(),
                    demand.cells.len()
                );
                Ok::<_, EngineError>((inputs, demand))
            })
            .await?;

        let mut priorities = self.scorer.score_all(
            &inputs.requests,
            &inputs.warehouses,
            &inputs.resources,
            &demand,
            now,
        );

        let generation = self
            .tracker
            .track(
                RECOMMENDATION_GENERATION_JOB,
                self.generate_and_store(&priorities, &inputs, &demand, now),
            )
            .await;
        let (recommendations_created, generation_error, refs) = match generation {
            Ok((created, refs)) => (created, None, refs),
            Err(e) => {
                // Priorities are still published; links come from whatever is readable.
                let refs = self.repo.pending_request_refs().await.unwrap_or_default();
                (0, Some(e.to_string()), refs)
            }
        };
        for snapshot in &mut priorities {
            snapshot.recommendation_ref = refs.get(&snapshot.request_ref).copied();
        }

        let timeline = {
            let mut ring = self.timeline.lock();
            ring.push(demand.point.clone());
            ring.latest(ring.capacity())
        };

        let report = CycleReport {
            cycle_id,
            generated_at: now,
            priorities: priorities.len(),
            demand_cells: demand.cells.len(),
            recommendations_created,
            generation_error,
        };
        self.store.publish(EngineSnapshot {
            cycle_id,
            generated_at: now,
            priorities,
            demand_cells: demand.cells,
            timeline,
        });
        log::info!(
            "Cycle {} published {} priorities, {} new recommendations",
            cycle_id,
            report.priorities,
            report.recommendations_created
        );
        Ok(report)
    }
}
