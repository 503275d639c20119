//! Health and staleness tracking for periodic jobs.
//!
//! Status is never stored: it is derived on read from the time elapsed since
//! the last run, relative to the job's expected interval.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::SchedulerSettings;
use crate::models::{SchedulerHealthRecord, SchedulerStatus};
use crate::services::clock::Clock;
use crate::services::error::{EngineError, EngineResult};

/// Classify staleness against an expected interval.
pub fn classify(
    stale_for_ms: Option<i64>,
    expected_interval_ms: u64,
    warning_multiplier: f64,
    critical_multiplier: f64,
) -> SchedulerStatus {
    let Some(stale) = stale_for_ms else {
        return SchedulerStatus::Never;
    };
    let stale = stale.max(0) as f64;
    let expected = expected_interval_ms as f64;
    if stale < warning_multiplier * expected {
        SchedulerStatus::Healthy
    } else if stale < critical_multiplier * expected {
        SchedulerStatus::Warning
    } else {
        SchedulerStatus::Critical
    }
}

#[derive(Debug, Clone)]
struct JobState {
    name: String,
    label: String,
    description: String,
    expected_interval_ms: u64,
    /// Run by an out-of-process feed that reports its own runs.
    external: bool,
    last_run_at: Option<DateTime<Utc>>,
    last_duration_ms: Option<u64>,
    last_error_message: Option<String>,
}

/// SchedulerHealthTracker.
#[derive(Clone)]
pub struct SchedulerHealthTracker {
    jobs: Arc<RwLock<Vec<JobState>>>,
    clock: Arc<dyn Clock>,
    warning_multiplier: f64,
    critical_multiplier: f64,
}

impl SchedulerHealthTracker {
    pub fn new(clock: Arc<dyn Clock>, settings: &SchedulerSettings) -> Self {
        let tracker = Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            clock,
            warning_multiplier: settings.warning_multiplier,
            critical_multiplier: settings.critical_multiplier,
        };
        for job in &settings.external_jobs {
            tracker.upsert(
                &job.name,
                &job.label,
                &job.description,
                job.interval_secs.saturating_mul(1000),
                true,
            );
        }
        tracker
    }

    /// Register a job driven by the engine itself.
    ///
    /// Re-registering updates its metadata and keeps history.
    pub fn register(&self, name: &str, label: &str, description: &str, expected_interval_ms: u64) {
        self.upsert(name, label, description, expected_interval_ms, false);
    }

    fn upsert(
        &self,
        name: &str,
        label: &str,
        description: &str,
        expected_interval_ms: u64,
        external: bool,
    ) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.iter_mut().find(|j| j.name == name) {
            job.label = label.to_string();
            job.description = description.to_string();
            job.expected_interval_ms = expected_interval_ms;
            job.external = external;
            return;
        }
        jobs.push(JobState {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            expected_interval_ms,
            external,
            last_run_at: None,
            last_duration_ms: None,
            last_error_message: None,
        });
    }

    /// Whether `name` is an ingestion feed that reports its own runs.
    pub fn is_external(&self, name: &str) -> bool {
        self.jobs.read().iter().any(|j| j.name == name && j.external)
    }

    /// Record a run reported by an external feed.
    ///
    /// Engine jobs are rejected so a report can never mask a stalled or
    /// failing cycle.
    pub fn report_external_run(
        &self,
        name: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: Option<String>,
    ) -> EngineResult<()> {
        if !self.is_external(name) {
            if self.record(name).is_some() {
                return Err(EngineError::EngineOwnedJob {
                    name: name.to_string(),
                });
            }
            return Err(EngineError::NotFound(format!(
                "Scheduler job '{}' not found",
                name
            )));
        }
        self.record_run(name, started_at, duration_ms, error)
    }

    /// Record one attempt, successful or not. A success clears the last error.
    pub fn record_run(
        &self,
        name: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: Option<String>,
    ) -> EngineResult<()> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.name == name)
            .ok_or_else(|| EngineError::NotFound(format!("Scheduler job '{}' not found", name)))?;
        job.last_run_at = Some(started_at);
        job.last_duration_ms = Some(duration_ms);
        job.last_error_message = error;
        Ok(())
    }

    /// Run `work` as job `name`, recording its start, duration and outcome.
    pub async fn track<T, E, F>(&self, name: &str, work: F) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let started_at = self.clock.now();
        let timer = Instant::now();
        let result = work.await;
        let duration_ms = timer.elapsed().as_millis() as u64;

        let error = match &result {
            Ok(_) => {
                log::info!("Job '{}' completed in {} ms", name, duration_ms);
                None
            }
            Err(e) => {
                log::error!("Job '{}' failed after {} ms: {}", name, duration_ms, e);
                Some(e.to_string())
            }
        };
        if let Err(e) = self.record_run(name, started_at, duration_ms, error) {
            log::warn!("Untracked job run: {}", e);
        }
        result
    }

    fn to_record(&self, job: &JobState, now: DateTime<Utc>) -> SchedulerHealthRecord {
        let stale_for_ms = job
            .last_run_at
            .map(|at| (now - at).num_milliseconds().max(0));
        SchedulerHealthRecord {
            name: job.name.clone(),
            label: job.label.clone(),
            description: job.description.clone(),
            status: classify(
                stale_for_ms,
                job.expected_interval_ms,
                self.warning_multiplier,
                self.critical_multiplier,
            ),
            last_run_at: job.last_run_at,
            last_duration_ms: job.last_duration_ms,
            stale_for_ms,
            expected_interval_ms: job.expected_interval_ms,
            last_error_message: job.last_error_message.clone(),
        }
    }

    /// Health of every registered job, in registration order.
    pub fn records(&self) -> Vec<SchedulerHealthRecord> {
        let now = self.clock.now();
        self.jobs
            .read()
            .iter()
            .map(|job| self.to_record(job, now))
            .collect()
    }

    pub fn record(&self, name: &str) -> Option<SchedulerHealthRecord> {
        let now = self.clock.now();
        self.jobs
            .read()
            .iter()
            .find(|j| j.name == name)
            .map(|job| self.to_record(job, now))
    }
}
