//! Scheduler health records exposed to the dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of a periodic job, derived from its staleness at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerStatus {
    Healthy,
    Warning,
    Critical,
    /// The job has never run since it was registered.
    Never,
}

impl SchedulerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerStatus::Healthy => "healthy",
            SchedulerStatus::Warning => "warning",
            SchedulerStatus::Critical => "critical",
            SchedulerStatus::Never => "never",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerHealthRecord {
    pub name: String,
    pub label: String,
    pub description: String,
    pub status: SchedulerStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub stale_for_ms: Option<i64>,
    pub expected_interval_ms: u64,
    pub last_error_message: Option<String>,
}
