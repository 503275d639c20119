//! Engine configuration file support.
//!
//! Scoring weights, cadence and bounds are read from `engine.toml` (or the
//! path in `RELIEF_ENGINE_CONFIG`), then overridden by environment variables.
//! Invalid settings are fatal at startup; nothing here is reloaded mid-run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading/validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub weights: WeightSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub recommendations: RecommendationSettings,
    #[serde(default)]
    pub demand: DemandSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// Non-negative multipliers applied to each priority factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSettings {
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,
    #[serde(default = "default_hub_capacity_weight")]
    pub hub_capacity: f64,
    #[serde(default = "default_supply_pressure_weight")]
    pub supply_pressure: f64,
}

/// Shape parameters of the individual factor curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Age contribution grows one point per minute until this cap.
    #[serde(default = "default_age_cap_minutes")]
    pub age_cap_minutes: f64,
    /// Distance at which the proximity factor drops to half its maximum.
    #[serde(default = "default_proximity_half_km")]
    pub proximity_half_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSettings {
    /// Number of top-ranked requests considered per cycle.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_travel_speed_kmh")]
    pub travel_speed_kmh: f64,
    /// Distance scale over which confidence decays.
    #[serde(default = "default_confidence_distance_km")]
    pub confidence_distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandSettings {
    /// Length of the trend ring.
    #[serde(default = "default_timeline_buckets")]
    pub timeline_buckets: usize,
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_recalc_interval_secs")]
    pub recalc_interval_secs: u64,
    /// Staleness below `warning_multiplier * interval` is healthy.
    #[serde(default = "default_warning_multiplier")]
    pub warning_multiplier: f64,
    /// Staleness at or above `critical_multiplier * interval` is critical.
    #[serde(default = "default_critical_multiplier")]
    pub critical_multiplier: f64,
    /// Externally driven jobs (ingestion feeds) tracked alongside the engine.
    #[serde(default = "default_external_jobs")]
    pub external_jobs: Vec<ExternalJobSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalJobSettings {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub interval_secs: u64,
}

fn default_age_weight() -> f64 {
    1.0
}

fn default_proximity_weight() -> f64 {
    3.0
}

fn default_hub_capacity_weight() -> f64 {
    2.0
}

fn default_supply_pressure_weight() -> f64 {
    4.0
}

fn default_age_cap_minutes() -> f64 {
    720.0
}

fn default_proximity_half_km() -> f64 {
    10.0
}

fn default_top_k() -> usize {
    5
}

fn default_travel_speed_kmh() -> f64 {
    40.0
}

fn default_confidence_distance_km() -> f64 {
    50.0
}

fn default_timeline_buckets() -> usize {
    48
}

fn default_bucket_minutes() -> i64 {
    60
}

fn default_recalc_interval_secs() -> u64 {
    300
}

fn default_warning_multiplier() -> f64 {
    1.0
}

fn default_critical_multiplier() -> f64 {
    2.0
}

fn default_external_jobs() -> Vec<ExternalJobSettings> {
    vec![
        ExternalJobSettings {
            name: "weather-ingest".to_string(),
            label: "Weather ingestion".to_string(),
            description: "Pulls weather observations for active regions".to_string(),
            interval_secs: 900,
        },
        ExternalJobSettings {
            name: "gov-alerts-ingest".to_string(),
            label: "Government alerts".to_string(),
            description: "Pulls official disaster alerts".to_string(),
            interval_secs: 600,
        },
    ]
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            age: default_age_weight(),
            proximity: default_proximity_weight(),
            hub_capacity: default_hub_capacity_weight(),
            supply_pressure: default_supply_pressure_weight(),
        }
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            age_cap_minutes: default_age_cap_minutes(),
            proximity_half_km: default_proximity_half_km(),
        }
    }
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            travel_speed_kmh: default_travel_speed_kmh(),
            confidence_distance_km: default_confidence_distance_km(),
        }
    }
}

impl Default for DemandSettings {
    fn default() -> Self {
        Self {
            timeline_buckets: default_timeline_buckets(),
            bucket_minutes: default_bucket_minutes(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            recalc_interval_secs: default_recalc_interval_secs(),
            warning_multiplier: default_warning_multiplier(),
            critical_multiplier: default_critical_multiplier(),
            external_jobs: default_external_jobs(),
        }
    }
}

impl SchedulerSettings {
    pub fn recalc_interval(&self) -> Duration {
        Duration::from_secs(self.recalc_interval_secs)
    }
}

impl EngineConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Load configuration the way the server does at startup.
    ///
    /// Uses `RELIEF_ENGINE_CONFIG` when set (the file must exist), otherwise
    /// `engine.toml` in the working directory if present, otherwise defaults.
    /// Environment overrides are applied last and the result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("RELIEF_ENGINE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => {
                let default_path = PathBuf::from("engine.toml");
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RELIEF_*` environment overrides on top of file settings.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<f64>("RELIEF_WEIGHT_AGE")? {
            self.weights.age = v;
        }
        if let Some(v) = env_parse::<f64>("RELIEF_WEIGHT_PROXIMITY")? {
            self.weights.proximity = v;
        }
        if let Some(v) = env_parse::<f64>("RELIEF_WEIGHT_HUB_CAPACITY")? {
            self.weights.hub_capacity = v;
        }
        if let Some(v) = env_parse::<f64>("RELIEF_WEIGHT_SUPPLY_PRESSURE")? {
            self.weights.supply_pressure = v;
        }
        if let Some(v) = env_parse::<u64>("RELIEF_RECALC_INTERVAL_SECS")? {
            self.scheduler.recalc_interval_secs = v;
        }
        if let Some(v) = env_parse::<usize>("RELIEF_TOP_K")? {
            self.recommendations.top_k = v;
        }
        if let Some(v) = env_parse::<usize>("RELIEF_TIMELINE_BUCKETS")? {
            self.demand.timeline_buckets = v;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("weights.age", self.weights.age),
            ("weights.proximity", self.weights.proximity),
            ("weights.hub_capacity", self.weights.hub_capacity),
            ("weights.supply_pressure", self.weights.supply_pressure),
        ];
        for (key, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    key,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }
        if weights.iter().all(|(_, v)| *v == 0.0) {
            return Err(ConfigError::invalid("weights", "at least one weight must be positive"));
        }

        positive("scoring.age_cap_minutes", self.scoring.age_cap_minutes)?;
        positive("scoring.proximity_half_km", self.scoring.proximity_half_km)?;
        positive("recommendations.travel_speed_kmh", self.recommendations.travel_speed_kmh)?;
        positive(
            "recommendations.confidence_distance_km",
            self.recommendations.confidence_distance_km,
        )?;

        if self.recommendations.top_k == 0 {
            return Err(ConfigError::invalid("recommendations.top_k", "must be at least 1"));
        }
        if self.demand.timeline_buckets == 0 {
            return Err(ConfigError::invalid("demand.timeline_buckets", "must be at least 1"));
        }
        if self.demand.bucket_minutes <= 0 {
            return Err(ConfigError::invalid("demand.bucket_minutes", "must be positive"));
        }
        if self.scheduler.recalc_interval_secs == 0 {
            return Err(ConfigError::invalid("scheduler.recalc_interval_secs", "must be positive"));
        }
        positive("scheduler.warning_multiplier", self.scheduler.warning_multiplier)?;
        positive("scheduler.critical_multiplier", self.scheduler.critical_multiplier)?;
        if self.scheduler.critical_multiplier <= self.scheduler.warning_multiplier {
            return Err(ConfigError::invalid(
                "scheduler.critical_multiplier",
                "must be greater than scheduler.warning_multiplier",
            ));
        }
        for job in &self.scheduler.external_jobs {
            if job.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "scheduler.external_jobs.name",
                    "must not be empty",
                ));
            }
            if job.interval_secs == 0 {
                return Err(ConfigError::invalid(
                    format!("scheduler.external_jobs.{}.interval_secs", job.name),
                    "must be positive",
                ));
            }
        }
        Ok(())
    }
}

fn positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be a positive number, got {}", value)))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse {:?}", raw))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recommendations.top_k, 5);
        assert_eq!(config.scheduler.external_jobs.len(), 2);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[weights]
age = 2.0

[scheduler]
recalc_interval_secs = 60
external_jobs = []
"#;

        let config = EngineConfig::from_toml_str(toml, Path::new("engine.toml")).unwrap();
        assert_eq!(config.weights.age, 2.0);
        assert_eq!(config.weights.proximity, 3.0);
        assert_eq!(config.scheduler.recalc_interval(), Duration::from_secs(60));
        assert!(config.scheduler.external_jobs.is_empty());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let toml = r#"
[weights]
proximity = -1.0
"#;

        let result = EngineConfig::from_toml_str(toml, Path::new("engine.toml"));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref key, .. }) if key == "weights.proximity"
        ));
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let mut config = EngineConfig::default();
        config.weights = WeightSettings {
            age: 0.0,
            proximity: 0.0,
            hub_capacity: 0.0,
            supply_pressure: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_critical_multiplier_must_exceed_warning() {
        let mut config = EngineConfig::default();
        config.scheduler.critical_multiplier = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = EngineConfig::from_toml_str("[weights\nage = ", Path::new("broken.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[recommendations]\ntop_k = 3\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.recommendations.top_k, 3);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = EngineConfig::from_file("/definitely/not/here/engine.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
