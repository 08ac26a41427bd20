//! Application configuration: orchestrator tunables, the graph's hard
//! caps, store location, and logging — merged from defaults, an
//! optional YAML file, then environment variables.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::store::DEFAULT_DB_PATH;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("maxRetries must be <= {max}, got {value}")]
    MaxRetriesTooHigh { value: u32, max: u32 },
    #[error("pollIntervalMs must be > 0")]
    ZeroPollInterval,
    #[error("maxAssignmentsPerCycle must be > 0")]
    ZeroAssignmentsPerCycle,
    #[error("minCapabilityScore must be within [0, 1], got {0}")]
    ScoreOutOfRange(f64),
    #[error("invalid log level {0:?}; expected trace, debug, info, warn, or error")]
    InvalidLogLevel(String),
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: default_db_path(), max_connections: default_max_connections() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

/// The full application configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Serde mirror of [`OrchestratorConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_assignments_per_cycle")]
    pub max_assignments_per_cycle: usize,
    #[serde(default = "default_min_capability_score")]
    pub min_capability_score: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            max_retries: defaults.max_retries,
            poll_interval_ms: defaults.poll_interval_ms,
            max_assignments_per_cycle: defaults.max_assignments_per_cycle,
            min_capability_score: defaults.min_capability_score,
        }
    }
}

impl From<OrchestratorSettings> for OrchestratorConfig {
    fn from(s: OrchestratorSettings) -> Self {
        Self {
            max_retries: s.max_retries,
            poll_interval_ms: s.poll_interval_ms,
            max_assignments_per_cycle: s.max_assignments_per_cycle,
            min_capability_score: s.min_capability_score,
        }
    }
}

/// Serde mirror of [`GraphConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    #[serde(default = "default_max_tasks")]
    pub max_tasks: u32,
    #[serde(default = "default_max_dependencies")]
    pub max_dependencies: u32,
    #[serde(default = "default_max_retries_ceiling")]
    pub max_retries_ceiling: u32,
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        let defaults = GraphConfig::default();
        Self {
            max_tasks: defaults.max_tasks,
            max_dependencies: defaults.max_dependencies,
            max_retries_ceiling: defaults.max_retries_ceiling,
            max_timeout_ms: defaults.max_timeout_ms,
        }
    }
}

impl From<GraphSettings> for GraphConfig {
    fn from(s: GraphSettings) -> Self {
        Self {
            max_tasks: s.max_tasks,
            max_dependencies: s.max_dependencies,
            max_retries_ceiling: s.max_retries_ceiling,
            max_timeout_ms: s.max_timeout_ms,
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_poll_interval_ms() -> u64 {
    5_000
}
fn default_max_assignments_per_cycle() -> usize {
    5
}
fn default_min_capability_score() -> f64 {
    0.1
}
fn default_max_tasks() -> u32 {
    10_000
}
fn default_max_dependencies() -> u32 {
    100
}
fn default_max_retries_ceiling() -> u32 {
    10
}
fn default_max_timeout_ms() -> u64 {
    3_600_000
}

impl AppConfig {
    /// Merge programmatic defaults, an optional YAML file, then
    /// `TASKGRAPH_`-prefixed environment variables (highest precedence).
    pub fn load(yaml_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(yaml_path.as_ref()))
            .merge(Env::prefixed("TASKGRAPH_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("task-graph.yaml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_retries > self.graph.max_retries_ceiling {
            return Err(ConfigError::MaxRetriesTooHigh {
                value: self.orchestrator.max_retries,
                max: self.graph.max_retries_ceiling,
            });
        }
        if self.orchestrator.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.orchestrator.max_assignments_per_cycle == 0 {
            return Err(ConfigError::ZeroAssignmentsPerCycle);
        }
        if !(0.0..=1.0).contains(&self.orchestrator.min_capability_score) {
            return Err(ConfigError::ScoreOutOfRange(self.orchestrator.min_capability_score));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_retry_ceiling_mismatch() {
        let mut config = AppConfig::default();
        config.orchestrator.max_retries = 20;
        assert!(matches!(config.validate(), Err(ConfigError::MaxRetriesTooHigh { .. })));
    }
}
