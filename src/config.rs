// src/config.rs - Machine and planner configuration
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::{MOTORS, ONE_MINUTE_OF_MICROSECONDS};

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub machine: MachineConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Machine geometry and motor mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MachineConfig {
    /// Kinematics model: "cartesian" or "corexy".
    #[serde(default = "default_kinematics")]
    pub kinematics: String,

    /// Steps per millimetre for each motor.
    #[serde(default = "default_steps_per_mm")]
    pub steps_per_mm: [f64; MOTORS],
}

/// Planner tuning parameters. Velocities are mm/min, times are minutes,
/// jerk is mm/min³ throughout the planner.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Maximum linear jerk (mm/min³).
    #[serde(default = "default_linear_jerk_max")]
    pub linear_jerk_max: f64,

    /// Arc chord length and shortest plannable segment (mm).
    #[serde(default = "default_min_segment_len")]
    pub min_segment_len: f64,

    /// Shortest segment duration emitted to the motor queue (minutes).
    #[serde(default = "default_min_segment_time")]
    pub min_segment_time: f64,

    /// How many queued moves the backplanner may walk per submit.
    #[serde(default = "default_max_lookback_depth")]
    pub max_lookback_depth: usize,
}

fn default_kinematics() -> String {
    "cartesian".to_string()
}
fn default_steps_per_mm() -> [f64; MOTORS] {
    [80.0, 80.0, 400.0, 80.0]
}
fn default_linear_jerk_max() -> f64 {
    50_000_000.0
}
fn default_min_segment_len() -> f64 {
    0.05
}
fn default_min_segment_time() -> f64 {
    // 10 ms segments
    10_000.0 / ONE_MINUTE_OF_MICROSECONDS
}
fn default_max_lookback_depth() -> usize {
    8
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            kinematics: default_kinematics(),
            steps_per_mm: default_steps_per_mm(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            linear_jerk_max: default_linear_jerk_max(),
            min_segment_len: default_min_segment_len(),
            min_segment_time: default_min_segment_time(),
            max_lookback_depth: default_max_lookback_depth(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            machine: MachineConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planner.linear_jerk_max <= 0.0 {
            return Err(ConfigError::Invalid(
                "linear_jerk_max must be positive".to_string(),
            ));
        }
        if self.planner.min_segment_len <= 0.0 {
            return Err(ConfigError::Invalid(
                "min_segment_len must be positive".to_string(),
            ));
        }
        if self.planner.min_segment_time <= 0.0 {
            return Err(ConfigError::Invalid(
                "min_segment_time must be positive".to_string(),
            ));
        }
        if self.planner.max_lookback_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_lookback_depth must be at least 1".to_string(),
            ));
        }
        for (i, steps) in self.machine.steps_per_mm.iter().enumerate() {
            if *steps <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "steps_per_mm[{}] must be positive",
                    i
                )));
            }
        }
        match self.machine.kinematics.as_str() {
            "cartesian" | "corexy" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "unknown kinematics model: {}",
                other
            ))),
        }
    }
}
