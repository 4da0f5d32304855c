//! Host configuration.
//!
//! Clock and scenario settings are loaded from a TOML file. Every section is
//! optional and falls back to its defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{Intervals, DEFAULT_SIM_CLOCK_INTERVAL, DEFAULT_WALL_CLOCK_INTERVAL};

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Clock lanes and pacing
    #[serde(default)]
    pub clock: ClockConfig,
    /// Initial scenario
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl HostConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clock = &self.clock;
        for (field, value) in [
            ("clock.wall_clock_interval", clock.wall_clock_interval),
            ("clock.sim_clock_interval", clock.sim_clock_interval),
            ("clock.time_step", clock.time_step),
            ("clock.clock_rate", clock.clock_rate),
            ("scenario.end_time", self.scenario.end_time),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {}", value),
                });
            }
        }
        if self.scenario.sides.is_empty() {
            return Err(ConfigError::Invalid {
                field: "scenario.sides",
                reason: "at least one side is required".to_string(),
            });
        }
        let extent = self.scenario.extent;
        if !(extent.is_finite() && extent >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "scenario.extent",
                reason: format!("must be a non-negative number, got {}", extent),
            });
        }
        Ok(())
    }
}

/// Clock lane configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Real seconds between wall-clock ticks
    pub wall_clock_interval: f64,
    /// Simulated seconds between sim-clock ticks
    pub sim_clock_interval: f64,
    /// Real seconds per driver step
    pub time_step: f64,
    /// Initial simulated seconds per real second
    pub clock_rate: f64,
    /// Start paused until a resume command arrives
    pub start_paused: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            wall_clock_interval: DEFAULT_WALL_CLOCK_INTERVAL,
            sim_clock_interval: DEFAULT_SIM_CLOCK_INTERVAL,
            time_step: 0.02,
            clock_rate: 1.0,
            start_paused: false,
        }
    }
}

impl ClockConfig {
    pub fn intervals(&self) -> Intervals {
        Intervals {
            wall_clock: self.wall_clock_interval,
            sim_clock: self.sim_clock_interval,
        }
    }
}

/// Scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Scenario name shown in the viewer
    pub name: String,
    /// Seed for the initial platform layout
    pub seed: u64,
    /// Number of initial platforms
    pub platform_count: usize,
    /// Simulated seconds until the scenario completes
    pub end_time: f64,
    /// Sides platforms are spread across, round robin
    pub sides: Vec<String>,
    /// Half-width of the square platforms start in, metres
    pub extent: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "demo".to_string(),
            seed: 42,
            platform_count: 8,
            end_time: 300.0,
            sides: vec!["blue".to_string(), "red".to_string()],
            extent: 50_000.0,
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
