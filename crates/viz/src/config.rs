//! Viewer configuration.
//!
//! The viewer reads the same TOML file as the simulation host: `[clock]` and
//! `[scenario]` configure the simulation, the remaining sections the viewer.

use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use sim_host::{ConfigError, HostConfig};

/// Complete viewer configuration.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VizConfig {
    /// Simulation host settings
    #[serde(flatten)]
    pub host: HostConfig,
    /// Which interfaces start enabled
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,
    /// Simulation controls sent at given frames
    #[serde(default)]
    pub script: Vec<ScriptedControl>,
}

impl VizConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.host.validate()?;
        if !(config.display.deleted_linger.is_finite() && config.display.deleted_linger >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "display.deleted_linger",
                reason: format!(
                    "must be a non-negative number, got {}",
                    config.display.deleted_linger
                ),
            });
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Enabled state of each interface at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub platform_tracker: bool,
    pub platform_data: bool,
    pub sim_controller: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            platform_tracker: true,
            platform_data: true,
            sim_controller: true,
        }
    }
}

/// Display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Simulated seconds a deleted platform stays listed
    pub deleted_linger: f64,
    /// Initial platform of interest
    pub focus: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            deleted_linger: 5.0,
            focus: None,
        }
    }
}

/// A control sent to the simulation when the viewer reaches `frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedControl {
    pub frame: u32,
    pub action: ControlAction,
}

/// Simulation controls the viewer can issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Pause,
    Resume,
    ClockRate(f64),
    /// Break the named platform; it stops moving but stays in the scenario.
    Break(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VizConfig::default();

        assert!(config.plugins.platform_tracker);
        assert!(config.plugins.sim_controller);
        assert_eq!(config.display.deleted_linger, 5.0);
        assert!(config.display.focus.is_none());
        assert!(config.script.is_empty());
    }

    #[test]
    fn test_parse_config_from_toml() {
        let toml = r#"
            [clock]
            clock_rate = 2.0

            [scenario]
            platform_count = 3

            [plugins]
            platform_data = false

            [display]
            focus = "blue-001"

            [[script]]
            frame = 10
            action = "pause"

            [[script]]
            frame = 20
            action = { clock_rate = 4.0 }

            [[script]]
            frame = 30
            action = { break = "red-002" }
        "#;

        let config = VizConfig::from_str(toml).unwrap();

        assert_eq!(config.host.clock.clock_rate, 2.0);
        assert_eq!(config.host.scenario.platform_count, 3);
        assert!(!config.plugins.platform_data);
        assert!(config.plugins.platform_tracker);
        assert_eq!(config.display.focus.as_deref(), Some("blue-001"));
        assert_eq!(config.script[0].action, ControlAction::Pause);
        assert_eq!(config.script[1].action, ControlAction::ClockRate(4.0));
        assert_eq!(
            config.script[2].action,
            ControlAction::Break("red-002".to_string())
        );
    }

    #[test]
    fn test_host_validation_applies() {
        let err = VizConfig::from_str("[clock]\ntime_step = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("clock.time_step"));
    }

    #[test]
    fn test_negative_linger_rejected() {
        let err = VizConfig::from_str("[display]\ndeleted_linger = -2.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "display.deleted_linger",
                ..
            }
        ));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = VizConfig::default();
        config.display.focus = Some("red-002".to_string());
        config.script.push(ScriptedControl {
            frame: 5,
            action: ControlAction::Resume,
        });

        let toml = config.to_toml().unwrap();
        assert_eq!(VizConfig::from_str(&toml).unwrap(), config);
    }
}
