//! Headless viewer: a Bevy app on the UI thread that mirrors the simulation
//! through bridge interfaces.

pub mod bridge;
pub mod config;
pub mod platform_data;
pub mod platform_tracker;
pub mod plugin;
pub mod sim_controller;

pub use bridge::{BridgePlugin, SimBridge};
pub use config::VizConfig;
pub use plugin::{RunLimits, SimVizPlugin};
