//! Simulation host for the bridge.
//!
//! A small platform simulation with two clock lanes, driven in real time on
//! its own thread. Interfaces attached to the shared
//! [`sim_bridge::SimEnvironment`] receive its callbacks.
//!
//! # Modules
//!
//! - [`model`]: platforms and the simulation state
//! - [`clock`]: clock lane scheduling and adjustable intervals
//! - [`scenario`]: seeded initial platform layout
//! - [`driver`]: lifecycle and stepping, testable without threads
//! - [`runner`]: the simulation thread
//! - [`config`]: TOML configuration

pub mod clock;
pub mod config;
pub mod driver;
pub mod model;
pub mod runner;
pub mod scenario;

pub use clock::{ClockIntervals, ClockSchedule, Intervals};
pub use config::{ClockConfig, ConfigError, HostConfig, ScenarioConfig};
pub use driver::{SimulationDriver, StepReport};
pub use model::{Platform, PlatformSpec, RunState, Simulation, SpatialDomain};
pub use runner::SimulationHandle;
