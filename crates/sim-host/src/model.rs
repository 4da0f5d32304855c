//! Simulation model: platforms moving through a flat world.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_bridge::SimulationModel;

/// Physical domain a platform operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialDomain {
    Air,
    Land,
    Surface,
    Subsurface,
    Space,
}

impl SpatialDomain {
    pub fn all() -> &'static [SpatialDomain] {
        &[
            SpatialDomain::Air,
            SpatialDomain::Land,
            SpatialDomain::Surface,
            SpatialDomain::Subsurface,
            SpatialDomain::Space,
        ]
    }
}

/// Everything needed to create a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    pub side: String,
    pub domain: SpatialDomain,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// A simulated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Unique for the lifetime of the simulation; never reused.
    pub index: usize,
    pub name: String,
    pub side: String,
    pub domain: SpatialDomain,
    /// Metres, world frame.
    pub position: [f64; 3],
    /// Metres per second, world frame.
    pub velocity: [f64; 3],
    /// Simulation time of the last kinematic update.
    pub last_update_time: f64,
    /// A broken platform stays in the scenario but no longer moves.
    pub broken: bool,
}

impl Platform {
    fn from_spec(index: usize, spec: PlatformSpec, sim_time: f64) -> Self {
        Self {
            index,
            name: spec.name,
            side: spec.side,
            domain: spec.domain,
            position: spec.position,
            velocity: spec.velocity,
            last_update_time: sim_time,
            broken: false,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Dead-reckons the platform forward to `sim_time`.
    fn advance_to(&mut self, sim_time: f64) {
        let dt = sim_time - self.last_update_time;
        if dt <= 0.0 {
            return;
        }
        self.last_update_time = sim_time;
        if self.broken {
            return;
        }
        for axis in 0..3 {
            self.position[axis] += self.velocity[axis] * dt;
        }
    }
}

/// Run state of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, not yet initialized.
    Pending,
    Running,
    Paused,
    Complete,
}

/// The simulation state owned by the simulation thread.
///
/// Interfaces read it through their hooks and mutate it only through
/// commands. Platform creation and deletion requested by commands is
/// deferred to the driver so that the matching hooks fire.
#[derive(Debug)]
pub struct Simulation {
    name: String,
    sim_time: f64,
    wall_time: f64,
    end_time: f64,
    clock_rate: f64,
    state: RunState,
    platforms: BTreeMap<usize, Platform>,
    next_index: usize,
    pending_additions: Vec<PlatformSpec>,
    pending_deletions: Vec<usize>,
}

impl SimulationModel for Simulation {
    type Platform = Platform;
}

impl Simulation {
    pub fn new(name: impl Into<String>, end_time: f64) -> Self {
        Self {
            name: name.into(),
            sim_time: 0.0,
            wall_time: 0.0,
            end_time,
            clock_rate: 1.0,
            state: RunState::Pending,
            platforms: BTreeMap::new(),
            next_index: 1,
            pending_additions: Vec::new(),
            pending_deletions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulated seconds since start.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Real seconds since start.
    pub fn wall_time(&self) -> f64 {
        self.wall_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Simulated seconds per wall second.
    pub fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
            tracing::info!("Simulation paused at t={:.2}", self.sim_time);
        }
    }

    pub fn resume(&mut self) {
        if self.state == RunState::Paused {
            self.state = RunState::Running;
            tracing::info!("Simulation resumed at t={:.2}", self.sim_time);
        }
    }

    /// Sets the clock rate. Non-positive or non-finite rates are ignored.
    pub fn set_clock_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.clock_rate = rate;
        } else {
            tracing::warn!("Ignoring invalid clock rate {}", rate);
        }
    }

    pub fn platform(&self, index: usize) -> Option<&Platform> {
        self.platforms.get(&index)
    }

    pub fn platform_by_name(&self, name: &str) -> Option<&Platform> {
        self.platforms.values().find(|p| p.name == name)
    }

    /// Platforms in index order.
    pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.values()
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    /// Marks a platform as broken. Returns false if no such platform exists.
    pub fn break_platform(&mut self, index: usize) -> bool {
        match self.platforms.get_mut(&index) {
            Some(platform) => {
                platform.broken = true;
                platform.velocity = [0.0; 3];
                tracing::info!("Platform '{}' broken at t={:.2}", platform.name, self.sim_time);
                true
            }
            None => false,
        }
    }

    /// Requests a new platform; it joins at the end of the current step.
    pub fn request_add(&mut self, spec: PlatformSpec) {
        self.pending_additions.push(spec);
    }

    /// Requests removal of a platform at the end of the current step.
    pub fn request_delete(&mut self, index: usize) {
        if self.platforms.contains_key(&index) && !self.pending_deletions.contains(&index) {
            self.pending_deletions.push(index);
        }
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    pub(crate) fn insert_platform(&mut self, spec: PlatformSpec) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        let platform = Platform::from_spec(index, spec, self.sim_time);
        self.platforms.insert(index, platform);
        index
    }

    pub(crate) fn remove_platform(&mut self, index: usize) -> Option<Platform> {
        self.platforms.remove(&index)
    }

    pub(crate) fn take_pending_additions(&mut self) -> Vec<PlatformSpec> {
        std::mem::take(&mut self.pending_additions)
    }

    pub(crate) fn take_pending_deletions(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.pending_deletions)
    }

    /// Advances the clocks by `wall_dt` real seconds. Simulated time only
    /// moves while running, and stops at the end time.
    pub(crate) fn advance(&mut self, wall_dt: f64) {
        self.wall_time += wall_dt;
        if self.state != RunState::Running {
            return;
        }
        self.sim_time = (self.sim_time + wall_dt * self.clock_rate).min(self.end_time);
        let now = self.sim_time;
        for platform in self.platforms.values_mut() {
            platform.advance_to(now);
        }
    }

    pub(crate) fn reached_end(&self) -> bool {
        self.sim_time >= self.end_time
    }
}
