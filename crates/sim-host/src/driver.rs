//! Simulation driver: advances the model and fires environment callbacks.
//!
//! Lifecycle: initializing, initial platforms added and initialized,
//! starting, then stepping until the end time, at which point every platform
//! is deleted and the complete hook fires.
//!
//! The wall-clock lane keeps firing while paused; the sim-clock lane does
//! not, since simulated time stands still. Commands meant to resume a paused
//! simulation therefore belong on the wall-clock lane.

use std::sync::Arc;

use sim_bridge::{ClockLane, SimEnvironment};

use crate::clock::{ClockIntervals, ClockSchedule};
use crate::config::HostConfig;
use crate::model::{PlatformSpec, RunState, Simulation};
use crate::scenario;

/// What one [`SimulationDriver::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub wall_tick: bool,
    pub sim_tick: bool,
    pub commands_executed: usize,
    pub platforms_added: usize,
    pub platforms_deleted: usize,
    /// The simulation is complete; further steps do nothing.
    pub completed: bool,
}

pub struct SimulationDriver {
    sim: Simulation,
    env: Arc<SimEnvironment<Simulation>>,
    schedule: ClockSchedule,
    intervals: Arc<ClockIntervals>,
    initial_platforms: Vec<PlatformSpec>,
    start_paused: bool,
}

impl SimulationDriver {
    pub fn new(config: &HostConfig, env: Arc<SimEnvironment<Simulation>>) -> Self {
        let intervals = Arc::new(ClockIntervals::new(config.clock.intervals()));
        Self::with_intervals(config, env, intervals)
    }

    /// Creates a driver reading its tick intervals from `intervals`, which
    /// may be shared with the UI.
    pub fn with_intervals(
        config: &HostConfig,
        env: Arc<SimEnvironment<Simulation>>,
        intervals: Arc<ClockIntervals>,
    ) -> Self {
        let mut sim = Simulation::new(&config.scenario.name, config.scenario.end_time);
        sim.set_clock_rate(config.clock.clock_rate);
        Self {
            sim,
            env,
            schedule: ClockSchedule::starting_at(0.0, 0.0),
            intervals,
            initial_platforms: scenario::initial_platforms(&config.scenario),
            start_paused: config.clock.start_paused,
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn into_simulation(self) -> Simulation {
        self.sim
    }

    pub fn intervals(&self) -> &Arc<ClockIntervals> {
        &self.intervals
    }

    /// Runs the start-up lifecycle. Does nothing once initialized.
    pub fn initialize(&mut self) {
        if self.sim.state() != RunState::Pending {
            return;
        }
        tracing::info!(
            "Initializing simulation '{}' with {} platforms",
            self.sim.name(),
            self.initial_platforms.len()
        );
        self.env.simulation_initializing(&self.sim);

        for spec in std::mem::take(&mut self.initial_platforms) {
            self.add_platform(spec);
        }

        let state = if self.start_paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        self.sim.set_state(state);
        self.env.simulation_starting(&self.sim);
        tracing::info!("Simulation '{}' started ({:?})", self.sim.name(), state);
    }

    /// Advances by `wall_dt` real seconds and fires any due clock lanes.
    pub fn step(&mut self, wall_dt: f64) -> StepReport {
        let mut report = StepReport::default();
        match self.sim.state() {
            RunState::Pending => self.initialize(),
            RunState::Complete => {
                report.completed = true;
                return report;
            }
            RunState::Running | RunState::Paused => {}
        }

        self.sim.advance(wall_dt.max(0.0));

        let intervals = self.intervals.current();
        for lane in ClockLane::all() {
            let now = match lane {
                ClockLane::WallClock => self.sim.wall_time(),
                ClockLane::SimClock => self.sim.sim_time(),
            };
            if !self.schedule.poll(lane, now, &intervals) {
                continue;
            }
            let tick = self.env.clock_tick(lane, &mut self.sim);
            report.commands_executed += tick.commands_executed;
            match lane {
                ClockLane::WallClock => report.wall_tick = true,
                ClockLane::SimClock => report.sim_tick = true,
            }
        }

        for spec in self.sim.take_pending_additions() {
            self.add_platform(spec);
            report.platforms_added += 1;
        }
        for index in self.sim.take_pending_deletions() {
            if self.delete_platform(index) {
                report.platforms_deleted += 1;
            }
        }

        if self.sim.reached_end() {
            report.platforms_deleted += self.complete();
            report.completed = true;
        }
        report
    }

    fn add_platform(&mut self, spec: PlatformSpec) -> usize {
        let index = self.sim.insert_platform(spec);
        let now = self.sim.sim_time();
        if let Some(platform) = self.sim.platform(index) {
            tracing::debug!("Platform '{}' added at t={:.2}", platform.name, now);
            self.env.platform_added(now, platform);
            self.env.platform_initialized(now, platform);
        }
        index
    }

    fn delete_platform(&mut self, index: usize) -> bool {
        let now = self.sim.sim_time();
        match self.sim.remove_platform(index) {
            Some(platform) => {
                tracing::debug!("Platform '{}' deleted at t={:.2}", platform.name, now);
                self.env.platform_deleted(now, &platform);
                true
            }
            None => false,
        }
    }

    /// Deletes every platform and fires the complete hook.
    fn complete(&mut self) -> usize {
        let indices: Vec<usize> = self.sim.platforms().map(|p| p.index).collect();
        let deleted = indices
            .into_iter()
            .filter(|&index| self.delete_platform(index))
            .count();
        self.sim.set_state(RunState::Complete);
        self.env.simulation_complete(&self.sim);
        tracing::info!(
            "Simulation '{}' complete at t={:.2} (wall {:.2}s)",
            self.sim.name(),
            self.sim.sim_time(),
            self.sim.wall_time()
        );
        deleted
    }
}
