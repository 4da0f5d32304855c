//! Simulation controls and clock status.
//!
//! Pause, resume, clock-rate changes and platform breaks travel to the
//! simulation as wall-clock commands, since the sim-clock lane stops while
//! paused. Clock
//! status comes back as one recurring update per wall-clock tick; state
//! changes are logged as discrete events.

use std::sync::{Arc, Weak};

use bevy::core::FrameCount;
use bevy::prelude::*;
use serde::Serialize;
use sim_bridge::{ClockLane, Interface, InterfaceBase, SimEvent, SimInterface};
use sim_host::{RunState, Simulation};

use crate::bridge::{Attached, ShutdownSet, SimBridge};
use crate::config::{ControlAction, VizConfig};

pub struct SimControllerPlugin;

impl Plugin for SimControllerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimStatus>()
            .add_event::<SimControl>()
            .add_systems(Startup, attach_sim_controller)
            .add_systems(
                Update,
                (send_scripted_controls, apply_sim_controls, process_sim_status_events).chain(),
            )
            .add_systems(
                Last,
                teardown_sim_controller
                    .in_set(ShutdownSet::Teardown)
                    .run_if(on_event::<AppExit>()),
            );
    }
}

/// Request to control the simulation.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SimControl(pub ControlAction);

/// A run state change observed by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub sim_time: f64,
    pub state: RunState,
}

/// UI-side clock status.
#[derive(Resource, Debug, Clone, PartialEq, Serialize)]
pub struct SimStatus {
    pub scenario: String,
    pub sim_time: f64,
    pub wall_time: f64,
    pub end_time: f64,
    pub clock_rate: f64,
    pub state: RunState,
    pub history: Vec<StateChange>,
}

impl Default for SimStatus {
    fn default() -> Self {
        Self {
            scenario: String::new(),
            sim_time: 0.0,
            wall_time: 0.0,
            end_time: 0.0,
            clock_rate: 1.0,
            state: RunState::Pending,
            history: Vec::new(),
        }
    }
}

impl SimStatus {
    /// Fraction of the scenario elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.end_time <= 0.0 {
            return 0.0;
        }
        (self.sim_time / self.end_time).clamp(0.0, 1.0)
    }

    fn record(&mut self, sim_time: f64, state: RunState) {
        self.sim_time = self.sim_time.max(sim_time);
        self.state = state;
        self.history.push(StateChange { sim_time, state });
    }
}

/// Clock readings; recurring.
struct ClockUpdate {
    sim_time: f64,
    wall_time: f64,
    clock_rate: f64,
    state: RunState,
}

impl SimEvent<SimStatus> for ClockUpdate {
    fn is_recurring(&self) -> bool {
        true
    }

    fn process(self: Box<Self>, status: &mut SimStatus) {
        status.sim_time = self.sim_time;
        status.wall_time = self.wall_time;
        status.clock_rate = self.clock_rate;
        status.state = self.state;
    }
}

struct Started {
    scenario: String,
    end_time: f64,
    state: RunState,
}

impl SimEvent<SimStatus> for Started {
    fn process(self: Box<Self>, status: &mut SimStatus) {
        status.scenario = self.scenario;
        status.end_time = self.end_time;
        status.record(0.0, self.state);
    }
}

struct StateChanged(StateChange);

impl SimEvent<SimStatus> for StateChanged {
    fn process(self: Box<Self>, status: &mut SimStatus) {
        status.record(self.0.sim_time, self.0.state);
    }
}

/// Interface issuing controls and reporting clock status.
pub struct SimControllerInterface {
    inner: SimInterface<Simulation, SimStatus>,
    this: Weak<SimControllerInterface>,
}

impl SimControllerInterface {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            inner: SimInterface::new("sim_controller"),
            this: this.clone(),
        })
    }

    /// Queues `action` for the next wall-clock tick.
    pub fn send(&self, action: ControlAction) {
        let this = self.this.clone();
        self.inner
            .add_command(ClockLane::WallClock, move |sim: &mut Simulation| {
                let before = sim.state();
                match action {
                    ControlAction::Pause => sim.pause(),
                    ControlAction::Resume => sim.resume(),
                    ControlAction::ClockRate(rate) => sim.set_clock_rate(rate),
                    ControlAction::Break(name) => {
                        let index = sim.platform_by_name(&name).map(|p| p.index);
                        if !index.is_some_and(|index| sim.break_platform(index)) {
                            tracing::warn!("Cannot break unknown platform '{}'", name);
                        }
                    }
                }
                if sim.state() == before {
                    return;
                }
                if let Some(controller) = this.upgrade() {
                    if controller.is_enabled() {
                        controller.inner.add_event(StateChanged(StateChange {
                            sim_time: sim.sim_time(),
                            state: sim.state(),
                        }));
                    }
                }
            });
    }

    pub fn process_events(&self, status: &mut SimStatus) -> usize {
        self.inner.process_events(status)
    }

    pub fn pending_commands(&self) -> usize {
        self.inner.base().pending_commands(ClockLane::WallClock)
    }
}

impl Interface<Simulation> for SimControllerInterface {
    fn base(&self) -> &InterfaceBase<Simulation> {
        self.inner.base()
    }

    fn on_simulation_starting(&self, sim: &Simulation) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(Started {
            scenario: sim.name().to_string(),
            end_time: sim.end_time(),
            state: sim.state(),
        });
    }

    fn on_simulation_complete(&self, sim: &Simulation) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(StateChanged(StateChange {
            sim_time: sim.sim_time(),
            state: RunState::Complete,
        }));
    }

    fn on_wall_clock_tick(&self, sim: &Simulation) {
        self.inner.add_event(ClockUpdate {
            sim_time: sim.sim_time(),
            wall_time: sim.wall_time(),
            clock_rate: sim.clock_rate(),
            state: sim.state(),
        });
    }
}

#[derive(Resource)]
pub struct SimController(Option<Attached<SimControllerInterface>>);

fn attach_sim_controller(mut commands: Commands, bridge: Res<SimBridge>, config: Res<VizConfig>) {
    let controller = bridge.attach(SimControllerInterface::new());
    controller.set_enabled(config.plugins.sim_controller);
    commands.insert_resource(SimController(Some(controller)));
}

fn send_scripted_controls(
    frame: Res<FrameCount>,
    config: Res<VizConfig>,
    mut controls: EventWriter<SimControl>,
) {
    for scripted in config.script.iter().filter(|s| s.frame == frame.0) {
        tracing::info!("Frame {}: {:?}", frame.0, scripted.action);
        controls.send(SimControl(scripted.action.clone()));
    }
}

fn apply_sim_controls(
    mut controls: EventReader<SimControl>,
    controller: Option<Res<SimController>>,
) {
    let Some(attached) = controller.as_ref().and_then(|c| c.0.as_ref()) else {
        controls.clear();
        return;
    };
    for SimControl(action) in controls.read() {
        attached.send(action.clone());
    }
}

fn process_sim_status_events(
    controller: Option<Res<SimController>>,
    mut status: ResMut<SimStatus>,
) {
    if let Some(attached) = controller.as_ref().and_then(|c| c.0.as_ref()) {
        attached.process_events(&mut status);
    }
}

fn teardown_sim_controller(
    bridge: Res<SimBridge>,
    controller: Option<ResMut<SimController>>,
    mut status: ResMut<SimStatus>,
) {
    let Some(attached) = controller.and_then(|mut c| c.0.take()) else {
        return;
    };
    attached.process_events(&mut status);
    let unsent = attached.pending_commands();
    attached.teardown(bridge.env());
    if unsent > 0 {
        tracing::warn!("Sim controller torn down with {} unsent controls", unsent);
    }
    tracing::info!(
        "Final status: t={:.2} ({:?}, {:.0}%)",
        status.sim_time,
        status.state,
        status.progress() * 100.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_bridge::SimEnvironment;
    use sim_host::{HostConfig, SimulationDriver};

    fn setup(end_time: f64) -> (Arc<SimControllerInterface>, SimulationDriver) {
        let env: Arc<SimEnvironment<Simulation>> = Arc::new(SimEnvironment::new());
        let controller = SimControllerInterface::new();
        env.attach(controller.clone());
        controller.set_enabled(true);

        let mut config = HostConfig::default();
        config.scenario.platform_count = 0;
        config.scenario.end_time = end_time;
        (controller, SimulationDriver::new(&config, env))
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let (controller, mut driver) = setup(100.0);
        let mut status = SimStatus::default();

        driver.step(0.1);
        controller.send(ControlAction::Pause);
        driver.step(0.1);
        controller.process_events(&mut status);
        assert_eq!(status.state, RunState::Paused);
        let paused_at = status.sim_time;

        for _ in 0..10 {
            driver.step(0.1);
        }
        controller.send(ControlAction::Resume);
        driver.step(0.1);
        controller.process_events(&mut status);
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.sim_time, paused_at);

        let states: Vec<_> = status.history.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![RunState::Running, RunState::Paused, RunState::Running]
        );
        assert_eq!(status.scenario, "demo");
    }

    #[test]
    fn test_clock_rate_applies() {
        let (controller, mut driver) = setup(100.0);
        driver.step(0.1);
        controller.send(ControlAction::ClockRate(10.0));
        driver.step(0.1);
        let before = driver.simulation().sim_time();
        driver.step(0.1);
        assert!((driver.simulation().sim_time() - before - 1.0).abs() < 1e-9);

        let mut status = SimStatus::default();
        controller.process_events(&mut status);
        assert_eq!(status.clock_rate, 10.0);
        // A rate change is not a state change.
        assert_eq!(status.history.len(), 1);
    }

    #[test]
    fn test_break_platform_control() {
        let env: Arc<SimEnvironment<Simulation>> = Arc::new(SimEnvironment::new());
        let controller = SimControllerInterface::new();
        env.attach(controller.clone());
        controller.set_enabled(true);

        let mut config = HostConfig::default();
        config.scenario.platform_count = 2;
        let mut driver = SimulationDriver::new(&config, env);
        driver.initialize();

        controller.send(ControlAction::Break("red-002".to_string()));
        controller.send(ControlAction::Break("green-009".to_string()));
        driver.step(0.1);
        assert_eq!(controller.pending_commands(), 0);

        let sim = driver.simulation();
        let broken = sim.platform_by_name("red-002").unwrap();
        assert!(broken.broken);
        assert_eq!(broken.speed(), 0.0);
        assert!(!sim.platform_by_name("blue-001").unwrap().broken);

        let position = broken.position;
        driver.step(0.5);
        assert_eq!(driver.simulation().platform_by_name("red-002").unwrap().position, position);

        // Breaking is not a run state change.
        let mut status = SimStatus::default();
        controller.process_events(&mut status);
        assert_eq!(status.history.len(), 1);
    }

    #[test]
    fn test_completion_recorded() {
        let (controller, mut driver) = setup(1.0);
        while !driver.step(0.25).completed {}

        let mut status = SimStatus::default();
        controller.process_events(&mut status);
        assert_eq!(status.state, RunState::Complete);
        assert_eq!(status.progress(), 1.0);
        assert_eq!(status.history.last().map(|c| c.state), Some(RunState::Complete));
    }

    #[test]
    fn test_queued_controls_do_not_block_teardown() {
        let env: SimEnvironment<Simulation> = SimEnvironment::new();
        let controller = SimControllerInterface::new();
        let id = env.attach(controller.clone());
        controller.send(ControlAction::Pause);
        assert_eq!(controller.pending_commands(), 1);

        let owned = env.teardown(id, controller);
        assert_eq!(owned.pending_commands(), 1);
    }
}
