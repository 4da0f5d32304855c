//! Bridge plugin: owns the simulation environment and the simulation thread.
//!
//! Interface plugins attach during `Startup`; the simulation thread starts in
//! `PostStartup` so every interface sees the start-up lifecycle. On
//! [`AppExit`] the thread is stopped and joined before the interfaces are
//! torn down.

use std::ops::Deref;
use std::sync::Arc;

use bevy::prelude::*;
use sim_bridge::{Interface, InterfaceId, SimEnvironment};
use sim_host::{ClockIntervals, ConfigError, HostConfig, Simulation, SimulationHandle};

use crate::config::VizConfig;

/// Plugin wiring the simulation thread into the app.
pub struct BridgePlugin;

impl Plugin for BridgePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<VizConfig>() {
            app.init_resource::<VizConfig>();
        }

        app.init_resource::<SimBridge>()
            .configure_sets(
                Last,
                (
                    ShutdownSet::StopSimulation,
                    ShutdownSet::Teardown,
                    ShutdownSet::Report,
                )
                    .chain(),
            )
            .add_systems(PostStartup, start_simulation)
            .add_systems(
                Last,
                stop_simulation
                    .in_set(ShutdownSet::StopSimulation)
                    .run_if(on_event::<AppExit>()),
            );
    }
}

/// Ordering of the exit path.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSet {
    /// Stop and join the simulation thread.
    StopSimulation,
    /// Drain remaining events and tear interfaces down.
    Teardown,
    /// Report the final display state.
    Report,
}

/// The simulation environment shared with the simulation thread.
#[derive(Resource, Default)]
pub struct SimBridge {
    env: Arc<SimEnvironment<Simulation>>,
    handle: Option<SimulationHandle>,
}

impl SimBridge {
    pub fn env(&self) -> &SimEnvironment<Simulation> {
        &self.env
    }

    /// Attaches an interface to the environment.
    pub fn attach<I>(&self, interface: Arc<I>) -> Attached<I>
    where
        I: Interface<Simulation> + 'static,
    {
        let id = self.env.attach(interface.clone());
        Attached { id, interface }
    }

    /// Starts the simulation thread. Does nothing if one is already running.
    pub fn start(&mut self, config: HostConfig) -> Result<(), ConfigError> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.handle = Some(SimulationHandle::spawn(config, Arc::clone(&self.env))?);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// True once a started simulation thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_some_and(SimulationHandle::is_finished)
    }

    /// Clock intervals of the running simulation.
    pub fn intervals(&self) -> Option<&ClockIntervals> {
        self.handle.as_ref().map(SimulationHandle::intervals)
    }

    /// Stops and joins the simulation thread, returning its final state.
    pub fn stop(&mut self) -> Option<Simulation> {
        self.handle.take()?.join()
    }
}

/// An interface attached to the environment.
pub struct Attached<I> {
    id: InterfaceId,
    interface: Arc<I>,
}

impl<I> Deref for Attached<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.interface
    }
}

impl<I: Interface<Simulation> + 'static> Attached<I> {
    pub fn id(&self) -> InterfaceId {
        self.id
    }

    /// Detaches the interface and takes it back.
    ///
    /// # Panics
    ///
    /// Panics if the interface is still referenced elsewhere.
    pub fn teardown(self, env: &SimEnvironment<Simulation>) -> I {
        env.teardown(self.id, self.interface)
    }
}

fn start_simulation(mut bridge: ResMut<SimBridge>, config: Res<VizConfig>) {
    let host = config.host.clone();
    let name = host.scenario.name.clone();
    match bridge.start(host) {
        Ok(()) => tracing::info!(
            "Simulation '{}' started with {} interfaces",
            name,
            bridge.env().len()
        ),
        Err(e) => tracing::error!("Failed to start simulation: {}", e),
    }
}

fn stop_simulation(mut bridge: ResMut<SimBridge>) {
    match bridge.stop() {
        Some(sim) => tracing::info!(
            "Simulation stopped at t={:.2} ({:?}, {} platforms)",
            sim.sim_time(),
            sim.state(),
            sim.platform_count()
        ),
        None => tracing::debug!("No simulation thread to stop"),
    }
}
