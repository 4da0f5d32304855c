//! Simulation environment: the registry that routes engine callbacks to the
//! attached interfaces.
//!
//! The environment is passed explicitly to whoever drives the simulation;
//! there is no process-wide instance.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::command::ClockLane;
use crate::interface::{Interface, SimulationModel};

/// Identifies an attached interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId(Uuid);

impl InterfaceId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work done by one clock tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Interfaces whose periodic hook ran.
    pub hooks_run: usize,
    /// Interfaces skipped because they were disabled.
    pub hooks_skipped: usize,
    pub commands_executed: usize,
}

type Entry<S> = (InterfaceId, Arc<dyn Interface<S>>);

/// Registry of interfaces subscribed to simulation callbacks.
///
/// Dispatch holds the registry's read lock for the whole callback pass, and
/// [`SimEnvironment::detach`] takes the write lock. Once `detach` returns, no
/// callback into the detached interface is running or can start. Hooks must
/// therefore never attach or detach interfaces themselves.
pub struct SimEnvironment<S: SimulationModel> {
    interfaces: RwLock<Vec<Entry<S>>>,
}

impl<S: SimulationModel> Default for SimEnvironment<S> {
    fn default() -> Self {
        Self {
            interfaces: RwLock::new(Vec::new()),
        }
    }
}

impl<S: SimulationModel> SimEnvironment<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `interface` to all simulation callbacks.
    pub fn attach(&self, interface: Arc<dyn Interface<S>>) -> InterfaceId {
        let id = InterfaceId::generate();
        tracing::info!("Attached interface '{}' ({})", interface.name(), id);
        self.write().push((id, interface));
        id
    }

    /// Unsubscribes the interface, returning the registry's reference.
    pub fn detach(&self, id: InterfaceId) -> Option<Arc<dyn Interface<S>>> {
        let mut interfaces = self.write();
        let position = interfaces.iter().position(|(entry_id, _)| *entry_id == id)?;
        let (_, interface) = interfaces.remove(position);
        tracing::info!("Detached interface '{}' ({})", interface.name(), id);
        Some(interface)
    }

    /// Detaches the interface and takes sole ownership of it.
    ///
    /// # Panics
    ///
    /// Panics if any other reference to the interface is still alive, such
    /// as a queued command holding a strong reference. Tearing down a shared
    /// interface would let another thread observe it mid-destruction.
    pub fn teardown<I>(&self, id: InterfaceId, interface: Arc<I>) -> I
    where
        I: Interface<S> + 'static,
    {
        drop(self.detach(id));
        match Arc::try_unwrap(interface) {
            Ok(owned) => owned,
            Err(shared) => panic!(
                "interface '{}' torn down while {} other references are alive",
                shared.name(),
                Arc::strong_count(&shared) - 1
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn platform_added(&self, sim_time: f64, platform: &S::Platform) {
        for (_, interface) in self.read().iter() {
            interface.on_platform_added(sim_time, platform);
        }
    }

    pub fn platform_initialized(&self, sim_time: f64, platform: &S::Platform) {
        for (_, interface) in self.read().iter() {
            interface.on_platform_initialized(sim_time, platform);
        }
    }

    pub fn platform_deleted(&self, sim_time: f64, platform: &S::Platform) {
        for (_, interface) in self.read().iter() {
            interface.on_platform_deleted(sim_time, platform);
        }
    }

    pub fn simulation_initializing(&self, sim: &S) {
        for (_, interface) in self.read().iter() {
            interface.on_simulation_initializing(sim);
        }
    }

    pub fn simulation_starting(&self, sim: &S) {
        for (_, interface) in self.read().iter() {
            interface.on_simulation_starting(sim);
        }
    }

    pub fn simulation_complete(&self, sim: &S) {
        for (_, interface) in self.read().iter() {
            interface.on_simulation_complete(sim);
        }
    }

    /// Fires one tick of `lane`.
    ///
    /// Enabled interfaces first read the simulation through their periodic
    /// hook; then every interface's queued commands for the lane execute.
    /// Commands drain even while an interface is disabled.
    pub fn clock_tick(&self, lane: ClockLane, sim: &mut S) -> TickReport {
        let interfaces = self.read();
        let mut report = TickReport::default();

        for (_, interface) in interfaces.iter() {
            if !interface.is_enabled() {
                report.hooks_skipped += 1;
                continue;
            }
            match lane {
                ClockLane::WallClock => interface.on_wall_clock_tick(sim),
                ClockLane::SimClock => interface.on_sim_clock_tick(sim),
            }
            report.hooks_run += 1;
        }

        for (_, interface) in interfaces.iter() {
            report.commands_executed += interface.base().execute_commands(lane, sim);
        }

        if report.commands_executed > 0 {
            tracing::debug!(
                "{} tick executed {} commands",
                lane,
                report.commands_executed
            );
        }
        report
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry<S>>> {
        self.interfaces.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry<S>>> {
        self.interfaces.write().unwrap_or_else(PoisonError::into_inner)
    }
}
