//! Interface lifecycle and the typed façade plugins build on.
//!
//! # Threading contract
//!
//! Every `on_*` hook of [`Interface`] runs synchronously on the simulation
//! thread. [`Interface::set_enabled`] belongs to the UI thread. While an
//! interface is disabled the environment skips its periodic clock hooks; the
//! other hooks still run, and each implementation must check
//! [`InterfaceBase::is_enabled`] at entry and return early when disabled.
//! The interface cannot enforce that check on its own.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::command::{ClockLane, CommandChannel, SimCommand};
use crate::event::{EventQueue, SimEvent};
use crate::snapshot::SharedState;
use crate::thread_role;

/// The simulation engine as seen by interfaces.
pub trait SimulationModel: 'static {
    /// Platform reference handed to the platform hooks.
    type Platform;
}

/// State every interface owns: its name, the enabled flag and the inbound
/// command queues.
pub struct InterfaceBase<S: ?Sized> {
    name: String,
    enabled: AtomicBool,
    commands: CommandChannel<S>,
}

impl<S: ?Sized> InterfaceBase<S> {
    /// Creates a disabled interface base.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(false),
            commands: CommandChannel::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomic read of the enabled flag.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Stores the flag and returns the previous value.
    fn store_enabled(&self, enabled: bool) -> bool {
        debug_assert!(
            !thread_role::is_simulation_thread(),
            "set_enabled on interface '{}' called from the simulation thread",
            self.name
        );
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// Queues a command for the next tick of `lane`.
    pub fn add_command<C>(&self, lane: ClockLane, command: C)
    where
        C: SimCommand<S> + 'static,
    {
        self.commands.enqueue(lane, Box::new(command));
    }

    /// Runs the commands queued on `lane`. Simulation thread only.
    pub fn execute_commands(&self, lane: ClockLane, sim: &mut S) -> usize {
        self.commands.drain_and_execute(lane, sim)
    }

    pub fn pending_commands(&self, lane: ClockLane) -> usize {
        self.commands.len(lane)
    }
}

/// Hooks the simulation environment invokes on a registered interface.
///
/// All hooks default to no-ops.
pub trait Interface<S: SimulationModel>: Send + Sync {
    fn base(&self) -> &InterfaceBase<S>;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    /// Enables or disables the interface. UI thread only.
    ///
    /// Calls [`Interface::on_enabled_changed`] every time, even when the
    /// state does not change.
    fn set_enabled(&self, enabled: bool) {
        let previous = self.base().store_enabled(enabled);
        if previous != enabled {
            tracing::debug!(
                "Interface '{}' {}",
                self.name(),
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.on_enabled_changed(enabled);
    }

    /// Runs on the thread that called `set_enabled`.
    fn on_enabled_changed(&self, _enabled: bool) {}

    /// A platform joined the scenario. Initial platforms arrive after
    /// `on_simulation_initializing` and before `on_simulation_starting`.
    fn on_platform_added(&self, _sim_time: f64, _platform: &S::Platform) {}

    /// A platform finished initializing; always after `on_platform_added`.
    fn on_platform_initialized(&self, _sim_time: f64, _platform: &S::Platform) {}

    /// A platform left the scenario.
    fn on_platform_deleted(&self, _sim_time: f64, _platform: &S::Platform) {}

    fn on_simulation_initializing(&self, _sim: &S) {}

    fn on_simulation_starting(&self, _sim: &S) {}

    /// Not called when the simulation is stopped early.
    fn on_simulation_complete(&self, _sim: &S) {}

    /// Periodic real-time hook. Skipped while disabled.
    fn on_wall_clock_tick(&self, _sim: &S) {}

    /// Periodic simulated-time hook. Skipped while disabled.
    fn on_sim_clock_tick(&self, _sim: &S) {}
}

/// Typed façade binding one event context type to an interface.
///
/// `S` is the simulation, `Ctx` the UI-side state events apply to, and `T`
/// the interface's mutex-guarded scratch state.
pub struct SimInterface<S: ?Sized, Ctx: ?Sized + 'static, T = ()> {
    base: InterfaceBase<S>,
    events: EventQueue<Box<dyn SimEvent<Ctx>>>,
    shared: SharedState<T>,
}

impl<S: ?Sized, Ctx: ?Sized + 'static, T: Default> SimInterface<S, Ctx, T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(name, T::default())
    }
}

impl<S: ?Sized, Ctx: ?Sized + 'static, T> SimInterface<S, Ctx, T> {
    pub fn with_state(name: impl Into<String>, state: T) -> Self {
        Self {
            base: InterfaceBase::new(name),
            events: EventQueue::new(),
            shared: SharedState::new(state),
        }
    }

    pub fn base(&self) -> &InterfaceBase<S> {
        &self.base
    }

    pub fn is_enabled(&self) -> bool {
        self.base.is_enabled()
    }

    /// Queues an event for the UI. Simulation thread.
    pub fn add_event<E>(&self, event: E)
    where
        E: SimEvent<Ctx> + 'static,
    {
        self.events.push(Box::new(event));
    }

    /// Drains queued events and applies each to `ctx` in order. UI thread,
    /// once per frame. Returns the number of events processed.
    pub fn process_events(&self, ctx: &mut Ctx) -> usize {
        let events = self.events.pop_all();
        let count = events.len();
        for event in events {
            event.process(ctx);
        }
        count
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn add_command<C>(&self, lane: ClockLane, command: C)
    where
        C: SimCommand<S> + 'static,
    {
        self.base.add_command(lane, command);
    }

    pub fn shared(&self) -> &SharedState<T> {
        &self.shared
    }

    /// Takes back the scratch state at teardown.
    pub fn into_shared(self) -> T {
        self.shared.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Model;

    impl SimulationModel for Model {
        type Platform = u32;
    }

    #[derive(Default)]
    struct Display {
        seen: Vec<u32>,
    }

    struct Seen(u32);

    impl SimEvent<Display> for Seen {
        fn process(self: Box<Self>, display: &mut Display) {
            display.seen.push(self.0);
        }
    }

    struct Probe {
        inner: SimInterface<Model, Display>,
        toggles: Mutex<Vec<bool>>,
        hook_calls: AtomicUsize,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                inner: SimInterface::new("probe"),
                toggles: Mutex::new(Vec::new()),
                hook_calls: AtomicUsize::new(0),
            }
        }
    }

    impl Interface<Model> for Probe {
        fn base(&self) -> &InterfaceBase<Model> {
            self.inner.base()
        }

        fn on_enabled_changed(&self, enabled: bool) {
            self.toggles.lock().unwrap().push(enabled);
        }

        fn on_platform_added(&self, _sim_time: f64, platform: &u32) {
            if !self.is_enabled() {
                return;
            }
            self.hook_calls.fetch_add(1, Ordering::Relaxed);
            self.inner.add_event(Seen(*platform));
        }
    }

    #[test]
    fn test_starts_disabled() {
        let probe = Probe::new();
        assert!(!probe.is_enabled());
        assert_eq!(probe.name(), "probe");
    }

    #[test]
    fn test_hook_fires_on_every_set() {
        let probe = Probe::new();
        probe.set_enabled(true);
        probe.set_enabled(true);
        probe.set_enabled(false);
        assert!(!probe.is_enabled());
        assert_eq!(*probe.toggles.lock().unwrap(), vec![true, true, false]);
    }

    #[test]
    fn test_disabled_hook_produces_nothing() {
        let probe = Probe::new();
        for platform in 0..10 {
            probe.on_platform_added(0.0, &platform);
        }
        assert_eq!(probe.inner.pending_events(), 0);
        assert_eq!(probe.hook_calls.load(Ordering::Relaxed), 0);

        probe.set_enabled(true);
        probe.on_platform_added(1.0, &42);
        let mut display = Display::default();
        assert_eq!(probe.inner.process_events(&mut display), 1);
        assert_eq!(display.seen, vec![42]);
    }

    #[test]
    fn test_disabling_keeps_queued_events() {
        let probe = Probe::new();
        probe.set_enabled(true);
        probe.on_platform_added(0.0, &1);
        probe.on_platform_added(0.0, &2);
        probe.set_enabled(false);
        probe.on_platform_added(0.0, &3);

        let mut display = Display::default();
        probe.inner.process_events(&mut display);
        assert_eq!(display.seen, vec![1, 2]);
    }

    #[test]
    fn test_commands_run_against_model() {
        let iface: SimInterface<Vec<u32>, Display> = SimInterface::new("cmd");
        iface.add_command(ClockLane::WallClock, |sim: &mut Vec<u32>| sim.push(5));
        assert_eq!(iface.base().pending_commands(ClockLane::WallClock), 1);

        let mut sim = Vec::new();
        assert_eq!(iface.base().execute_commands(ClockLane::SimClock, &mut sim), 0);
        assert_eq!(iface.base().execute_commands(ClockLane::WallClock, &mut sim), 1);
        assert_eq!(sim, vec![5]);
    }

    #[test]
    fn test_into_shared_returns_state() {
        let iface: SimInterface<Model, Display, Vec<u32>> =
            SimInterface::with_state("state", vec![1]);
        iface.shared().lock().push(2);
        assert_eq!(iface.into_shared(), vec![1, 2]);
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_set_enabled_from_simulation_thread_asserts() {
        let probe = std::sync::Arc::new(Probe::new());
        let remote = std::sync::Arc::clone(&probe);
        let result = std::thread::spawn(move || {
            thread_role::mark_simulation_thread();
            remote.set_enabled(true);
        })
        .join();

        assert!(result.is_err());
        assert!(!probe.is_enabled());
        assert!(probe.toggles.lock().unwrap().is_empty());
    }
}
