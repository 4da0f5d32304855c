//! Integration tests for the simulation host driving bridge interfaces.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sim_bridge::{ClockLane, Interface, InterfaceBase, SimEnvironment, SimEvent, SimInterface};
use sim_host::{HostConfig, Platform, RunState, Simulation, SimulationDriver, SimulationHandle};

#[derive(Debug, Default)]
struct Board {
    names: BTreeMap<usize, String>,
    positions: BTreeMap<usize, [f64; 3]>,
    sim_time: f64,
    finished: bool,
}

struct PlatformJoined(usize, String);
struct PlatformLeft(usize);
struct Positions(f64, BTreeMap<usize, [f64; 3]>);
struct Finished;

impl SimEvent<Board> for PlatformJoined {
    fn process(self: Box<Self>, board: &mut Board) {
        board.names.insert(self.0, self.1);
    }
}

impl SimEvent<Board> for PlatformLeft {
    fn process(self: Box<Self>, board: &mut Board) {
        board.names.remove(&self.0);
        board.positions.remove(&self.0);
    }
}

impl SimEvent<Board> for Positions {
    fn is_recurring(&self) -> bool {
        true
    }

    fn process(self: Box<Self>, board: &mut Board) {
        board.sim_time = self.0;
        board.positions = self.1;
    }
}

impl SimEvent<Board> for Finished {
    fn process(self: Box<Self>, board: &mut Board) {
        board.finished = true;
    }
}

struct Tracker {
    inner: SimInterface<Simulation, Board>,
}

impl Tracker {
    fn new() -> Arc<Self> {
        let tracker = Arc::new(Self {
            inner: SimInterface::new("tracker"),
        });
        tracker.set_enabled(true);
        tracker
    }
}

impl Interface<Simulation> for Tracker {
    fn base(&self) -> &InterfaceBase<Simulation> {
        self.inner.base()
    }

    fn on_platform_added(&self, _sim_time: f64, platform: &Platform) {
        if !self.is_enabled() {
            return;
        }
        self.inner
            .add_event(PlatformJoined(platform.index, platform.name.clone()));
    }

    fn on_platform_deleted(&self, _sim_time: f64, platform: &Platform) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(PlatformLeft(platform.index));
    }

    fn on_simulation_complete(&self, _sim: &Simulation) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(Finished);
    }

    fn on_wall_clock_tick(&self, sim: &Simulation) {
        let positions = sim.platforms().map(|p| (p.index, p.position)).collect();
        self.inner.add_event(Positions(sim.sim_time(), positions));
    }
}

/// Config file on disk drives the scenario.
#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[clock]
wall_clock_interval = 0.2

[scenario]
name = "from-file"
platform_count = 4
"#
    )
    .unwrap();

    let config = HostConfig::from_file(file.path()).unwrap();
    assert_eq!(config.scenario.name, "from-file");
    assert_eq!(config.clock.wall_clock_interval, 0.2);

    let env = Arc::new(SimEnvironment::new());
    let mut driver = SimulationDriver::new(&config, env);
    driver.initialize();
    assert_eq!(driver.simulation().name(), "from-file");
    assert_eq!(driver.simulation().platform_count(), 4);
}

/// Missing file surfaces an IO error.
#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = HostConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().starts_with("IO error"));
}

/// A UI-side board mirrors the simulation through events only.
#[test]
fn test_board_mirrors_simulation() {
    let env: Arc<SimEnvironment<Simulation>> = Arc::new(SimEnvironment::new());
    let tracker = Tracker::new();
    let id = env.attach(tracker.clone());

    let mut config = HostConfig::default();
    config.scenario.platform_count = 5;
    config.scenario.end_time = 10.0;
    let mut driver = SimulationDriver::new(&config, Arc::clone(&env));

    let mut board = Board::default();
    for _ in 0..30 {
        driver.step(0.1);
    }
    // 30 wall ticks of position updates collapse into one.
    assert_eq!(tracker.inner.pending_events(), 6);
    tracker.inner.process_events(&mut board);
    assert_eq!(board.names.len(), 5);
    assert_eq!(board.positions.len(), 5);
    assert!((board.sim_time - 3.0).abs() < 1e-6);

    tracker
        .inner
        .add_command(ClockLane::WallClock, |sim: &mut Simulation| sim.request_delete(3));
    driver.step(0.1);
    tracker.inner.process_events(&mut board);
    assert!(!board.names.contains_key(&3));

    while !driver.step(1.0).completed {}
    tracker.inner.process_events(&mut board);
    assert!(board.finished);
    assert!(board.names.is_empty());

    drop(driver);
    let owned = env.teardown(id, tracker);
    assert_eq!(owned.inner.pending_events(), 0);
}

/// The UI thread pauses a simulation running on its own thread.
#[test]
fn test_pause_across_threads() {
    let env: Arc<SimEnvironment<Simulation>> = Arc::new(SimEnvironment::new());
    let tracker = Tracker::new();
    let id = env.attach(tracker.clone());

    let mut config = HostConfig::default();
    config.clock.time_step = 0.002;
    config.clock.wall_clock_interval = 0.005;
    config.clock.clock_rate = 10.0;
    config.scenario.end_time = 1.0e6;
    let handle = SimulationHandle::spawn(config, Arc::clone(&env)).unwrap();

    let mut board = Board::default();
    let deadline = Instant::now() + Duration::from_secs(10);
    while board.names.len() < 8 && Instant::now() < deadline {
        tracker.inner.process_events(&mut board);
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(board.names.len(), 8);

    tracker
        .inner
        .add_command(ClockLane::WallClock, |sim: &mut Simulation| sim.pause());
    while tracker.base().pending_commands(ClockLane::WallClock) > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }

    let sim = handle.join().unwrap();
    assert_eq!(sim.state(), RunState::Paused);

    let owned = env.teardown(id, tracker);
    assert_eq!(owned.name(), "tracker");
}
