//! Simulation thread that runs independently of the UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sim_bridge::{thread_role, SimEnvironment};

use crate::clock::ClockIntervals;
use crate::config::{ConfigError, HostConfig};
use crate::driver::SimulationDriver;
use crate::model::Simulation;

/// Name given to the simulation thread.
pub const THREAD_NAME: &str = "simulation";

/// Handle for controlling the simulation thread.
///
/// Dropping the handle stops the thread and joins it.
pub struct SimulationHandle {
    /// Thread handle; returns the final simulation state
    thread: Option<JoinHandle<Simulation>>,
    /// Set to ask the loop to exit
    stop: Arc<AtomicBool>,
    /// Tick intervals shared with the driver
    intervals: Arc<ClockIntervals>,
}

impl SimulationHandle {
    /// Spawns the simulation thread. It runs until the scenario completes or
    /// [`SimulationHandle::stop`] is called.
    ///
    /// The configuration is validated before the thread starts.
    pub fn spawn(
        config: HostConfig,
        env: Arc<SimEnvironment<Simulation>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let intervals = Arc::new(ClockIntervals::new(config.clock.intervals()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let intervals = Arc::clone(&intervals);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(THREAD_NAME.to_string())
                .spawn(move || run_simulation(config, env, intervals, stop))?
        };

        Ok(Self {
            thread: Some(thread),
            stop,
            intervals,
        })
    }

    /// Tick intervals; adjustable while running.
    pub fn intervals(&self) -> &ClockIntervals {
        &self.intervals
    }

    /// True once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    /// Asks the thread to exit after its current step.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stops the thread and returns the final simulation state, or `None`
    /// if the thread panicked.
    pub fn join(mut self) -> Option<Simulation> {
        self.stop();
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(sim) => Some(sim),
            Err(_) => {
                tracing::error!("Simulation thread panicked");
                None
            }
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Main simulation loop, paced in real time.
fn run_simulation(
    config: HostConfig,
    env: Arc<SimEnvironment<Simulation>>,
    intervals: Arc<ClockIntervals>,
    stop: Arc<AtomicBool>,
) -> Simulation {
    thread_role::mark_simulation_thread();

    let time_step = Duration::from_secs_f64(config.clock.time_step);
    let mut driver = SimulationDriver::with_intervals(&config, env, intervals);
    driver.initialize();

    let mut last = Instant::now();
    let mut steps: u64 = 0;
    while !stop.load(Ordering::Acquire) {
        let elapsed = last.elapsed();
        if elapsed < time_step {
            thread::sleep(time_step - elapsed);
        }
        let now = Instant::now();
        let wall_dt = now.duration_since(last).as_secs_f64();
        last = now;

        let report = driver.step(wall_dt);
        steps += 1;
        if report.completed {
            break;
        }
    }

    let sim = driver.into_simulation();
    tracing::info!(
        "Simulation thread exiting after {} steps (t={:.2}, {:?})",
        steps,
        sim.sim_time(),
        sim.state()
    );
    sim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunState;

    fn fast_config(end_time: f64) -> HostConfig {
        let mut config = HostConfig::default();
        config.clock.time_step = 0.001;
        config.clock.clock_rate = 1000.0;
        config.scenario.platform_count = 3;
        config.scenario.end_time = end_time;
        config
    }

    #[test]
    fn test_runs_to_completion() {
        let env = Arc::new(SimEnvironment::new());
        let handle = SimulationHandle::spawn(fast_config(5.0), env).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        let sim = handle.join().unwrap();
        assert_eq!(sim.state(), RunState::Complete);
        assert_eq!(sim.sim_time(), 5.0);
        assert_eq!(sim.platform_count(), 0);
    }

    #[test]
    fn test_stop_exits_early() {
        let env = Arc::new(SimEnvironment::new());
        let handle = SimulationHandle::spawn(fast_config(1.0e9), env).unwrap();
        thread::sleep(Duration::from_millis(20));

        let sim = handle.join().unwrap();
        assert_eq!(sim.state(), RunState::Running);
        assert_eq!(sim.platform_count(), 3);
    }

    #[test]
    fn test_spawn_rejects_invalid_config() {
        let env = Arc::new(SimEnvironment::new());

        let mut config = fast_config(5.0);
        config.scenario.extent = -10.0;
        let err = SimulationHandle::spawn(config, Arc::clone(&env)).err();
        assert!(matches!(
            err,
            Some(ConfigError::Invalid {
                field: "scenario.extent",
                ..
            })
        ));

        let mut config = fast_config(5.0);
        config.clock.time_step = f64::NAN;
        assert!(SimulationHandle::spawn(config, Arc::clone(&env)).is_err());

        // No thread holds the environment
        assert_eq!(Arc::strong_count(&env), 1);
    }

    #[test]
    fn test_drop_joins_thread() {
        let env = Arc::new(SimEnvironment::new());
        let handle = SimulationHandle::spawn(fast_config(1.0e9), Arc::clone(&env)).unwrap();
        drop(handle);
        assert_eq!(Arc::strong_count(&env), 1);
    }
}
