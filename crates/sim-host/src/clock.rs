//! Clock lane scheduling.
//!
//! The wall-clock lane fires on real elapsed time, the sim-clock lane on
//! simulated time. Each lane reschedules itself one interval after the time
//! it fired at. A lane that falls more than one interval behind (a long
//! frame, or a paused clock resuming) fires once and skips the missed ticks.

use std::sync::{Mutex, PoisonError};

use sim_bridge::ClockLane;

/// Default seconds between wall-clock ticks.
pub const DEFAULT_WALL_CLOCK_INTERVAL: f64 = 0.1;
/// Default simulated seconds between sim-clock ticks.
pub const DEFAULT_SIM_CLOCK_INTERVAL: f64 = 0.5;

/// Smallest accepted interval.
const MIN_INTERVAL: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intervals {
    pub wall_clock: f64,
    pub sim_clock: f64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            wall_clock: DEFAULT_WALL_CLOCK_INTERVAL,
            sim_clock: DEFAULT_SIM_CLOCK_INTERVAL,
        }
    }
}

impl Intervals {
    pub fn get(&self, lane: ClockLane) -> f64 {
        match lane {
            ClockLane::WallClock => self.wall_clock,
            ClockLane::SimClock => self.sim_clock,
        }
    }
}

/// Tick intervals adjustable from the UI while the simulation runs.
#[derive(Debug, Default)]
pub struct ClockIntervals {
    inner: Mutex<Intervals>,
}

impl ClockIntervals {
    pub fn new(intervals: Intervals) -> Self {
        Self {
            inner: Mutex::new(intervals),
        }
    }

    pub fn current(&self) -> Intervals {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the interval of `lane`, clamped to at least one millisecond.
    pub fn set(&self, lane: ClockLane, seconds: f64) {
        let seconds = if seconds.is_finite() {
            seconds.max(MIN_INTERVAL)
        } else {
            tracing::warn!("Ignoring non-finite {} interval", lane);
            return;
        };
        let mut intervals = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match lane {
            ClockLane::WallClock => intervals.wall_clock = seconds,
            ClockLane::SimClock => intervals.sim_clock = seconds,
        }
        tracing::debug!("{} interval set to {}s", lane, seconds);
    }
}

/// Next fire time of each lane.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockSchedule {
    next_wall: f64,
    next_sim: f64,
}

impl ClockSchedule {
    /// Both lanes fire on the first poll at or after the given times.
    pub fn starting_at(wall_time: f64, sim_time: f64) -> Self {
        Self {
            next_wall: wall_time,
            next_sim: sim_time,
        }
    }

    pub fn next_fire(&self, lane: ClockLane) -> f64 {
        match lane {
            ClockLane::WallClock => self.next_wall,
            ClockLane::SimClock => self.next_sim,
        }
    }

    /// Returns whether `lane` is due at `now`, rescheduling it if so.
    pub fn poll(&mut self, lane: ClockLane, now: f64, intervals: &Intervals) -> bool {
        let interval = intervals.get(lane);
        let next = match lane {
            ClockLane::WallClock => &mut self.next_wall,
            ClockLane::SimClock => &mut self.next_sim,
        };
        if now < *next {
            return false;
        }
        *next += interval;
        if *next <= now {
            *next = now + interval;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(wall: f64, sim: f64) -> Intervals {
        Intervals {
            wall_clock: wall,
            sim_clock: sim,
        }
    }

    #[test]
    fn test_fires_on_interval_boundaries() {
        let mut schedule = ClockSchedule::starting_at(0.0, 0.0);
        let iv = intervals(0.25, 1.0);
        let fired: Vec<bool> = [0.0, 0.1, 0.25, 0.3, 0.5]
            .iter()
            .map(|&t| schedule.poll(ClockLane::WallClock, t, &iv))
            .collect();
        assert_eq!(fired, vec![true, false, true, false, true]);
        assert_eq!(schedule.next_fire(ClockLane::WallClock), 0.75);
    }

    #[test]
    fn test_missed_ticks_collapse() {
        let mut schedule = ClockSchedule::starting_at(0.0, 0.0);
        let iv = intervals(0.1, 1.0);
        assert!(schedule.poll(ClockLane::SimClock, 0.0, &iv));
        assert!(schedule.poll(ClockLane::SimClock, 5.5, &iv));
        assert_eq!(schedule.next_fire(ClockLane::SimClock), 6.5);
        assert!(!schedule.poll(ClockLane::SimClock, 6.0, &iv));
    }

    #[test]
    fn test_lanes_are_independent() {
        let mut schedule = ClockSchedule::starting_at(0.0, 10.0);
        let iv = Intervals::default();
        assert!(schedule.poll(ClockLane::WallClock, 0.0, &iv));
        assert!(!schedule.poll(ClockLane::SimClock, 0.0, &iv));
        assert!(schedule.poll(ClockLane::SimClock, 10.0, &iv));
    }

    #[test]
    fn test_interval_updates_are_clamped() {
        let shared = ClockIntervals::default();
        shared.set(ClockLane::WallClock, 0.0);
        shared.set(ClockLane::SimClock, f64::INFINITY);
        let current = shared.current();
        assert_eq!(current.wall_clock, MIN_INTERVAL);
        assert_eq!(current.sim_clock, DEFAULT_SIM_CLOCK_INTERVAL);
    }
}
