//! Command Channel
//!
//! UI-thread to simulation-thread commands, split across two clock lanes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Periodic trigger a command waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockLane {
    /// Real elapsed time. Keeps firing while the simulation is paused, so
    /// simulation management commands belong here.
    WallClock,
    /// Simulated time. Stops while the simulation is paused.
    SimClock,
}

impl ClockLane {
    pub fn all() -> [ClockLane; 2] {
        [ClockLane::WallClock, ClockLane::SimClock]
    }
}

impl fmt::Display for ClockLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockLane::WallClock => write!(f, "wall clock"),
            ClockLane::SimClock => write!(f, "sim clock"),
        }
    }
}

/// A unit of work executed once against the simulation state on the
/// simulation thread.
pub trait SimCommand<S: ?Sized>: Send {
    fn execute(self: Box<Self>, sim: &mut S);
}

impl<S: ?Sized, F> SimCommand<S> for F
where
    F: FnOnce(&mut S) + Send,
{
    fn execute(self: Box<Self>, sim: &mut S) {
        (*self)(sim)
    }
}

pub type BoxedCommand<S> = Box<dyn SimCommand<S>>;

/// FIFO of commands for a single lane.
pub struct CommandQueue<S: ?Sized> {
    pending: Mutex<VecDeque<BoxedCommand<S>>>,
}

impl<S: ?Sized> Default for CommandQueue<S> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }
}

impl<S: ?Sized> CommandQueue<S> {
    pub fn enqueue(&self, command: BoxedCommand<S>) {
        self.lock().push_back(command);
    }

    /// Executes every command queued at the time of the call, in order.
    ///
    /// The queue is swapped out before anything runs, so a command that
    /// enqueues another command on this queue defers it to the next drain.
    /// Returns the number of commands executed.
    pub fn drain_and_execute(&self, sim: &mut S) -> usize {
        let batch = std::mem::take(&mut *self.lock());
        let count = batch.len();
        for command in batch {
            command.execute(sim);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BoxedCommand<S>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The two per-lane command queues owned by an interface.
pub struct CommandChannel<S: ?Sized> {
    wall_clock: CommandQueue<S>,
    sim_clock: CommandQueue<S>,
}

impl<S: ?Sized> Default for CommandChannel<S> {
    fn default() -> Self {
        Self {
            wall_clock: CommandQueue::default(),
            sim_clock: CommandQueue::default(),
        }
    }
}

impl<S: ?Sized> CommandChannel<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lane(&self, lane: ClockLane) -> &CommandQueue<S> {
        match lane {
            ClockLane::WallClock => &self.wall_clock,
            ClockLane::SimClock => &self.sim_clock,
        }
    }

    pub fn enqueue(&self, lane: ClockLane, command: BoxedCommand<S>) {
        self.lane(lane).enqueue(command);
    }

    pub fn drain_and_execute(&self, lane: ClockLane, sim: &mut S) -> usize {
        self.lane(lane).drain_and_execute(sim)
    }

    pub fn len(&self, lane: ClockLane) -> usize {
        self.lane(lane).len()
    }
}
