//! Thread role markers used by debug assertions.
//!
//! The simulation driver marks its thread once at startup. UI-only
//! operations such as [`crate::Interface::set_enabled`] assert they are
//! not running on a marked thread.

use std::cell::Cell;

thread_local! {
    static SIMULATION_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Marks the calling thread as the simulation thread.
pub fn mark_simulation_thread() {
    SIMULATION_THREAD.with(|flag| flag.set(true));
}

/// Returns true on a thread marked by [`mark_simulation_thread`].
pub fn is_simulation_thread() -> bool {
    SIMULATION_THREAD.with(Cell::get)
}
