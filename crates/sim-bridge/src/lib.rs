//! Cross-thread bridge between a real-time simulation thread and a UI thread.
//!
//! The simulation thread publishes [`SimEvent`]s that the UI drains once per
//! frame; the UI submits [`SimCommand`]s that the simulation executes on its
//! next tick of the matching [`ClockLane`]. Nothing else crosses threads
//! except interface scratch state read through the optimistic
//! [`SharedState`] snapshot.
//!
//! # Modules
//!
//! - [`dedup_queue`]: ordered container collapsing recurring items
//! - [`event`]: event trait and the thread-safe event queue
//! - [`command`]: command trait, clock lanes and per-lane queues
//! - [`interface`]: lifecycle hooks and the typed [`SimInterface`] façade
//! - [`snapshot`]: non-blocking reads of UI-mutable state
//! - [`environment`]: routes engine callbacks to attached interfaces
//! - [`thread_role`]: simulation thread marker for debug assertions

pub mod command;
pub mod dedup_queue;
pub mod environment;
pub mod event;
pub mod interface;
pub mod snapshot;
pub mod thread_role;

pub use command::{BoxedCommand, ClockLane, CommandChannel, CommandQueue, SimCommand};
pub use dedup_queue::{Collapsible, DedupQueue};
pub use environment::{InterfaceId, SimEnvironment, TickReport};
pub use event::{EventKind, EventQueue, SimEvent};
pub use interface::{Interface, InterfaceBase, SimInterface, SimulationModel};
pub use snapshot::SharedState;
