//! Event Channel
//!
//! Simulation-thread to UI-thread events, queued through a [`DedupQueue`].

use std::any::{Any, TypeId};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dedup_queue::{Collapsible, DedupQueue};

/// Runtime kind of an event object.
///
/// Blanket-implemented for every concrete type, so a `dyn SimEvent<_>`
/// reports the type id of the event behind it.
pub trait EventKind {
    fn kind_id(&self) -> TypeId;
}

impl<T: Any> EventKind for T {
    fn kind_id(&self) -> TypeId {
        TypeId::of::<T>()
    }
}

/// A unit of work produced on the simulation thread and applied to UI-side
/// state of type `Ctx`.
///
/// Recurring events are refreshed snapshots: a newer event of the same
/// concrete type supersedes any older one still queued. Keep one recurring
/// type per refreshed quantity; to refresh many entities, carry them all in
/// one map-valued event.
pub trait SimEvent<Ctx: ?Sized>: EventKind + Send {
    fn is_recurring(&self) -> bool {
        false
    }

    fn process(self: Box<Self>, ctx: &mut Ctx);
}

impl<Ctx: ?Sized> Collapsible for Box<dyn SimEvent<Ctx>> {
    type Kind = TypeId;

    fn recurring_kind(&self) -> Option<TypeId> {
        let event: &dyn SimEvent<Ctx> = &**self;
        event.is_recurring().then(|| EventKind::kind_id(event))
    }
}

/// Thread-safe event queue.
///
/// `push` is called from the simulation thread and `pop_all` from the UI
/// thread. The lock covers only the append or the swap-out of the whole
/// queue; events are never processed while it is held. One producer and one
/// consumer is the intended use, though concurrent calls of either side stay
/// memory safe.
pub struct EventQueue<T: Collapsible> {
    inner: Mutex<DedupQueue<T>>,
}

impl<T: Collapsible> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(DedupQueue::new()),
        }
    }
}

impl<T: Collapsible> EventQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.lock().push(item);
    }

    /// Removes every queued item, returning them in queue order.
    pub fn pop_all(&self) -> Vec<T> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into_items().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the queue half-updated, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, DedupQueue<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
