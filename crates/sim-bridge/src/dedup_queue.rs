//! Dedup Queue
//!
//! Ordered container in which recurring items collapse to a single live
//! instance per kind.
//!
//! Items are stored in sequence-numbered slots. Replacing a stale recurring
//! item leaves a tombstone at its old slot, so removal from the middle is
//! O(1); the kind index maps a recurring kind to the sequence number of its
//! live slot. Tombstones at the head are popped eagerly and the arena is
//! compacted once tombstones outnumber live items.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Tombstone count below which compaction never runs.
const COMPACT_MIN_TOMBSTONES: usize = 32;

/// An item that may supersede older queued items of the same kind.
pub trait Collapsible {
    /// Identity of an item kind. Compared by kind, never by payload.
    type Kind: Eq + Hash;

    /// Returns the kind when this item is recurring, `None` when it is a
    /// discrete item that must never be merged.
    fn recurring_kind(&self) -> Option<Self::Kind>;
}

/// Ordered queue holding at most one live item per recurring kind.
///
/// Not synchronized; see [`crate::event::EventQueue`] for the cross-thread
/// wrapper.
pub struct DedupQueue<T: Collapsible> {
    slots: VecDeque<Option<T>>,
    /// Sequence number of `slots[0]`.
    base: u64,
    live: usize,
    index: HashMap<T::Kind, u64>,
}

impl<T: Collapsible> Default for DedupQueue<T> {
    fn default() -> Self {
        Self {
            slots: VecDeque::new(),
            base: 0,
            live: 0,
            index: HashMap::new(),
        }
    }
}

impl<T: Collapsible> DedupQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Appends `item` at the tail.
    ///
    /// A recurring item first evicts the queued item of the same kind,
    /// wherever it sits.
    pub fn push(&mut self, item: T) {
        let seq = self.base + self.slots.len() as u64;

        if let Some(kind) = item.recurring_kind() {
            if let Some(stale_seq) = self.index.insert(kind, seq) {
                let pos = (stale_seq - self.base) as usize;
                if let Some(slot) = self.slots.get_mut(pos) {
                    if slot.take().is_some() {
                        self.live -= 1;
                    }
                }
            }
        }

        self.slots.push_back(Some(item));
        self.live += 1;

        self.trim_head();
        if self.tombstones() > COMPACT_MIN_TOMBSTONES.max(self.live) {
            self.compact();
        }
    }

    /// Removes and returns the oldest live item.
    pub fn pop_front(&mut self) -> Option<T> {
        while let Some(slot) = self.slots.pop_front() {
            self.base += 1;
            if let Some(item) = slot {
                self.live -= 1;
                if let Some(kind) = item.recurring_kind() {
                    self.index.remove(&kind);
                }
                return Some(item);
            }
        }
        None
    }

    /// Removes and returns every live item in queue order.
    pub fn pop_all(&mut self) -> Vec<T> {
        self.base += self.slots.len() as u64;
        self.live = 0;
        self.index.clear();
        self.slots.drain(..).flatten().collect()
    }

    /// Iterates live items in queue order without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    /// Consumes the queue, yielding live items in order.
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.slots.into_iter().flatten()
    }

    fn tombstones(&self) -> usize {
        self.slots.len() - self.live
    }

    fn trim_head(&mut self) {
        while matches!(self.slots.front(), Some(None)) {
            self.slots.pop_front();
            self.base += 1;
        }
    }

    fn compact(&mut self) {
        let before = self.slots.len();
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (offset, item) in self.slots.iter().flatten().enumerate() {
            if let Some(kind) = item.recurring_kind() {
                self.index.insert(kind, self.base + offset as u64);
            }
        }
        tracing::trace!(
            "Compacted dedup queue: {} slots -> {} live",
            before,
            self.slots.len()
        );
    }
}

impl<T: Collapsible + std::fmt::Debug> std::fmt::Debug for DedupQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
