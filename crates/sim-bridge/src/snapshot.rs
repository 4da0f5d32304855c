//! Optimistic snapshot of UI-mutable interface state.
//!
//! The UI thread mutates the state under a blocking lock. The simulation
//! thread only ever *tries* the lock: when the UI holds it, the tick goes
//! ahead without the value instead of stalling the simulation. A blocking
//! acquire on the simulation thread is a bug.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Mutex-guarded scratch state shared between an interface's two threads.
#[derive(Debug, Default)]
pub struct SharedState<T> {
    inner: Mutex<T>,
}

impl<T> SharedState<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Blocking access. UI thread only.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state if the lock is free right now.
    ///
    /// Returns `None` without waiting when another thread holds the lock.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match self.inner.try_lock() {
            Ok(mut guard) => Some(f(&mut guard)),
            Err(TryLockError::Poisoned(poisoned)) => Some(f(&mut poisoned.into_inner())),
            Err(TryLockError::WouldBlock) => {
                tracing::trace!("Shared state busy, skipping snapshot");
                None
            }
        }
    }

    /// Consumes the wrapper once no other thread can reach it.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> SharedState<T> {
    /// Copies the current value, or returns `None` under contention.
    pub fn try_snapshot(&self) -> Option<T> {
        self.try_with(|value| value.clone())
    }
}

impl<T: Clone + Default> SharedState<T> {
    /// Copies the current value, falling back to an empty value under
    /// contention.
    pub fn snapshot_or_default(&self) -> T {
        self.try_snapshot().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_when_free() {
        let state = SharedState::new(BTreeSet::from([1usize, 4]));
        assert_eq!(state.try_snapshot(), Some(BTreeSet::from([1, 4])));
        assert_eq!(state.snapshot_or_default(), BTreeSet::from([1, 4]));
    }

    #[test]
    fn test_contention_returns_without_blocking() {
        let state = Arc::new(SharedState::new(vec![3usize]));
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                let mut guard = state.lock();
                guard.push(9);
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        locked_rx.recv().unwrap();
        assert_eq!(state.try_snapshot(), None);
        assert!(state.snapshot_or_default().is_empty());
        assert_eq!(state.try_with(|v| v.len()), None);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(state.try_snapshot(), Some(vec![3, 9]));
    }

    #[test]
    fn test_into_inner_returns_value() {
        let state = SharedState::new(String::from("alpha"));
        state.lock().push_str("-1");
        assert_eq!(state.into_inner(), "alpha-1");
    }
}
