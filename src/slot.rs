//! Exclusive ownership slot for the active table.
//!
//! The session and the interrupt handler both reach the table through a
//! [`TableSlot`]. All transitions go through a single mutex-guarded
//! exchange, so a value taken out of the slot by one side is observed as
//! absent by the other and is never released twice. Readers get a cloned
//! `Arc` and never hold the lock while an engine call is running.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct TableSlot<T> {
    inner: Mutex<Option<Arc<T>>>,
}

impl<T> Default for TableSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TableSlot<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        // A panic while holding the lock cannot leave the Option half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `value`, returning the previously held value. The caller
    /// drops the old value after the lock is released, so the new value is
    /// already visible when the old one goes away.
    pub fn replace(&self, value: T) -> Option<Arc<T>> {
        self.lock().replace(Arc::new(value))
    }

    /// Take the held value out, leaving the slot empty. Idempotent: a
    /// second caller gets `None`.
    pub fn take(&self) -> Option<Arc<T>> {
        self.lock().take()
    }

    /// Shared handle to the current value, if any.
    pub fn current(&self) -> Option<Arc<T>> {
        self.lock().clone()
    }

    pub fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted<'a>(&'a AtomicUsize);

    impl Drop for Counted<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn replace_releases_previous_exactly_once() {
        let drops = AtomicUsize::new(0);
        let slot = TableSlot::new();
        assert!(!slot.is_occupied());
        assert!(slot.replace(Counted(&drops)).is_none());
        let old = slot.replace(Counted(&drops));
        assert!(old.is_some());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(old);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(slot.is_occupied());
        drop(slot);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn take_is_idempotent() {
        let drops = AtomicUsize::new(0);
        let slot = TableSlot::new();
        slot.replace(Counted(&drops));
        let first = slot.take();
        let second = slot.take();
        assert!(first.is_some());
        assert!(second.is_none());
        drop(first);
        drop(slot);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_takes_release_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        struct Shared(Arc<AtomicUsize>);
        impl Drop for Shared {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let slot = Arc::new(TableSlot::new());
        slot.replace(Shared(drops.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                std::thread::spawn(move || slot.take().is_some())
            })
            .collect();
        let taken = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|t| *t)
            .count();
        assert_eq!(taken, 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn current_keeps_value_alive_after_take() {
        let drops = AtomicUsize::new(0);
        let slot = TableSlot::new();
        slot.replace(Counted(&drops));
        let reader = slot.current().unwrap();
        drop(slot.take());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(reader);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
