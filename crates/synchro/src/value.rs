//! Value wrappers that route every access through a synchronizer

use crate::synchronizer::{Synchronize, Synchronizer};
use std::cell::UnsafeCell;
use std::mem;
use std::sync::Arc;

/// Storage slot accessed only inside the owning synchronizer's critical
/// section.
struct ValueCell<T>(UnsafeCell<T>);

// SAFETY: the cell is dereferenced only inside the owning synchronizer's
// critical section, or on a detector-granted pass-through, which by the
// detector contract is a path that already holds the section. Shared
// acquisition performs read-only cloning; every mutation goes through
// exclusive acquisition.
unsafe impl<T: Send> Send for ValueCell<T> {}
unsafe impl<T: Send + Sync> Sync for ValueCell<T> {}

/// A value whose every read and write goes through a [`Synchronize`]
/// implementation.
///
/// The synchronizer is shared by `Arc`, so several values (or other
/// components) may serialize on the same critical section.
///
/// `set` is synchronous: it blocks until the new value is stored. See
/// [`AsyncSynchronizedValue`] for the fire-and-forget variant.
pub struct SynchronizedValue<T, S: Synchronize = Synchronizer> {
    synchronizer: Arc<S>,
    cell: Arc<ValueCell<T>>,
}

impl<T, S: Synchronize> SynchronizedValue<T, S> {
    /// Wrap `value`, guarding it with `synchronizer`.
    pub fn new(value: T, synchronizer: Arc<S>) -> Self {
        SynchronizedValue {
            synchronizer,
            cell: Arc::new(ValueCell(UnsafeCell::new(value))),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.synchronizer.read(|| unsafe { (*self.cell.0.get()).clone() })
    }

    /// Store a new value, blocking until it is applied.
    pub fn set(&self, value: T) {
        self.synchronizer.sync_write(|| unsafe {
            *self.cell.0.get() = value;
        })
    }

    /// Store `value` and return the previous one, within a single
    /// exclusive section.
    ///
    /// Atomic relative to every other accessor of the same value, unlike a
    /// separate `get` followed by `set`.
    pub fn replace(&self, value: T) -> T {
        self.synchronizer
            .sync_write(|| unsafe { mem::replace(&mut *self.cell.0.get(), value) })
    }

    /// Mutate the value in place and return the pre-mutation value, within
    /// a single exclusive section.
    pub fn transform(&self, transformation: impl FnOnce(&mut T)) -> T
    where
        T: Clone,
    {
        self.synchronizer.sync_write(|| unsafe {
            let slot = &mut *self.cell.0.get();
            let previous = slot.clone();
            transformation(slot);
            previous
        })
    }

    /// The synchronizer guarding this value.
    pub fn synchronizer(&self) -> &Arc<S> {
        &self.synchronizer
    }
}

/// A [`SynchronizedValue`] whose `set` does not wait.
///
/// Stores go through the synchronizer's fire-and-forget `write` path: the
/// caller returns immediately and the new value becomes visible once the
/// queued write has run. Reads and the compound operations remain
/// synchronous.
pub struct AsyncSynchronizedValue<T, S: Synchronize = Synchronizer> {
    inner: SynchronizedValue<T, S>,
}

impl<T, S: Synchronize> AsyncSynchronizedValue<T, S> {
    /// Wrap `value`, guarding it with `synchronizer`.
    pub fn new(value: T, synchronizer: Arc<S>) -> Self {
        AsyncSynchronizedValue {
            inner: SynchronizedValue::new(value, synchronizer),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.get()
    }

    /// Queue a store of `value` and return without waiting for it.
    pub fn set(&self, value: T)
    where
        T: Send + Sync + 'static,
    {
        let cell = self.inner.cell.clone();
        self.inner.synchronizer.write(move || unsafe {
            *cell.0.get() = value;
        });
    }

    /// Store `value` and return the previous one, within a single
    /// exclusive section.
    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    /// Mutate the value in place and return the pre-mutation value, within
    /// a single exclusive section.
    pub fn transform(&self, transformation: impl FnOnce(&mut T)) -> T
    where
        T: Clone,
    {
        self.inner.transform(transformation)
    }

    /// The synchronizer guarding this value.
    pub fn synchronizer(&self) -> &Arc<S> {
        self.inner.synchronizer()
    }
}
