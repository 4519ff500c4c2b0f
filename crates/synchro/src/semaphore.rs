//! Counting-semaphore-backed synchronizer

use crate::synchronizer::Synchronize;
use parking_lot::{Condvar, Mutex};

/// Errors that can occur when constructing a semaphore
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemaphoreError {
    /// Invalid permit count
    #[error("Invalid permit count: {0}")]
    InvalidCount(usize),
}

/// Blocking counting semaphore.
///
/// Holds a fixed number of permits; `acquire` blocks the calling thread
/// until a permit is available. There is no timeout and no fairness
/// guarantee beyond the condvar's wakeup order.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore with the given number of permits.
    pub fn new(permits: usize) -> Self {
        Semaphore {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Return one permit and wake a waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }

    /// Get the current number of available permits
    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }

    /// Take a permit, returning it when the guard drops.
    fn acquire_guard(&self) -> PermitGuard<'_> {
        self.acquire();
        PermitGuard(self)
    }
}

/// Returns a permit on drop, panics included.
struct PermitGuard<'a>(&'a Semaphore);

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Synchronizer backed by a counting semaphore instead of a lock.
///
/// Every operation takes one permit around the body, so with the default
/// single permit all accesses — reads included — are mutually exclusive.
/// With more permits the section admits that many bodies at once, reads
/// and writes alike. There is no reentrance detection: reentry from the
/// same logical caller deadlocks once permits run out.
#[derive(Debug)]
pub struct SemaphoreSynchronizer {
    semaphore: Semaphore,
}

impl SemaphoreSynchronizer {
    /// Semaphore synchronizer with a single permit.
    pub fn new() -> Self {
        SemaphoreSynchronizer {
            semaphore: Semaphore::new(1),
        }
    }

    /// Semaphore synchronizer with a custom permit count.
    pub fn with_permits(permits: usize) -> Result<Self, SemaphoreError> {
        if permits == 0 {
            return Err(SemaphoreError::InvalidCount(permits));
        }
        Ok(SemaphoreSynchronizer {
            semaphore: Semaphore::new(permits),
        })
    }
}

impl Default for SemaphoreSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronize for SemaphoreSynchronizer {
    fn read<R>(&self, body: impl FnOnce() -> R) -> R {
        let _permit = self.semaphore.acquire_guard();
        body()
    }

    fn sync_write<R>(&self, body: impl FnOnce() -> R) -> R {
        let _permit = self.semaphore.acquire_guard();
        body()
    }

    /// Runs the body under a permit **before returning**: the semaphore
    /// variant has no queue to defer work to, so `write` here is
    /// synchronous.
    fn write(&self, body: impl FnOnce() + Send + 'static) {
        let _permit = self.semaphore.acquire_guard();
        body();
    }
}
