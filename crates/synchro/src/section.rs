//! Underlying execution context: shared and exclusive acquisition

use crate::context::{ContextId, ScopeGuard};
use parking_lot::{Mutex, RwLock};

/// Whether independent `read`s on a synchronizer may overlap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// All accesses are mutually exclusive, reads included.
    Serial,
    /// Reads may overlap each other; writes are exclusive with everything.
    Concurrent,
}

enum SectionLock {
    Serial(Mutex<()>),
    Concurrent(RwLock<()>),
}

/// The critical section one synchronizer guards.
///
/// Serial sections acquire a mutex for every access; concurrent sections
/// take the read side for shared access and the write side for exclusive
/// access. While a body runs under an acquired section, the section's id is
/// bound as the thread's current scope.
pub(crate) struct Section {
    id: ContextId,
    lock: SectionLock,
}

impl Section {
    pub(crate) fn new(mode: Mode) -> Self {
        let lock = match mode {
            Mode::Serial => SectionLock::Serial(Mutex::new(())),
            Mode::Concurrent => SectionLock::Concurrent(RwLock::new(())),
        };
        Section {
            id: ContextId::new(),
            lock,
        }
    }

    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn mode(&self) -> Mode {
        match self.lock {
            SectionLock::Serial(_) => Mode::Serial,
            SectionLock::Concurrent(_) => Mode::Concurrent,
        }
    }

    /// Run `body` under shared acquisition, blocking until acquired.
    ///
    /// Shared acquisition overlaps with other shared holders in concurrent
    /// mode and is fully exclusive in serial mode. The lock is released on
    /// every exit path, unwinding included.
    pub(crate) fn run_shared<R>(&self, body: impl FnOnce() -> R) -> R {
        match &self.lock {
            SectionLock::Serial(mutex) => {
                let _held = mutex.lock();
                let _scope = ScopeGuard::enter(self.id);
                body()
            }
            SectionLock::Concurrent(lock) => {
                let _held = lock.read();
                let _scope = ScopeGuard::enter(self.id);
                body()
            }
        }
    }

    /// Run `body` under exclusive acquisition, blocking until acquired.
    pub(crate) fn run_exclusive<R>(&self, body: impl FnOnce() -> R) -> R {
        match &self.lock {
            SectionLock::Serial(mutex) => {
                let _held = mutex.lock();
                let _scope = ScopeGuard::enter(self.id);
                body()
            }
            SectionLock::Concurrent(lock) => {
                let _held = lock.write();
                let _scope = ScopeGuard::enter(self.id);
                body()
            }
        }
    }
}
