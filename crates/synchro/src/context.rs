//! Execution-scope identity used for reentrance detection

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for one synchronizer's execution scope.
///
/// Assigned from a process-wide monotonic counter at synchronizer
/// construction time. While a thread executes inside an acquired critical
/// section, the owning section's id is recorded as the thread's current
/// scope so detectors can recognize direct reentry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// Generate a new unique ContextId
    pub(crate) fn new() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric id value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

thread_local! {
    /// Innermost synchronizer scope the current thread is executing inside.
    static CURRENT_SCOPE: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Scope id of the section the current thread is innermost-executing in.
pub(crate) fn current_scope() -> Option<ContextId> {
    CURRENT_SCOPE.with(|scope| scope.get())
}

/// RAII binding of the current thread's scope.
///
/// Records the given id as the current scope and restores the previous one
/// on drop, so the binding survives early returns and unwinding. Nested
/// sections shadow outer ones; only the innermost scope is observable,
/// which is what makes indirect reentry undetectable for context-keyed
/// detectors.
pub(crate) struct ScopeGuard {
    previous: Option<ContextId>,
}

impl ScopeGuard {
    /// Bind `id` as the current scope until the guard drops.
    pub(crate) fn enter(id: ContextId) -> Self {
        let previous = CURRENT_SCOPE.with(|scope| scope.replace(Some(id)));
        ScopeGuard { previous }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        CURRENT_SCOPE.with(|scope| scope.set(self.previous));
    }
}
