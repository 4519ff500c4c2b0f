//! Reentrance detection strategies
//!
//! A reentrance detector answers one question: is the current logical
//! caller already inside the owning synchronizer's critical section? A
//! denied entry tells the synchronizer to run the body directly instead of
//! acquiring again, which is what turns a would-be self-deadlock into a
//! plain nested call.

use crate::context::{self, ContextId};
use crate::synchronizer::{Priority, Synchronizer};
use crate::value::SynchronizedValue;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Strategy for detecting nested attempts to enter the same synchronized
/// scope.
///
/// Every successful (`true`) [`enter`](ReentranceDetector::enter) must be
/// paired with exactly one [`leave`](ReentranceDetector::leave), on every
/// exit path. Detectors never fail; the worst case is a false negative
/// (an undetected reentry), which surfaces as a deadlock in the owning
/// synchronizer. That is a documented limitation of the cheaper
/// strategies, not a recoverable condition.
pub enum ReentranceDetector {
    /// Always reports "not entered": every call performs the full
    /// acquisition. Reentrant calls from the same logical path will
    /// deadlock.
    NonReentrant,
    /// Compares the thread's current execution scope against the owning
    /// synchronizer's. Detects direct reentry inside the same section, but
    /// misses reentry that hops through another thread first.
    ContextKeyed(ContextKeyedDetector),
    /// A shared boolean flag, set on enter and cleared on leave. Detects
    /// reentry even across cross-thread synchronous hops, but only suits
    /// serial sections driven by one logical caller chain: truly parallel
    /// callers can observe each other's flag and pass through without
    /// acquisition.
    FlagBased(FlagBasedDetector),
}

impl ReentranceDetector {
    /// Detector that disables reentrance handling entirely.
    pub fn non_reentrant() -> Self {
        ReentranceDetector::NonReentrant
    }

    /// Detector keyed on the owning synchronizer's execution scope.
    pub fn context_keyed() -> Self {
        ReentranceDetector::ContextKeyed(ContextKeyedDetector::new())
    }

    /// Detector backed by a synchronized boolean flag.
    pub fn flag_based() -> Self {
        ReentranceDetector::FlagBased(FlagBasedDetector::new())
    }

    /// Attempt to enter the synchronized scope.
    ///
    /// Returns `true` when entry is newly granted, in which case the caller
    /// owns exactly one matching [`leave`](Self::leave). Returns `false`
    /// when the scope is already entered and the caller must run its body
    /// directly, without acquisition and without calling `leave`.
    pub fn enter(&self) -> bool {
        match self {
            ReentranceDetector::NonReentrant => true,
            ReentranceDetector::ContextKeyed(detector) => detector.enter(),
            ReentranceDetector::FlagBased(detector) => detector.enter(),
        }
    }

    /// Leave a previously entered scope.
    pub fn leave(&self) {
        match self {
            ReentranceDetector::NonReentrant => {}
            ReentranceDetector::ContextKeyed(detector) => detector.leave(),
            ReentranceDetector::FlagBased(detector) => detector.leave(),
        }
    }

    /// Whether an entrance is currently active.
    pub fn is_entered(&self) -> bool {
        match self {
            ReentranceDetector::NonReentrant => false,
            ReentranceDetector::ContextKeyed(detector) => detector.is_entered(),
            ReentranceDetector::FlagBased(detector) => detector.is_entered(),
        }
    }

    /// Bind the detector to its owning synchronizer's section.
    ///
    /// Called exactly once, at synchronizer construction. Only the
    /// context-keyed strategy keeps the id.
    pub(crate) fn attach(&self, id: ContextId) {
        if let ReentranceDetector::ContextKeyed(detector) = self {
            detector.attach(id);
        }
    }
}

/// Detector that recognizes reentry by execution-scope identity.
pub struct ContextKeyedDetector {
    scope: OnceCell<ContextId>,
}

impl ContextKeyedDetector {
    fn new() -> Self {
        ContextKeyedDetector {
            scope: OnceCell::new(),
        }
    }

    fn attach(&self, id: ContextId) {
        let attached = self.scope.set(id).is_ok();
        debug_assert!(attached, "detector attached to a second synchronizer");
    }

    fn enter(&self) -> bool {
        !self.is_entered()
    }

    fn leave(&self) {}

    fn is_entered(&self) -> bool {
        match self.scope.get() {
            Some(id) => context::current_scope() == Some(*id),
            None => false,
        }
    }
}

/// Detector that recognizes reentry through a synchronized boolean flag.
///
/// The flag itself is guarded by an internal concurrent synchronizer with
/// no reentrance handling of its own, which keeps the construction
/// non-recursive.
pub struct FlagBasedDetector {
    entered: SynchronizedValue<bool>,
}

impl FlagBasedDetector {
    fn new() -> Self {
        let guard = Arc::new(Synchronizer::concurrent(Priority::Default));
        FlagBasedDetector {
            entered: SynchronizedValue::new(false, guard),
        }
    }

    fn enter(&self) -> bool {
        // Test-and-set inside a single exclusive section.
        !self.entered.replace(true)
    }

    fn leave(&self) {
        self.entered.set(false);
    }

    fn is_entered(&self) -> bool {
        self.entered.get()
    }
}
