//! Read/write synchronizers over a single critical section

use crate::detector::ReentranceDetector;
use crate::section::{Mode, Section};
use crossbeam::channel::{self, Sender};
use once_cell::sync::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Advisory scheduling hint for a synchronizer's execution context.
///
/// Priority never affects the acquisition contract; it only labels the
/// writer thread so it can be told apart in thread listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    /// Deprioritized housekeeping work.
    Background,
    /// The default priority.
    #[default]
    Default,
    /// Latency-sensitive work.
    High,
}

impl Priority {
    fn label(self) -> &'static str {
        match self {
            Priority::Background => "bg",
            Priority::Default => "default",
            Priority::High => "high",
        }
    }
}

/// An object that synchronizes access to a critical section in a
/// multithreaded environment.
///
/// Fallible bodies are expressed by returning `Result`; the synchronizer
/// forwards the body's value untouched, after the critical section has been
/// released.
pub trait Synchronize {
    /// Run `body` with synchronized **read-only** access, blocking the
    /// caller until the section is acquired and the body completes.
    ///
    /// Reads do not have exclusive access: on a concurrent synchronizer,
    /// several reads may execute at the same time. Mutating shared state
    /// from a `read` body breaks that contract.
    fn read<R>(&self, body: impl FnOnce() -> R) -> R;

    /// Run `body` with synchronized **read-write** access, blocking the
    /// caller until the section is acquired and the body completes.
    ///
    /// Writes are exclusive: no other read or write body overlaps this one.
    fn sync_write<R>(&self, body: impl FnOnce() -> R) -> R;

    /// Submit `body` for **read-write** access without waiting for it.
    ///
    /// The body runs later under the same exclusive discipline as
    /// [`sync_write`](Self::sync_write). There is no result or error
    /// channel; the caller cannot observe completion or failure.
    fn write(&self, body: impl FnOnce() + Send + 'static);
}

type WriteJob = Box<dyn FnOnce() + Send + 'static>;

/// Synchronizer over a serial or concurrent critical section.
///
/// Before acquiring, every `read`/`sync_write` consults the configured
/// [`ReentranceDetector`]; a denied entry means the current logical caller
/// already holds the section, and the body runs directly instead of
/// deadlocking on a second acquisition.
///
/// `write` bodies are queued to a dedicated writer thread and execute in
/// submission order, each under exclusive acquisition.
pub struct Synchronizer {
    section: Arc<Section>,
    detector: ReentranceDetector,
    priority: Priority,
    writer: OnceCell<Sender<WriteJob>>,
}

impl Synchronizer {
    /// Create a synchronizer with an explicit mode and detector.
    pub fn new(mode: Mode, priority: Priority, detector: ReentranceDetector) -> Self {
        let section = Arc::new(Section::new(mode));
        detector.attach(section.id());
        Synchronizer {
            section,
            detector,
            priority,
            writer: OnceCell::new(),
        }
    }

    /// Serial synchronizer without reentrance protection.
    pub fn serial(priority: Priority) -> Self {
        Self::new(Mode::Serial, priority, ReentranceDetector::non_reentrant())
    }

    /// Concurrent synchronizer without reentrance protection.
    pub fn concurrent(priority: Priority) -> Self {
        Self::new(Mode::Concurrent, priority, ReentranceDetector::non_reentrant())
    }

    /// Serial synchronizer with context-keyed reentrance handling.
    pub fn reentrant_serial(priority: Priority) -> Self {
        Self::new(Mode::Serial, priority, ReentranceDetector::context_keyed())
    }

    /// Concurrent synchronizer with context-keyed reentrance handling.
    pub fn reentrant_concurrent(priority: Priority) -> Self {
        Self::new(Mode::Concurrent, priority, ReentranceDetector::context_keyed())
    }

    /// Whether reads on this synchronizer may overlap.
    pub fn mode(&self) -> Mode {
        self.section.mode()
    }

    /// The advisory priority this synchronizer was created with.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the configured detector currently reports an active
    /// entrance.
    pub fn is_entered(&self) -> bool {
        self.detector.is_entered()
    }

    fn writer(&self) -> &Sender<WriteJob> {
        self.writer
            .get_or_init(|| spawn_writer(self.section.clone(), self.priority))
    }
}

impl Synchronize for Synchronizer {
    fn read<R>(&self, body: impl FnOnce() -> R) -> R {
        if !self.detector.enter() {
            return body();
        }
        let _leave = LeaveGuard(&self.detector);
        self.section.run_shared(body)
    }

    fn sync_write<R>(&self, body: impl FnOnce() -> R) -> R {
        if !self.detector.enter() {
            return body();
        }
        let _leave = LeaveGuard(&self.detector);
        self.section.run_exclusive(body)
    }

    fn write(&self, body: impl FnOnce() + Send + 'static) {
        // Send fails only once the writer has shut down, which cannot
        // happen before this synchronizer is dropped.
        let _ = self.writer().send(Box::new(body));
    }
}

/// Calls `leave()` when dropped, after the section guard has released.
struct LeaveGuard<'a>(&'a ReentranceDetector);

impl Drop for LeaveGuard<'_> {
    fn drop(&mut self) {
        self.0.leave();
    }
}

fn spawn_writer(section: Arc<Section>, priority: Priority) -> Sender<WriteJob> {
    let (sender, jobs) = channel::unbounded::<WriteJob>();
    let name = format!(
        "synchro-writer-{}-{}",
        priority.label(),
        section.id().as_u64()
    );
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            for job in jobs {
                // A panicking job releases the section while unwinding and
                // must not take the writer down with it.
                let _ = panic::catch_unwind(AssertUnwindSafe(|| section.run_exclusive(job)));
            }
        })
        .expect("Failed to spawn writer thread");
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_read_forwards_result() {
        let synchronizer = Synchronizer::serial(Priority::Default);
        assert_eq!(synchronizer.read(|| 42), 42);
    }

    #[test]
    fn test_sync_write_forwards_result() {
        let synchronizer = Synchronizer::concurrent(Priority::High);
        assert_eq!(synchronizer.sync_write(|| "stored"), "stored");
    }

    #[test]
    fn test_body_error_propagates_unchanged() {
        let synchronizer = Synchronizer::serial(Priority::Default);

        let err = synchronizer
            .read(|| "not a number".parse::<i32>())
            .unwrap_err();
        assert_eq!(err, "x".parse::<i32>().unwrap_err());

        // The section is released after the error surfaced.
        assert_eq!(synchronizer.sync_write(|| 1), 1);
    }

    #[test]
    fn test_write_executes_the_body() {
        let synchronizer = Synchronizer::concurrent(Priority::Default);
        let (tx, rx) = mpsc::channel();

        synchronizer.write(move || {
            tx.send(7).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
    }

    #[test]
    fn test_accessors() {
        let synchronizer = Synchronizer::new(
            Mode::Concurrent,
            Priority::Background,
            ReentranceDetector::context_keyed(),
        );
        assert_eq!(synchronizer.mode(), Mode::Concurrent);
        assert_eq!(synchronizer.priority(), Priority::Background);
        assert!(!synchronizer.is_entered());
    }

    #[test]
    fn test_detector_cleared_after_body_panics() {
        let synchronizer = Synchronizer::new(
            Mode::Serial,
            Priority::Default,
            ReentranceDetector::flag_based(),
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            synchronizer.sync_write(|| panic!("body failed"));
        }));
        assert!(result.is_err());

        // leave() ran during unwind: the flag is clear and the section
        // acquirable.
        assert!(!synchronizer.is_entered());
        assert_eq!(synchronizer.sync_write(|| 5), 5);
    }

    #[test]
    fn test_pass_through_runs_without_reacquiring() {
        let synchronizer = Synchronizer::new(
            Mode::Serial,
            Priority::Default,
            ReentranceDetector::context_keyed(),
        );

        let nested = synchronizer.read(|| {
            assert!(synchronizer.is_entered());
            synchronizer.sync_write(|| 9)
        });
        assert_eq!(nested, 9);
        assert!(!synchronizer.is_entered());
    }
}
