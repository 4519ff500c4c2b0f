//! Synchronized access to critical sections in multithreaded code
//!
//! This crate provides a small family of mutual-exclusion primitives:
//! - Serial and concurrent synchronizers with `read` / `sync_write` /
//!   fire-and-forget `write` access
//! - Pluggable reentrance detection, so nested access to the same
//!   synchronizer can run directly instead of deadlocking
//! - A semaphore-backed synchronizer
//! - Value wrappers that route every access of a single value through a
//!   synchronizer
//!
//! ```
//! use std::sync::Arc;
//! use synchro::{Priority, Synchronizer, SynchronizedValue};
//!
//! let counter = SynchronizedValue::new(5, Arc::new(Synchronizer::serial(Priority::Default)));
//! let previous = counter.transform(|value| *value += 1);
//! assert_eq!(previous, 5);
//! assert_eq!(counter.get(), 6);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod context;
mod detector;
mod section;
mod semaphore;
mod synchronizer;
mod value;

pub use context::ContextId;
pub use detector::{ContextKeyedDetector, FlagBasedDetector, ReentranceDetector};
pub use section::Mode;
pub use semaphore::{Semaphore, SemaphoreError, SemaphoreSynchronizer};
pub use synchronizer::{Priority, Synchronize, Synchronizer};
pub use value::{AsyncSynchronizedValue, SynchronizedValue};
