//! Bounded-concurrency task scheduler
//!
//! [`ParallelProcessor`] turns a lazy sequence of async jobs into a stream of
//! results in completion order, keeping at most [`Parallelism::get`] jobs in
//! flight. The bound is a shared handle and may be changed while a run is in
//! progress:
//!
//! ```text
//! work ──admit while in_flight < P──> [ spawned tasks ] ──first done──> Completions
//!   ^                                                        │
//!   └──────────────── admit the next job ────────────────────┘
//! ```

mod processor;

pub use processor::{Completions, ParallelProcessor};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::DEFAULT_PARALLELISM;

/// Smallest accepted concurrency bound.
pub const MIN_PARALLELISM: usize = 1;

/// Largest accepted concurrency bound.
pub const MAX_PARALLELISM: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Parallelism {value} outside {}..={}", MIN_PARALLELISM, MAX_PARALLELISM)]
    ParallelismOutOfRange { value: usize },
}

/// Shared, mutable concurrency bound.
///
/// Clones observe the same value, so a caller can resize a run it handed to
/// a [`ParallelProcessor`].
#[derive(Debug, Clone)]
pub struct Parallelism(Arc<AtomicUsize>);

impl Parallelism {
    pub fn new(value: usize) -> Result<Self, SchedulerError> {
        check(value)?;
        Ok(Self(Arc::new(AtomicUsize::new(value))))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Changes the bound. Running jobs are never interrupted by a smaller value.
    pub fn set(&self, value: usize) -> Result<(), SchedulerError> {
        check(value)?;
        self.0.store(value, Ordering::Release);
        Ok(())
    }
}

impl Default for Parallelism {
    fn default() -> Self {
        Self(Arc::new(AtomicUsize::new(DEFAULT_PARALLELISM)))
    }
}

fn check(value: usize) -> Result<(), SchedulerError> {
    if (MIN_PARALLELISM..=MAX_PARALLELISM).contains(&value) {
        Ok(())
    } else {
        Err(SchedulerError::ParallelismOutOfRange { value })
    }
}
