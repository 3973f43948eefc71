//! Sliding-window processor over spawned tasks.

use std::future::Future;
use std::iter::Fuse;
use std::panic;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{FusedStream, FuturesUnordered, Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, warn};

use super::{Parallelism, SchedulerError};
use crate::config::StoreConfig;

type Work<T> = Box<dyn Iterator<Item = BoxFuture<'static, T>> + Send>;

/// Runs async jobs with bounded concurrency.
#[derive(Debug, Clone, Default)]
pub struct ParallelProcessor {
    parallelism: Parallelism,
    cancellation: CancellationToken,
}

impl ParallelProcessor {
    pub fn new(parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            cancellation: CancellationToken::new(),
        }
    }

    /// Processor bounded by the configured parallelism.
    pub fn from_config(config: &StoreConfig) -> Result<Self, SchedulerError> {
        Ok(Self::new(Parallelism::new(config.parallelism)?))
    }

    /// Ends every stream returned by [`run`](Self::run) once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }

    /// Starts processing `work` and returns the results as they complete.
    ///
    /// Each item is a factory that is only invoked when its job is admitted,
    /// so `work` may be arbitrarily long or lazy. Jobs run on the tokio
    /// runtime; the stream must be polled from within one.
    pub fn run<I, F, Fut, T>(&self, work: I) -> Completions<T>
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let work: Work<T> = Box::new(
            work.into_iter()
                .map(|job| -> BoxFuture<'static, T> { Box::pin(job()) }),
        );

        Completions {
            work: work.fuse(),
            running: FuturesUnordered::new(),
            parallelism: self.parallelism.clone(),
            cancelled: Box::pin(self.cancellation.clone().cancelled_owned()),
            done: false,
        }
    }
}

/// Results of a [`ParallelProcessor::run`], in completion order.
///
/// Admission happens while the stream is polled: before waiting, the window
/// is topped up to the current bound, and every yielded result frees a slot
/// that is refilled right away. After cancellation the stream ends; jobs
/// already running are detached and left to finish on their own.
pub struct Completions<T> {
    work: Fuse<Work<T>>,
    running: FuturesUnordered<JoinHandle<T>>,
    parallelism: Parallelism,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl<T: Send + 'static> Completions<T> {
    /// Number of jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    fn admit(&mut self) {
        while self.running.len() < self.parallelism.get() {
            match self.work.next() {
                Some(job) => self.running.push(tokio::spawn(job)),
                None => break,
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        // Dropping the handles detaches the tasks
        self.running = FuturesUnordered::new();
    }
}

impl<T: Send + 'static> Stream for Completions<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            if this.cancelled.as_mut().poll(cx).is_ready() {
                debug!(detached = this.running.len(), "Processing cancelled");
                this.finish();
                return Poll::Ready(None);
            }

            this.admit();

            match this.running.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(output))) => {
                    this.admit();
                    return Poll::Ready(Some(output));
                }
                Poll::Ready(Some(Err(e))) if e.is_panic() => {
                    this.finish();
                    panic::resume_unwind(e.into_panic());
                }
                Poll::Ready(Some(Err(e))) => {
                    // Only happens when the runtime shuts down under us
                    warn!(error = %e, "Task ended without a result");
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T: Send + 'static> FusedStream for Completions<T> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}
