//! Serialized execution of mutating operations against one resource.
//!
//! The queue keeps a single tail: a receiver that resolves once the most recently
//! submitted task has settled. Submitting swaps a fresh receiver into the tail and
//! spawns the task onto the runtime, where it waits on the old receiver before
//! running. Both happen synchronously inside [`MutationQueue::enqueue`], so tasks run
//! in the order `enqueue` was called and run even if the returned future is never
//! polled or is dropped early. The caller's future only observes the outcome.
//!
//! A task's outcome belongs to its own caller only. Whether it succeeds, fails or
//! panics, its completion sender is released only after the body has settled, and the
//! next task proceeds.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

/// The task was cancelled by the runtime (usually at shutdown) before it settled.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Queued mutation was aborted before it completed")]
pub struct MutationAborted;

/// FIFO gate ensuring at most one mutation body runs at a time.
#[derive(Default)]
pub struct MutationQueue {
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` to the chain and return a future with the task's own outcome.
    ///
    /// The task is spawned immediately and its body starts only after every
    /// previously enqueued task has settled. Must be called within a Tokio runtime.
    /// A panic in the task is resumed in the caller when the future is awaited.
    pub fn enqueue<F, Fut, R>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<R, MutationAborted>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self.swap_tail(done_rx);

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                // An error only means the previous task ended without signalling,
                // which happens only once its body is gone.
                let _ = previous.await;
            }

            // Dropped on unwind as well, so a panicking body still releases the chain.
            let _done = done_tx;
            task().await
        });

        async move {
            match handle.await {
                Ok(outcome) => Ok(outcome),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    tracing::warn!(error = %e, "Queued mutation was cancelled");
                    Err(MutationAborted)
                }
            }
        }
    }

    fn swap_tail(&self, next: oneshot::Receiver<()>) -> Option<oneshot::Receiver<()>> {
        let mut tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.replace(next)
    }
}
