// src/engine/completion.rs

//! Normalizes the different ways a callback can report that its run is over.
//!
//! A callback receives a [`Done`] handle and returns a [`Completion`]:
//!
//! - [`Completion::Ready`]: the run already finished synchronously.
//! - [`Completion::Deferred`]: the run finishes when the future resolves.
//! - [`Completion::Pending`]: the run finishes when `Done` is signalled.
//!
//! Whichever signal arrives first wins. A `Done` dropped without signalling
//! while the completion is `Pending` counts as success.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::warn;

/// Outcome of a single run.
pub type RunResult = Result<(), anyhow::Error>;

/// Boxed future driving a deferred run.
pub type RunFuture = Pin<Box<dyn Future<Output = RunResult> + Send + 'static>>;

/// One-shot completion handle passed to every callback invocation.
#[must_use = "dropping `Done` without signalling counts as a successful run"]
pub struct Done {
    tx: oneshot::Sender<RunResult>,
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

/// Receiving half of a [`Done`] handle, held by the session.
pub(crate) type DoneReceiver = oneshot::Receiver<RunResult>;

impl Done {
    pub(crate) fn channel() -> (Self, DoneReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Signal success.
    pub fn ok(self) {
        self.finish(Ok(()));
    }

    /// Signal failure.
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.finish(Err(err.into()));
    }

    pub fn finish(self, result: RunResult) {
        // The session may already have settled the run through another
        // signal, or been closed; either way there is nobody to tell.
        let _ = self.tx.send(result);
    }
}

/// What a callback hands back to the session.
pub enum Completion {
    /// Completes through the [`Done`] handle.
    Pending,
    /// Already completed.
    Ready(RunResult),
    /// Completes when the future resolves.
    Deferred(RunFuture),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Pending => f.write_str("Pending"),
            Completion::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Completion::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl Completion {
    pub fn ok() -> Self {
        Completion::Ready(Ok(()))
    }

    pub fn err(err: impl Into<anyhow::Error>) -> Self {
        Completion::Ready(Err(err.into()))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = RunResult> + Send + 'static,
    {
        Completion::Deferred(Box::pin(future))
    }
}

impl From<RunResult> for Completion {
    fn from(result: RunResult) -> Self {
        Completion::Ready(result)
    }
}

/// Wait for the first completion signal of a run.
pub(crate) async fn settle(completion: Completion, mut done: DoneReceiver) -> RunResult {
    match completion {
        Completion::Ready(result) => result,
        Completion::Pending => match done.await {
            Ok(result) => result,
            Err(_) => {
                warn!("completion handle dropped without signalling; treating run as successful");
                Ok(())
            }
        },
        Completion::Deferred(future) => {
            tokio::select! {
                result = future => result,
                // A dropped `Done` disables this branch; the future decides.
                Ok(result) = &mut done => result,
            }
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Settle a run on its own task so a panicking user future turns into a run
/// error instead of losing the completion. Cancelling the returned future
/// cancels the user's work too.
pub(crate) async fn run_to_completion(completion: Completion, done: DoneReceiver) -> RunResult {
    let task = tokio::spawn(settle(completion, done));
    let _guard = AbortOnDrop(task.abort_handle());

    match task.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(anyhow!("run panicked")),
        Err(err) => Err(anyhow!("run task failed: {err}")),
    }
}
