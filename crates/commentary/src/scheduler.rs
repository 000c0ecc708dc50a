use std::future::Future;
use std::sync::Mutex;

use tokio::task::AbortHandle;
use tracing::debug;

/// Holds at most one pending comment-generation task.
///
/// Scheduling a new task aborts the prior one, which cancels both a delay
/// still waiting and a generation call already in flight (dropping the
/// future cancels the underlying request). Outcomes therefore serialize
/// through this single slot.
#[derive(Default)]
pub struct CommentScheduler {
    pending: Mutex<Option<AbortHandle>>,
}

impl CommentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts any pending task and spawns `task` in its place.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap();
        if let Some(prior) = pending.take() {
            if !prior.is_finished() {
                debug!("superseding pending comment generation");
            }
            prior.abort();
        }
        *pending = Some(tokio::spawn(task).abort_handle());
    }

    /// Aborts the pending task, if any.
    pub fn abort(&self) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            pending.abort();
        }
    }

    /// Whether a scheduled task is still running (or waiting on its delay).
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}
