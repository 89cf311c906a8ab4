//! Task execution pipeline
//!
//! Decouples request submission from resource-bound execution: a submitted
//! closure runs on a blocking worker, bounded by a semaphore, and its result
//! comes back through the awaited join handle, which is the single-fire
//! completion. A closure owns every resource it touches (manager internals,
//! payload documents) for its whole lifetime and releases them on return,
//! strictly before the completion resolves.
//!
//! Workers may block for the full duration of a directory open, reopen,
//! query, or segment merge; no timeout or cancellation is imposed here. A
//! panicking worker is caught at the task boundary and surfaced as
//! [`SearchdexError::Unknown`], never a crash of the pool.

use crate::error::SearchdexError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded dispatcher for blocking engine operations
#[derive(Clone)]
pub(crate) struct TaskPipeline {
    permits: Arc<Semaphore>,
}

impl TaskPipeline {
    /// Create a pipeline running at most `max_concurrent` tasks at once
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Run `task` on a worker and deliver its result exactly once
    pub(crate) async fn submit<T, F>(&self, task: F) -> Result<T, SearchdexError>
    where
        F: FnOnce() -> Result<T, SearchdexError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SearchdexError::unknown("task pipeline is closed"))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => Err(SearchdexError::unknown(format!(
                "worker task panicked: {join_err}"
            ))),
            Err(join_err) => Err(SearchdexError::unknown(format!(
                "worker task aborted: {join_err}"
            ))),
        }
    }
}
