//! Speculative web search launched at turn start.
//!
//! The search runs on its own task under a child of the turn's cancellation
//! token. The coordinator later consumes the handle exactly once, either by
//! joining it (bounded) or by cancelling it.

use crate::error::{Result, SpeechError};
use crate::search::SearchBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::debug;

/// Handle to an in-flight speculative search. Dropping it aborts the
/// search task.
pub struct SpeculativeSearch {
    query: String,
    handle: Option<AbortOnDropHandle<Result<String>>>,
    cancel: CancellationToken,
}

impl SpeculativeSearch {
    /// Start searching for `query` immediately.
    ///
    /// Cancelling `turn_cancel` also cancels the search.
    pub fn spawn(
        backend: Arc<dyn SearchBackend>,
        query: impl Into<String>,
        turn_cancel: &CancellationToken,
    ) -> Self {
        let query = query.into();
        let cancel = turn_cancel.child_token();
        let token = cancel.clone();
        let task_query = query.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    Err(SpeechError::Search("speculative search cancelled".to_owned()))
                }
                result = backend.search(&task_query) => result,
            }
        });
        debug!(query = %query, "speculative search started");
        Self {
            query,
            handle: Some(AbortOnDropHandle::new(handle)),
            cancel,
        }
    }

    /// The heuristic query this search was started with.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Discard the search. A no-op if it already finished.
    pub fn cancel(mut self) {
        self.stop();
        debug!(query = %self.query, "speculative search discarded");
    }

    /// Wait up to `timeout` for the result. On timeout the search is
    /// cancelled and an error returned.
    ///
    /// # Errors
    ///
    /// Returns the search's own error, [`SpeechError::Search`] on timeout,
    /// or [`SpeechError::Pipeline`] if the task panicked.
    pub async fn join(mut self, timeout: Duration) -> Result<String> {
        let Some(mut handle) = self.handle.take() else {
            return Err(SpeechError::Pipeline("speculative search already consumed".to_owned()));
        };
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SpeechError::Pipeline(format!("speculative search task: {e}"))),
            Err(_) => {
                self.cancel.cancel();
                handle.abort();
                Err(SpeechError::Search(format!(
                    "speculative search timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    fn stop(&mut self) {
        self.cancel.cancel();
        self.handle.take();
    }
}
