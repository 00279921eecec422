use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use sqlagent_core::models::{QueryDetail, QueryId, ThreadId};
use sqlagent_gateway::QueryGateway;

use crate::cache::QueryCache;
use crate::error::SubmitError;
use crate::history::{HISTORY_POLL_INTERVAL, HistoryState, HistoryView};
use crate::result::{FetchOutcome, ResultDisplay, ResultView};
use crate::submission::{SubmissionController, SubmissionPhase};

/// Owns the cache and the three consumers built on it.
///
/// Create one per application run and hand clones to whatever renders it;
/// clones share all state. Call [`Explorer::shutdown`] on exit.
pub struct Explorer<G> {
    cache: QueryCache<G>,
    submission: SubmissionController<G>,
    history: HistoryView<G>,
    result: ResultView<G>,
}

impl<G> Clone for Explorer<G> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            submission: self.submission.clone(),
            history: self.history.clone(),
            result: self.result.clone(),
        }
    }
}

impl<G: QueryGateway + 'static> Explorer<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_poll_interval(gateway, HISTORY_POLL_INTERVAL)
    }

    pub fn with_poll_interval(gateway: Arc<G>, interval: Duration) -> Self {
        let cache = QueryCache::new(gateway);
        Self {
            submission: SubmissionController::new(cache.clone()),
            history: HistoryView::new(cache.clone(), interval),
            result: ResultView::new(cache.clone()),
            cache,
        }
    }

    pub fn cache(&self) -> &QueryCache<G> {
        &self.cache
    }

    pub fn submission(&self) -> &SubmissionController<G> {
        &self.submission
    }

    pub fn history(&self) -> &HistoryView<G> {
        &self.history
    }

    pub fn result(&self) -> &ResultView<G> {
        &self.result
    }

    /// Submit a question and make its record the active one.
    ///
    /// The returned detail is displayed at once; this resolves after the
    /// authoritative re-fetch of that record has been applied or discarded.
    pub async fn submit(&self, question: &str) -> Result<QueryDetail, SubmitError> {
        let detail = self.submission.submit(question).await?;

        self.history.refresh_in_background().await;
        self.history.select(Some(detail.id.clone())).await;
        self.result
            .activate(detail.id.clone(), Some(detail.clone()))
            .await;
        Ok(detail)
    }

    /// Select a history entry and show its detail.
    pub async fn select(&self, id: QueryId) -> FetchOutcome {
        self.history.select(Some(id.clone())).await;
        self.result.activate(id, None).await
    }

    pub async fn clear_selection(&self) {
        self.history.select(None).await;
        self.result.clear().await;
    }

    pub async fn mount_history(&self) -> HistoryState {
        self.history.mount().await
    }

    pub async fn set_thread(&self, thread_id: Option<ThreadId>) {
        self.submission.set_thread(thread_id).await;
    }

    pub async fn thread_id(&self) -> Option<ThreadId> {
        self.submission.thread_id().await
    }

    pub async fn submission_phase(&self) -> SubmissionPhase {
        self.submission.phase().await
    }

    pub async fn history_state(&self) -> HistoryState {
        self.history.state().await
    }

    pub async fn selected_id(&self) -> Option<QueryId> {
        self.history.selected().await
    }

    pub async fn result_display(&self) -> ResultDisplay {
        self.result.display().await
    }

    pub fn history_changes(&self) -> watch::Receiver<u64> {
        self.history.changes()
    }

    /// Stop polling. Pending polls and background refreshes are cancelled.
    pub async fn shutdown(&self) {
        self.history.unmount().await;
        info!("explorer shut down");
    }
}
