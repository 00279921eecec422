//! Submission controller: the lifecycle of "ask a question".
//!
//! `idle -> pending -> (succeeded | failed)`. Each attempt replaces the
//! previous attempt's terminal phase. Only one attempt may be pending.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use sqlagent_core::models::{QueryDetail, ThreadId};
use sqlagent_gateway::{GatewayError, QueryGateway};

use crate::cache::QueryCache;
use crate::error::SubmitError;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Pending {
        question: String,
    },
    Succeeded(QueryDetail),
    /// Keeps the question so the input is not lost.
    Failed {
        question: String,
        error: SubmitError,
    },
}

impl SubmissionPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug)]
struct Ticket {
    attempt: u64,
    question: String,
    thread_id: Option<ThreadId>,
}

#[derive(Debug, Default)]
struct SubmissionState {
    phase: SubmissionPhase,
    /// Carried into the next submission.
    thread_id: Option<ThreadId>,
    attempts: u64,
}

impl SubmissionState {
    fn begin(&mut self, question: &str) -> Result<Ticket, SubmitError> {
        if question.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.phase.is_pending() {
            return Err(SubmitError::AlreadyInProgress);
        }

        self.attempts += 1;
        self.phase = SubmissionPhase::Pending {
            question: question.to_string(),
        };
        Ok(Ticket {
            attempt: self.attempts,
            question: question.to_string(),
            thread_id: self.thread_id.clone(),
        })
    }

    /// Return an attempt whose caller went away to `Idle`, unless a newer
    /// attempt has started since.
    fn abandon(&mut self, attempt: u64) {
        if self.attempts == attempt && self.phase.is_pending() {
            warn!(attempt, "submission dropped before the backend answered");
            self.phase = SubmissionPhase::Idle;
        }
    }

    fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<QueryDetail, GatewayError>,
    ) -> Result<QueryDetail, SubmitError> {
        match result {
            Ok(detail) => {
                self.thread_id = detail.thread_id.clone();
                self.phase = SubmissionPhase::Succeeded(detail.clone());
                Ok(detail)
            }
            Err(e) => {
                let error = SubmitError::from(e);
                self.phase = SubmissionPhase::Failed {
                    question: ticket.question,
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }
}

/// Abandons the pending attempt if the submit future is dropped before
/// the outcome is recorded.
struct AttemptGuard {
    state: Arc<Mutex<SubmissionState>>,
    attempt: u64,
    armed: bool,
}

impl AttemptGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let attempt = self.attempt;
        match self.state.try_lock() {
            Ok(mut state) => state.abandon(attempt),
            Err(_) => {
                // Lock is only ever held briefly; finish the reset on the runtime.
                let state = Arc::clone(&self.state);
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move { state.lock().await.abandon(attempt) });
                }
            }
        }
    }
}

/// Owns the current submission attempt and the conversation thread.
pub struct SubmissionController<G> {
    cache: QueryCache<G>,
    state: Arc<Mutex<SubmissionState>>,
}

impl<G> Clone for SubmissionController<G> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<G: QueryGateway> SubmissionController<G> {
    pub fn new(cache: QueryCache<G>) -> Self {
        Self {
            cache,
            state: Arc::new(Mutex::new(SubmissionState::default())),
        }
    }

    /// Submit `question` in the current thread.
    ///
    /// On success the new detail is cached, the history listing is
    /// invalidated and the returned thread becomes the current one.
    pub async fn submit(&self, question: &str) -> Result<QueryDetail, SubmitError> {
        let ticket = self.state.lock().await.begin(question)?;
        let guard = AttemptGuard {
            state: Arc::clone(&self.state),
            attempt: ticket.attempt,
            armed: true,
        };
        info!(
            attempt = ticket.attempt,
            thread_id = ?ticket.thread_id.as_ref().map(ThreadId::as_str),
            "submitting question"
        );

        let result = self
            .cache
            .gateway()
            .submit(&ticket.question, ticket.thread_id.as_ref())
            .await;

        let attempt = ticket.attempt;
        let outcome = self.state.lock().await.complete(ticket, result);
        guard.disarm();
        match &outcome {
            Ok(detail) => {
                info!(attempt, id = %detail.id, status = %detail.status, "submission accepted");
                self.cache.put(detail.clone()).await;
                self.cache.invalidate_history().await;
            }
            Err(e) => warn!(attempt, error = %e, "submission failed"),
        }
        outcome
    }

    pub async fn phase(&self) -> SubmissionPhase {
        self.state.lock().await.phase.clone()
    }

    /// Thread the next submission will continue.
    pub async fn thread_id(&self) -> Option<ThreadId> {
        self.state.lock().await.thread_id.clone()
    }

    /// Override the carried thread; `None` starts a new conversation.
    pub async fn set_thread(&self, thread_id: Option<ThreadId>) {
        self.state.lock().await.thread_id = thread_id;
    }
}
