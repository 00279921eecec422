//! Result view model: the one detail shown in the result pane.
//!
//! Every activation issues exactly one authoritative fetch, tagged with the
//! activation generation. A response is applied only if its tag still
//! matches the current generation when it lands; anything else is a stale
//! response from an earlier activation and is discarded.
//!
//! A provisional detail (the just-submitted one, or a full detail already
//! cached) is displayed immediately. The fetched detail always supersedes
//! it, never the reverse.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use sqlagent_core::models::{QueryDetail, QueryId, QueryStatus, ThreadId};
use sqlagent_gateway::{GatewayError, QueryGateway};

use crate::cache::QueryCache;

/// Shown for a failed query that carries no error message.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred.";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Resolution {
    /// No active id.
    #[default]
    Empty,
    /// Active id with nothing to show yet.
    Loading,
    Provisional(QueryDetail),
    Confirmed(QueryDetail),
    /// The authoritative fetch failed.
    Failed(GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The active id changed while the fetch was in flight.
    Stale,
}

/// Body of the result pane.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    Empty,
    Loading,
    Answer(String),
    /// The query itself failed on the server.
    QueryFailed(String),
    /// Not succeeded yet, or succeeded without text.
    NoAnswerYet,
    /// The detail could not be loaded.
    Unavailable(GatewayError),
}

/// Supplementary fields, shown regardless of status.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMeta {
    pub id: QueryId,
    pub question: String,
    pub status: QueryStatus,
    pub created_at: jiff::Timestamp,
    pub latency_seconds: Option<f64>,
    pub thread_id: Option<ThreadId>,
    /// Not yet confirmed by a fetch.
    pub provisional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultDisplay {
    pub body: ResultBody,
    pub meta: Option<ResultMeta>,
}

impl ResultDisplay {
    fn bare(body: ResultBody) -> Self {
        Self { body, meta: None }
    }

    pub fn for_detail(detail: &QueryDetail, provisional: bool) -> Self {
        let body = match (detail.status, &detail.response_text) {
            (QueryStatus::Failed, _) => ResultBody::QueryFailed(
                detail
                    .error_message
                    .clone()
                    .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            ),
            (QueryStatus::Succeeded, Some(text)) => ResultBody::Answer(text.clone()),
            _ => ResultBody::NoAnswerYet,
        };

        Self {
            body,
            meta: Some(ResultMeta {
                id: detail.id.clone(),
                question: detail.question.clone(),
                status: detail.status,
                created_at: detail.created_at,
                latency_seconds: detail.latency_seconds,
                thread_id: detail.thread_id.clone(),
                provisional,
            }),
        }
    }
}

#[derive(Debug)]
struct FetchTag {
    id: QueryId,
    generation: u64,
}

#[derive(Debug, Default)]
struct ResultState {
    active: Option<QueryId>,
    generation: u64,
    resolution: Resolution,
}

impl ResultState {
    fn activate(&mut self, id: QueryId, provisional: Option<QueryDetail>) -> FetchTag {
        self.generation += 1;
        let same_id = self.active.as_ref() == Some(&id);
        let provisional = provisional.filter(|detail| detail.id == id);

        let keep_current = same_id
            && match &self.resolution {
                Resolution::Confirmed(_) => true,
                Resolution::Provisional(_) => provisional.is_none(),
                _ => false,
            };
        if !keep_current {
            self.resolution = match provisional {
                Some(detail) => Resolution::Provisional(detail),
                None => Resolution::Loading,
            };
        }

        self.active = Some(id.clone());
        FetchTag {
            id,
            generation: self.generation,
        }
    }

    fn resolve(&mut self, tag: &FetchTag, result: Result<QueryDetail, GatewayError>) -> FetchOutcome {
        if tag.generation != self.generation || self.active.as_ref() != Some(&tag.id) {
            return FetchOutcome::Stale;
        }

        self.resolution = match result {
            Ok(detail) => Resolution::Confirmed(detail),
            Err(e) => Resolution::Failed(e),
        };
        FetchOutcome::Applied
    }

    fn clear(&mut self) {
        // Also invalidates whatever fetch is still in flight.
        self.generation += 1;
        self.active = None;
        self.resolution = Resolution::Empty;
    }

    fn display(&self) -> ResultDisplay {
        match &self.resolution {
            Resolution::Empty => ResultDisplay::bare(ResultBody::Empty),
            Resolution::Loading => ResultDisplay::bare(ResultBody::Loading),
            Resolution::Provisional(detail) => ResultDisplay::for_detail(detail, true),
            Resolution::Confirmed(detail) => ResultDisplay::for_detail(detail, false),
            Resolution::Failed(e) => ResultDisplay::bare(ResultBody::Unavailable(e.clone())),
        }
    }
}

pub struct ResultView<G> {
    cache: QueryCache<G>,
    state: Arc<Mutex<ResultState>>,
}

impl<G> Clone for ResultView<G> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<G: QueryGateway> ResultView<G> {
    pub fn new(cache: QueryCache<G>) -> Self {
        Self {
            cache,
            state: Arc::new(Mutex::new(ResultState::default())),
        }
    }

    /// Make `id` the active record and fetch its authoritative detail.
    ///
    /// `submitted` is the detail just returned by a submission, if any;
    /// otherwise a full cached detail is used as the provisional display.
    /// Resolves once the fetch has been applied or discarded.
    pub async fn activate(&self, id: QueryId, submitted: Option<QueryDetail>) -> FetchOutcome {
        let provisional = match submitted {
            Some(detail) => Some(detail),
            None => self.cache.get_full(&id).await,
        };
        let tag = self.state.lock().await.activate(id, provisional);
        debug!(id = %tag.id, generation = tag.generation, "fetching active detail");

        let result = self.cache.fetch_detail(&tag.id).await;
        if let Err(e) = &result {
            warn!(id = %tag.id, error = %e, "detail fetch failed");
        }

        let outcome = self.state.lock().await.resolve(&tag, result);
        if outcome == FetchOutcome::Stale {
            debug!(id = %tag.id, generation = tag.generation, "discarding stale detail response");
        }
        outcome
    }

    /// No active id: neutral state, no network activity.
    pub async fn clear(&self) {
        self.state.lock().await.clear();
    }

    pub async fn active_id(&self) -> Option<QueryId> {
        self.state.lock().await.active.clone()
    }

    pub async fn resolution(&self) -> Resolution {
        self.state.lock().await.resolution.clone()
    }

    pub async fn display(&self) -> ResultDisplay {
        self.state.lock().await.display()
    }
}
