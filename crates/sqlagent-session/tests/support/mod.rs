#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use sqlagent_core::models::{QueryDetail, QueryId, QueryRecord, QueryStatus, ThreadId};
use sqlagent_gateway::{GatewayError, QueryGateway};

/// Scripted in-memory gateway.
///
/// Each call can be held open with a gate (`hold_*`) until the returned
/// sender fires or is dropped. Responses are read after the gate opens, so
/// a test may change the scripted data while a call is held.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    listing: Vec<QueryRecord>,
    list_error: Option<GatewayError>,
    details: HashMap<QueryId, QueryDetail>,
    detail_errors: HashMap<QueryId, GatewayError>,
    submit_results: VecDeque<Result<QueryDetail, GatewayError>>,

    list_calls: usize,
    detail_calls: Vec<QueryId>,
    submit_calls: Vec<(String, Option<ThreadId>)>,

    list_gates: VecDeque<oneshot::Receiver<()>>,
    detail_gates: HashMap<QueryId, VecDeque<oneshot::Receiver<()>>>,
    submit_gates: VecDeque<oneshot::Receiver<()>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    // ── Scripting ────────────────────────────────────────────────────────────

    pub fn set_listing(&self, records: Vec<QueryRecord>) {
        self.lock().listing = records;
    }

    pub fn fail_listing(&self, error: Option<GatewayError>) {
        self.lock().list_error = error;
    }

    pub fn set_detail(&self, detail: QueryDetail) {
        let mut state = self.lock();
        state.detail_errors.remove(&detail.id);
        state.details.insert(detail.id.clone(), detail);
    }

    pub fn fail_detail(&self, id: &str, error: GatewayError) {
        self.lock().detail_errors.insert(QueryId::from(id), error);
    }

    pub fn push_submit(&self, result: Result<QueryDetail, GatewayError>) {
        self.lock().submit_results.push_back(result);
    }

    pub fn hold_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().list_gates.push_back(rx);
        tx
    }

    pub fn hold_detail(&self, id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .detail_gates
            .entry(QueryId::from(id))
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn hold_submit(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().submit_gates.push_back(rx);
        tx
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn detail_calls(&self) -> Vec<QueryId> {
        self.lock().detail_calls.clone()
    }

    pub fn submit_calls(&self) -> Vec<(String, Option<ThreadId>)> {
        self.lock().submit_calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        let state = self.lock();
        state.list_calls + state.detail_calls.len() + state.submit_calls.len()
    }
}

impl QueryGateway for FakeGateway {
    async fn submit(
        &self,
        question: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<QueryDetail, GatewayError> {
        let gate = {
            let mut state = self.lock();
            state
                .submit_calls
                .push((question.to_string(), thread_id.cloned()));
            state.submit_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut state = self.lock();
        let n = state.submit_calls.len();
        let result = state
            .submit_results
            .pop_front()
            .unwrap_or_else(|| Ok(detail(&format!("q{n}"), question, QueryStatus::Pending)));

        if let Ok(created) = &result {
            state.listing.insert(0, record_of(created));
            state.details.insert(created.id.clone(), created.clone());
        }
        result
    }

    async fn list_history(&self) -> Result<Vec<QueryRecord>, GatewayError> {
        let gate = {
            let mut state = self.lock();
            state.list_calls += 1;
            state.list_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let state = self.lock();
        match &state.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.listing.clone()),
        }
    }

    async fn fetch_detail(&self, id: &QueryId) -> Result<QueryDetail, GatewayError> {
        let gate = {
            let mut state = self.lock();
            state.detail_calls.push(id.clone());
            state
                .detail_gates
                .get_mut(id)
                .and_then(|gates| gates.pop_front())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let state = self.lock();
        if let Some(e) = state.detail_errors.get(id) {
            return Err(e.clone());
        }
        state
            .details
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound { id: id.clone() })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn timestamp(secs: i64) -> jiff::Timestamp {
    jiff::Timestamp::from_second(1_750_000_000 + secs).unwrap()
}

pub fn detail(id: &str, question: &str, status: QueryStatus) -> QueryDetail {
    QueryDetail {
        id: QueryId::from(id),
        question: question.to_string(),
        status,
        created_at: timestamp(0),
        response_text: None,
        error_message: None,
        thread_id: None,
        latency_seconds: None,
        updated_at: None,
        raw_result: None,
    }
}

pub fn answered(id: &str, text: &str) -> QueryDetail {
    QueryDetail {
        response_text: Some(text.to_string()),
        latency_seconds: Some(1.25),
        ..detail(id, "How many rows in orders?", QueryStatus::Succeeded)
    }
}

pub fn record(id: &str, status: QueryStatus) -> QueryRecord {
    QueryRecord {
        id: QueryId::from(id),
        question: format!("question {id}"),
        status,
        created_at: timestamp(0),
    }
}

pub fn record_of(detail: &QueryDetail) -> QueryRecord {
    QueryRecord {
        id: detail.id.clone(),
        question: detail.question.clone(),
        status: detail.status,
        created_at: detail.created_at,
    }
}

/// Yield to spawned tasks until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
