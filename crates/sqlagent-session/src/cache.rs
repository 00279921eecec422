//! Query cache: the single source of truth for every record the client
//! has fetched, keyed by id, plus the most recent history listing.
//!
//! # Freshness
//!
//! The listing carries the invalidation epoch it was fetched under.
//! [`QueryCache::invalidate_history`] bumps the epoch, so a listing whose
//! refresh started before an invalidation is still stale once it lands.
//!
//! # Refresh exclusion
//!
//! At most one listing call is in flight at a time, whoever issued it
//! (poller tick, mount, manual refresh). A refresh that finds another in
//! flight returns [`RefreshOutcome::Skipped`] without touching the network.
//!
//! # Listing merge
//!
//! Listed records are written into the per-id cache when the id is unknown
//! or the listed status differs from the cached one. A listing never
//! replaces a full detail whose status it agrees with.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use sqlagent_core::models::{QueryDetail, QueryId, QueryRecord};
use sqlagent_gateway::{GatewayError, QueryGateway};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ── Types ────────────────────────────────────────────────────────────────────

/// The last successfully fetched history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryListing {
    /// Newest first, exactly as the server ordered them.
    pub records: Vec<QueryRecord>,
    pub fetched_at: jiff::Timestamp,
}

/// Point-in-time view of the cached listing and its refresh status.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub listing: Option<HistoryListing>,
    /// No listing yet, or invalidated since it was fetched.
    pub stale: bool,
    pub refreshing: bool,
    /// Error of the most recent refresh, cleared by the next success.
    pub last_error: Option<GatewayError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { count: usize },
    /// Another refresh was already in flight; no call was made.
    Skipped,
}

struct CacheEntry {
    detail: QueryDetail,
    /// Written from a listing rather than a detail fetch or submission.
    summary_only: bool,
}

#[derive(Default)]
struct CacheState {
    details: HashMap<QueryId, CacheEntry>,
    listing: Option<HistoryListing>,
    epoch: u64,
    listing_epoch: u64,
    last_error: Option<GatewayError>,
}

impl CacheState {
    fn is_stale(&self) -> bool {
        self.listing.is_none() || self.listing_epoch != self.epoch
    }

    fn fresh_records(&self) -> Option<Vec<QueryRecord>> {
        match &self.listing {
            Some(listing) if !self.is_stale() => Some(listing.records.clone()),
            _ => None,
        }
    }

    fn merge_listing(&mut self, records: &[QueryRecord]) {
        for record in records {
            let replace = self
                .details
                .get(&record.id)
                .is_none_or(|cached| cached.detail.status != record.status);
            if replace {
                self.details.insert(
                    record.id.clone(),
                    CacheEntry {
                        detail: QueryDetail::from_record(record.clone()),
                        summary_only: true,
                    },
                );
            }
        }
    }
}

/// Clears the in-flight flag and announces the outcome, including when the
/// refresh future is dropped mid-call.
struct RefreshGuard {
    in_flight: Arc<AtomicBool>,
    revision: Arc<watch::Sender<u64>>,
}

impl RefreshGuard {
    fn acquire(in_flight: &Arc<AtomicBool>, revision: &Arc<watch::Sender<u64>>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                in_flight: Arc::clone(in_flight),
                revision: Arc::clone(revision),
            })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
        self.revision.send_modify(|rev| *rev += 1);
    }
}

/// Keeps the history poller active while held.
pub struct HistorySubscription {
    subscribers: Arc<AtomicUsize>,
}

impl Drop for HistorySubscription {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Running history poller. Dropping it stops the timer and aborts any
/// poll still in flight.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// Shared handle to the cache. Clones refer to the same records.
pub struct QueryCache<G> {
    gateway: Arc<G>,
    state: Arc<Mutex<CacheState>>,
    refresh_in_flight: Arc<AtomicBool>,
    subscribers: Arc<AtomicUsize>,
    revision: Arc<watch::Sender<u64>>,
}

impl<G> Clone for QueryCache<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            state: Arc::clone(&self.state),
            refresh_in_flight: Arc::clone(&self.refresh_in_flight),
            subscribers: Arc::clone(&self.subscribers),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<G: QueryGateway> QueryCache<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            gateway,
            state: Arc::new(Mutex::new(CacheState::default())),
            refresh_in_flight: Arc::new(AtomicBool::new(false)),
            subscribers: Arc::new(AtomicUsize::new(0)),
            revision: Arc::new(revision),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Cached detail for `id`, whatever wrote it.
    pub async fn get(&self, id: &QueryId) -> Option<QueryDetail> {
        let state = self.state.lock().await;
        state.details.get(id).map(|entry| entry.detail.clone())
    }

    /// Cached detail for `id` only if it came from a detail fetch or a
    /// submission, not from a listing.
    pub async fn get_full(&self, id: &QueryId) -> Option<QueryDetail> {
        let state = self.state.lock().await;
        state
            .details
            .get(id)
            .filter(|entry| !entry.summary_only)
            .map(|entry| entry.detail.clone())
    }

    /// Insert or overwrite by id. Last write wins.
    pub async fn put(&self, detail: QueryDetail) {
        let mut state = self.state.lock().await;
        trace!(id = %detail.id, status = %detail.status, "caching detail");
        state.details.insert(
            detail.id.clone(),
            CacheEntry {
                detail,
                summary_only: false,
            },
        );
    }

    /// Mark the listing stale so the next read goes through the gateway.
    pub async fn invalidate_history(&self) {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        debug!(epoch = state.epoch, "history invalidated");
    }

    pub async fn history(&self) -> HistorySnapshot {
        let state = self.state.lock().await;
        HistorySnapshot {
            listing: state.listing.clone(),
            stale: state.is_stale(),
            refreshing: self.is_refreshing(),
            last_error: state.last_error.clone(),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight.load(Ordering::Acquire)
    }

    /// Revision counter bumped whenever a listing refresh finishes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Re-fetch the listing unless a refresh is already in flight.
    pub async fn refresh_history(&self) -> Result<RefreshOutcome, GatewayError> {
        let Some(_guard) = RefreshGuard::acquire(&self.refresh_in_flight, &self.revision) else {
            debug!("history refresh already in flight, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let started_epoch = self.state.lock().await.epoch;
        let result = self.gateway.list_history().await;

        let mut state = self.state.lock().await;
        match result {
            Ok(records) => {
                let count = records.len();
                state.merge_listing(&records);
                state.listing = Some(HistoryListing {
                    records,
                    fetched_at: jiff::Timestamp::now(),
                });
                state.listing_epoch = started_epoch;
                state.last_error = None;
                debug!(count, stale = state.is_stale(), "history refreshed");
                Ok(RefreshOutcome::Refreshed { count })
            }
            Err(e) => {
                warn!(error = %e, has_listing = state.listing.is_some(), "history refresh failed");
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// The listing, from cache when fresh, otherwise through the gateway.
    ///
    /// If a refresh is already in flight this waits for it rather than
    /// issuing a second call, and keeps waiting while refreshes that
    /// predate an invalidation land.
    pub async fn read_history(&self) -> Result<Vec<QueryRecord>, GatewayError> {
        loop {
            if let Some(records) = self.state.lock().await.fresh_records() {
                return Ok(records);
            }

            let mut changes = self.revision.subscribe();
            match self.refresh_history().await? {
                RefreshOutcome::Refreshed { .. } => {
                    let state = self.state.lock().await;
                    return Ok(state
                        .listing
                        .as_ref()
                        .map(|listing| listing.records.clone())
                        .unwrap_or_default());
                }
                RefreshOutcome::Skipped => {
                    if self.is_refreshing() {
                        let _ = changes.changed().await;
                    }
                }
            }
        }
    }

    /// Fetch one detail through the gateway and cache it.
    pub async fn fetch_detail(&self, id: &QueryId) -> Result<QueryDetail, GatewayError> {
        let detail = self.gateway.fetch_detail(id).await?;
        self.put(detail.clone()).await;
        Ok(detail)
    }

    pub fn subscribe(&self) -> HistorySubscription {
        self.subscribers.fetch_add(1, Ordering::AcqRel);
        HistorySubscription {
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }
}

impl<G: QueryGateway + 'static> QueryCache<G> {
    /// Re-fetch the listing every `interval` while at least one
    /// [`HistorySubscription`] is alive.
    ///
    /// The first tick fires one interval after start. A tick that finds a
    /// poll still in flight is skipped, never queued.
    pub fn poll_history(&self, interval: Duration) -> PollerHandle {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let cache = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut polls = JoinSet::new();

            loop {
                ticker.tick().await;
                while polls.try_join_next().is_some() {}

                if cache.subscriber_count() == 0 {
                    trace!("no history subscribers, idle tick");
                    continue;
                }
                if cache.is_refreshing() {
                    debug!("history poll still in flight, skipping tick");
                    continue;
                }

                let cache = cache.clone();
                polls.spawn(async move {
                    // Failures are recorded on the cache and logged there.
                    let _ = cache.refresh_history().await;
                });
            }
        });

        info!(interval_secs = interval.as_secs(), "history poller started");
        PollerHandle { task }
    }
}
