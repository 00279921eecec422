//! History view model: the polled, ordered list of past queries plus the
//! selection key.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, info};

use sqlagent_core::models::{QueryId, QueryRecord};
use sqlagent_gateway::{GatewayError, QueryGateway};

use crate::cache::{HistorySnapshot, HistorySubscription, PollerHandle, QueryCache};

pub const HISTORY_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryState {
    /// Nothing fetched yet.
    Loading,
    /// The last fetch failed and there is no listing to fall back to.
    Error(GatewayError),
    /// A listing exists. It stays visible while a refresh runs or after a
    /// refresh fails.
    Ready {
        records: Vec<QueryRecord>,
        refreshing: bool,
        stale: bool,
    },
}

impl From<HistorySnapshot> for HistoryState {
    fn from(snapshot: HistorySnapshot) -> Self {
        match (snapshot.listing, snapshot.last_error) {
            (Some(listing), _) => HistoryState::Ready {
                records: listing.records,
                refreshing: snapshot.refreshing,
                stale: snapshot.stale,
            },
            (None, Some(e)) => HistoryState::Error(e),
            (None, None) => HistoryState::Loading,
        }
    }
}

/// Everything that runs on behalf of a mounted view. Dropping it stops
/// the poller and aborts background refreshes still in flight.
struct Mounted {
    _subscription: HistorySubscription,
    _poller: PollerHandle,
    background: JoinSet<()>,
}

pub struct HistoryView<G> {
    cache: QueryCache<G>,
    interval: Duration,
    selected: Arc<Mutex<Option<QueryId>>>,
    mounted: Arc<Mutex<Option<Mounted>>>,
}

impl<G> Clone for HistoryView<G> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            interval: self.interval,
            selected: Arc::clone(&self.selected),
            mounted: Arc::clone(&self.mounted),
        }
    }
}

impl<G: QueryGateway + 'static> HistoryView<G> {
    pub fn new(cache: QueryCache<G>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            selected: Arc::new(Mutex::new(None)),
            mounted: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to the cache, start polling and fetch immediately.
    /// Mounting an already mounted view only reports its state.
    pub async fn mount(&self) -> HistoryState {
        {
            let mut mounted = self.mounted.lock().await;
            if mounted.is_some() {
                drop(mounted);
                return self.state().await;
            }
            *mounted = Some(Mounted {
                _subscription: self.cache.subscribe(),
                _poller: self.cache.poll_history(self.interval),
                background: JoinSet::new(),
            });
        }
        info!(interval_secs = self.interval.as_secs(), "history mounted");

        self.refresh().await
    }

    /// Stop polling and cancel background refreshes. The cached listing
    /// is kept.
    pub async fn unmount(&self) {
        if self.mounted.lock().await.take().is_some() {
            info!("history unmounted");
        }
    }

    pub async fn is_mounted(&self) -> bool {
        self.mounted.lock().await.is_some()
    }

    /// Re-fetch now, unless a refresh is already in flight.
    pub async fn refresh(&self) -> HistoryState {
        if let Err(e) = self.cache.refresh_history().await {
            debug!(error = %e, "history refresh failed, keeping previous state");
        }
        self.state().await
    }

    /// Refresh without waiting, used after a submission lands. Does nothing
    /// unless mounted; the refresh is cancelled by [`HistoryView::unmount`].
    pub async fn refresh_in_background(&self) {
        let mut mounted = self.mounted.lock().await;
        let Some(mounted) = mounted.as_mut() else {
            return;
        };
        while mounted.background.try_join_next().is_some() {}

        let cache = self.cache.clone();
        mounted.background.spawn(async move {
            // Failures are recorded on the cache and logged there.
            let _ = cache.refresh_history().await;
        });
    }

    pub async fn state(&self) -> HistoryState {
        HistoryState::from(self.cache.history().await)
    }

    /// Notified whenever a refresh finishes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.cache.changes()
    }

    /// Update the selection key. Does not fetch anything.
    pub async fn select(&self, id: Option<QueryId>) {
        *self.selected.lock().await = id;
    }

    pub async fn selected(&self) -> Option<QueryId> {
        self.selected.lock().await.clone()
    }
}
