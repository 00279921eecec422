mod support;

use std::time::Duration;

use sqlagent_core::models::{QueryId, QueryStatus};
use sqlagent_gateway::GatewayError;
use sqlagent_session::{QueryCache, RefreshOutcome};

use support::{FakeGateway, answered, detail, record, wait_until};

#[tokio::test]
async fn put_then_get_returns_last_write() {
    let cache = QueryCache::new(FakeGateway::new());
    let id = QueryId::from("q1");

    cache.put(detail("q1", "first", QueryStatus::Pending)).await;
    let latest = answered("q1", "42");
    cache.put(latest.clone()).await;

    assert_eq!(cache.get(&id).await, Some(latest));
    assert_eq!(cache.get(&QueryId::from("q2")).await, None);
}

#[tokio::test]
async fn history_is_served_from_cache_until_invalidated() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q2", QueryStatus::Pending), record("q1", QueryStatus::Succeeded)]);
    let cache = QueryCache::new(gateway.clone());

    let first = cache.read_history().await.unwrap();
    let second = cache.read_history().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(gateway.list_calls(), 1);

    cache.invalidate_history().await;
    assert!(cache.history().await.stale);
    cache.read_history().await.unwrap();
    assert_eq!(gateway.list_calls(), 2);
    assert!(!cache.history().await.stale);
}

#[tokio::test]
async fn empty_listing_is_not_an_error() {
    let gateway = FakeGateway::new();
    let cache = QueryCache::new(gateway.clone());

    assert_eq!(
        cache.refresh_history().await.unwrap(),
        RefreshOutcome::Refreshed { count: 0 }
    );
    assert!(cache.read_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_merged_into_per_id_cache() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Running)]);
    let cache = QueryCache::new(gateway.clone());
    let id = QueryId::from("q1");

    cache.refresh_history().await.unwrap();

    let merged = cache.get(&id).await.unwrap();
    assert_eq!(merged.status, QueryStatus::Running);
    assert_eq!(merged.response_text, None);
    assert_eq!(cache.get_full(&id).await, None);
}

#[tokio::test]
async fn listing_keeps_full_detail_with_same_status() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Succeeded)]);
    let cache = QueryCache::new(gateway.clone());
    let full = answered("q1", "42");
    cache.put(full.clone()).await;

    cache.refresh_history().await.unwrap();
    assert_eq!(cache.get_full(&QueryId::from("q1")).await, Some(full));
}

#[tokio::test]
async fn listing_with_newer_status_replaces_cached_detail() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Failed)]);
    let cache = QueryCache::new(gateway.clone());
    cache.put(detail("q1", "q", QueryStatus::Pending)).await;

    cache.refresh_history().await.unwrap();
    let cached = cache.get(&QueryId::from("q1")).await.unwrap();
    assert_eq!(cached.status, QueryStatus::Failed);
}

#[tokio::test]
async fn overlapping_refresh_is_skipped() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Pending)]);
    let cache = QueryCache::new(gateway.clone());

    let release = gateway.hold_list();
    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh_history().await }
    });
    wait_until(|| gateway.list_calls() == 1).await;
    assert!(cache.is_refreshing());

    assert_eq!(cache.refresh_history().await.unwrap(), RefreshOutcome::Skipped);
    assert_eq!(gateway.list_calls(), 1);

    release.send(()).unwrap();
    assert_eq!(
        first.await.unwrap().unwrap(),
        RefreshOutcome::Refreshed { count: 1 }
    );
    assert!(!cache.is_refreshing());
}

#[tokio::test]
async fn read_waits_for_in_flight_refresh() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Pending)]);
    let cache = QueryCache::new(gateway.clone());

    let release = gateway.hold_list();
    let refresh = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh_history().await }
    });
    wait_until(|| gateway.list_calls() == 1).await;

    let read = tokio::spawn({
        let cache = cache.clone();
        async move { cache.read_history().await }
    });
    tokio::task::yield_now().await;
    release.send(()).unwrap();

    refresh.await.unwrap().unwrap();
    let records = read.await.unwrap().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(gateway.list_calls(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_listing() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Succeeded)]);
    let cache = QueryCache::new(gateway.clone());
    cache.refresh_history().await.unwrap();

    let error = GatewayError::Transport("connection reset".to_string());
    gateway.fail_listing(Some(error.clone()));
    assert_eq!(cache.refresh_history().await.unwrap_err(), error);

    let snapshot = cache.history().await;
    assert_eq!(snapshot.listing.unwrap().records.len(), 1);
    assert_eq!(snapshot.last_error, Some(error));

    gateway.fail_listing(None);
    cache.refresh_history().await.unwrap();
    assert_eq!(cache.history().await.last_error, None);
}

#[tokio::test]
async fn fetched_detail_is_cached() {
    let gateway = FakeGateway::new();
    gateway.set_detail(answered("q1", "42"));
    let cache = QueryCache::new(gateway.clone());
    let id = QueryId::from("q1");

    let fetched = cache.fetch_detail(&id).await.unwrap();
    assert_eq!(cache.get_full(&id).await, Some(fetched));

    let missing = cache.fetch_detail(&QueryId::from("nope")).await.unwrap_err();
    assert_eq!(
        missing,
        GatewayError::NotFound {
            id: QueryId::from("nope")
        }
    );
}

#[tokio::test(start_paused = true)]
async fn poll_tick_is_skipped_while_previous_poll_is_in_flight() {
    let gateway = FakeGateway::new();
    let cache = QueryCache::new(gateway.clone());
    let _subscription = cache.subscribe();

    let release = gateway.hold_list();
    let _poller = cache.poll_history(Duration::from_secs(10));

    // First tick fires one interval after start and hangs on the gate.
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(gateway.list_calls(), 1);

    // Ticks at 20s and 30s find it still in flight.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(gateway.list_calls(), 1);

    release.send(()).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn poller_is_idle_without_subscribers() {
    let gateway = FakeGateway::new();
    let cache = QueryCache::new(gateway.clone());
    let _poller = cache.poll_history(Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(32)).await;
    assert_eq!(gateway.list_calls(), 0);

    let subscription = cache.subscribe();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(gateway.list_calls(), 1);

    drop(subscription);
    assert_eq!(cache.subscriber_count(), 0);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(gateway.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_poller_cancels_polling() {
    let gateway = FakeGateway::new();
    let cache = QueryCache::new(gateway.clone());
    let _subscription = cache.subscribe();

    let poller = cache.poll_history(Duration::from_secs(5));
    assert!(poller.is_running());
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(gateway.list_calls(), 1);

    poller.stop();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(gateway.list_calls(), 1);
}

#[tokio::test]
async fn read_keeps_waiting_until_listing_is_fresh() {
    let gateway = FakeGateway::new();
    gateway.set_listing(vec![record("q1", QueryStatus::Pending)]);
    let cache = QueryCache::new(gateway.clone());

    // A refresh that starts before the invalidation cannot satisfy the read.
    let release_early = gateway.hold_list();
    let early = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh_history().await }
    });
    wait_until(|| gateway.list_calls() == 1).await;
    cache.invalidate_history().await;

    let read = tokio::spawn({
        let cache = cache.clone();
        async move { cache.read_history().await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    // Another refresh takes the slot as soon as the early one lands.
    let release_late = gateway.hold_list();
    release_early.send(()).unwrap();
    let late = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh_history().await }
    });
    wait_until(|| gateway.list_calls() == 2).await;
    early.await.unwrap().unwrap();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(!read.is_finished());

    gateway.set_listing(vec![record("q2", QueryStatus::Pending), record("q1", QueryStatus::Succeeded)]);
    release_late.send(()).unwrap();
    late.await.unwrap().unwrap();

    let records = read.await.unwrap().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, QueryId::from("q2"));
    assert_eq!(gateway.list_calls(), 2);
}
