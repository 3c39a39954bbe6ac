// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use bk_core::{Database, ManualClock, Payload};

use super::*;
use crate::test_helpers::{FlagReachability, MockRemote, RemoteCall};

const HOUR_MS: u64 = 60 * 60 * 1000;

struct Setup {
    clock: Arc<ManualClock>,
    cache: Arc<CacheStore>,
    queue: Arc<OperationQueue>,
    remote: Arc<MockRemote>,
    reachability: Arc<FlagReachability>,
    loader: ContentLoader<MockRemote>,
}

fn setup() -> Setup {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cache = Arc::new(CacheStore::with_clock(Arc::clone(&db), clock.clone()));
    let queue = Arc::new(OperationQueue::with_clock(db, clock.clone()));
    let remote = MockRemote::new();
    let reachability = FlagReachability::new(true);
    let loader = ContentLoader::new(
        Arc::clone(&cache),
        Arc::clone(&queue),
        Arc::clone(&remote),
        reachability.clone(),
        Duration::from_secs(10),
    )
    .with_clock(clock.clone());
    Setup {
        clock,
        cache,
        queue,
        remote,
        reachability,
        loader,
    }
}

#[tokio::test]
async fn fresh_cache_is_served_without_fetching() {
    let s = setup();
    s.cache
        .put(&EntryUpdate::new("jp:food", Payload::new("Food", "cached")))
        .unwrap();
    s.clock.advance(23 * HOUR_MS);

    let result = s.loader.load("jp:food").await.unwrap();

    assert_eq!(result.source, LoadSource::CacheFresh);
    assert_eq!(result.entry.unwrap().payload.body, "cached");
    assert!(s.remote.calls().is_empty());
}

#[tokio::test]
async fn stale_cache_is_refetched_when_reachable() {
    let s = setup();
    s.cache
        .put(&EntryUpdate::new("jp:food", Payload::new("Food", "old")).bookmarked(true))
        .unwrap();
    s.clock.advance(25 * HOUR_MS);
    s.remote.set_content("jp:food", Payload::new("Food", "new"));

    let result = s.loader.load("jp:food").await.unwrap();

    assert_eq!(result.source, LoadSource::Network);
    let entry = result.entry.unwrap();
    assert_eq!(entry.payload.body, "new");
    assert!(entry.bookmarked);
    assert_eq!(s.cache.get("jp:food").unwrap().unwrap().payload.body, "new");
    assert!(s.queue.is_empty().unwrap());
}

#[tokio::test]
async fn missing_entry_is_fetched() {
    let s = setup();
    s.remote.set_content("fr:cafe", Payload::new("Cafe", "Order at the bar"));

    let result = s.loader.load("fr:cafe").await.unwrap();

    assert_eq!(result.source, LoadSource::Network);
    assert_eq!(s.remote.calls(), vec![RemoteCall::Fetch("fr:cafe".into())]);
}

#[tokio::test]
async fn pinned_placeholder_is_not_fresh() {
    let s = setup();
    s.cache.set_pinned("fr:cafe", Some(true), None).unwrap();
    s.remote.set_content("fr:cafe", Payload::new("Cafe", "Order at the bar"));

    let result = s.loader.load("fr:cafe").await.unwrap();

    assert_eq!(result.source, LoadSource::Network);
    assert!(result.entry.unwrap().bookmarked);
}

#[tokio::test]
async fn offline_serves_stale_and_queues_refresh_once() {
    let s = setup();
    s.cache
        .put(&EntryUpdate::new("jp:food", Payload::new("Food", "old")))
        .unwrap();
    s.clock.advance(48 * HOUR_MS);
    s.reachability.set(false);

    let first = s.loader.load("jp:food").await.unwrap();
    let second = s.loader.load("jp:food").await.unwrap();

    assert_eq!(first.source, LoadSource::Offline);
    assert!(first.refresh_queued && second.refresh_queued);
    assert_eq!(first.entry.unwrap().payload.body, "old");
    let ops = s.queue.peek_all_ordered().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OpKind::ContentUpdate);
    assert!(s.remote.calls().is_empty());
}

#[tokio::test]
async fn fetch_failure_falls_back_to_cache() {
    let s = setup();
    s.cache
        .put(&EntryUpdate::new("jp:food", Payload::new("Food", "old")))
        .unwrap();
    s.clock.advance(48 * HOUR_MS);
    s.remote
        .fail_next("jp:food", RemoteError::Transport("reset".into()));

    let result = s.loader.load("jp:food").await.unwrap();

    assert_eq!(result.source, LoadSource::Offline);
    assert_eq!(result.entry.unwrap().payload.body, "old");
    assert_eq!(s.queue.count_for_key("jp:food").unwrap(), 1);
}

#[tokio::test]
async fn missing_entry_offline_yields_none() {
    let s = setup();
    s.reachability.set(false);

    let result = s.loader.load("it:greetings").await.unwrap();

    assert_eq!(result.source, LoadSource::Offline);
    assert!(result.entry.is_none());
    assert!(result.refresh_queued);
}

#[tokio::test]
async fn custom_staleness_window() {
    let s = setup();
    let loader = ContentLoader::new(
        Arc::clone(&s.cache),
        Arc::clone(&s.queue),
        Arc::clone(&s.remote),
        s.reachability.clone(),
        Duration::from_secs(10),
    )
    .with_clock(s.clock.clone())
    .with_stale_after(chrono::Duration::hours(1));
    s.cache
        .put(&EntryUpdate::new("jp:food", Payload::new("Food", "old")))
        .unwrap();
    s.clock.advance(2 * HOUR_MS);
    s.remote.set_content("jp:food", Payload::new("Food", "new"));

    let result = loader.load("jp:food").await.unwrap();
    assert_eq!(result.source, LoadSource::Network);
}

#[tokio::test]
async fn invalid_key_is_rejected() {
    let s = setup();
    assert!(s.loader.load("").await.is_err());
}

#[tokio::test]
async fn loader_shares_engine_stores() {
    let f = crate::test_helpers::Fixture::new();
    f.remote.set_content("jp:food", Payload::new("Food", "fetched"));
    let engine = f.engine();
    let loader = ContentLoader::for_engine(&engine);

    let result = loader.load("jp:food").await.unwrap();
    assert_eq!(result.source, LoadSource::Network);
    assert_eq!(f.cache.get("jp:food").unwrap().unwrap().payload.body, "fetched");
}
