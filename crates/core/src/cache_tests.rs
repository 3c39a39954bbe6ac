// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::clock::ManualClock;
use crate::error::Error;
use yare::parameterized;

const HOUR_MS: u64 = 60 * 60 * 1000;

fn store_at(start_ms: u64) -> (CacheStore, Arc<ManualClock>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(start_ms));
    (CacheStore::with_clock(db, clock.clone()), clock)
}

fn payload(title: &str) -> Payload {
    Payload::new(title, format!("{title} body"))
}

#[test]
fn put_then_get_roundtrips_payload() {
    let (store, _) = store_at(1_000);
    let mut body = payload("Greetings");
    body.dos = vec!["Bow slightly".into()];
    body.donts = vec!["Tip".into()];

    store.put(&EntryUpdate::new("jp:etiquette", body.clone())).unwrap();

    let entry = store.get("jp:etiquette").unwrap().unwrap();
    assert_eq!(entry.payload, body);
    assert_eq!(entry.last_updated.timestamp_millis(), 1_000);
    assert!(!entry.pinned());
    assert!(!entry.synced);
}

#[test]
fn get_missing_returns_none() {
    let (store, _) = store_at(1_000);
    assert!(store.get("nowhere:nothing").unwrap().is_none());
}

#[test]
fn put_overwrites_payload_but_preserves_flags() {
    let (store, clock) = store_at(1_000);
    store.put(&EntryUpdate::new("jp:food", payload("Old")).bookmarked(true).synced(true)).unwrap();

    clock.advance(5_000);
    store.put(&EntryUpdate::new("jp:food", payload("New"))).unwrap();

    let entry = store.get("jp:food").unwrap().unwrap();
    assert_eq!(entry.payload.title, "New");
    assert_eq!(entry.last_updated.timestamp_millis(), 6_000);
    assert!(entry.bookmarked);
    assert!(entry.pinned());
    assert!(entry.synced);
}

#[test]
fn put_with_explicit_flags_overrides() {
    let (store, _) = store_at(1_000);
    store.put(&EntryUpdate::new("jp:food", payload("A")).bookmarked(true)).unwrap();
    store
        .put(&EntryUpdate::new("jp:food", payload("B")).bookmarked(false).saved_offline(true))
        .unwrap();

    let entry = store.get("jp:food").unwrap().unwrap();
    assert!(!entry.bookmarked);
    assert!(entry.saved_offline);
    assert!(entry.pinned());
}

#[test]
fn put_rejects_invalid_key() {
    let (store, _) = store_at(1_000);
    let result = store.put(&EntryUpdate::new("", payload("A")));
    assert!(matches!(result, Err(Error::InvalidKey(_))));
}

#[test]
fn set_pinned_creates_placeholder() {
    let (store, _) = store_at(1_000);
    let entry = store.set_pinned("it:museums", Some(true), None).unwrap();

    assert!(entry.bookmarked);
    assert!(!entry.saved_offline);
    assert!(entry.pinned());
    assert!(entry.payload.is_empty());
    assert!(!entry.synced);
}

#[test]
fn set_pinned_keeps_payload_and_clears_synced() {
    let (store, _) = store_at(1_000);
    store.put(&EntryUpdate::new("it:museums", payload("Uffizi")).synced(true)).unwrap();

    let entry = store.set_pinned("it:museums", None, Some(true)).unwrap();
    assert_eq!(entry.payload.title, "Uffizi");
    assert!(entry.saved_offline);
    assert!(!entry.synced);
}

#[parameterized(
    bookmark_only = { Some(true), None, true },
    save_only = { None, Some(true), true },
    clear_bookmark_keeps_save = { Some(false), None, true },
    clear_both = { Some(false), Some(false), false },
)]
fn set_pinned_recomputes_or(bookmarked: Option<bool>, saved_offline: Option<bool>, pinned: bool) {
    let (store, _) = store_at(1_000);
    // Start with both flags on
    store.set_pinned("fr:wine", Some(true), Some(true)).unwrap();

    let entry = store.set_pinned("fr:wine", bookmarked, saved_offline).unwrap();
    assert_eq!(entry.pinned(), pinned);
    assert_eq!(store.list_pinned().unwrap().len(), usize::from(pinned));
}

#[test]
fn mark_synced_sets_flag() {
    let (store, _) = store_at(1_000);
    store.set_pinned("fr:wine", Some(true), None).unwrap();

    assert!(store.mark_synced("fr:wine").unwrap());
    assert!(store.get("fr:wine").unwrap().unwrap().synced);
}

#[test]
fn mark_synced_missing_key_is_false() {
    let (store, _) = store_at(1_000);
    assert!(!store.mark_synced("fr:wine").unwrap());
}

#[test]
fn evict_stale_never_removes_pinned() {
    let (store, clock) = store_at(0);
    store.put(&EntryUpdate::new("old:plain", payload("Plain"))).unwrap();
    store.set_pinned("old:bookmarked", Some(true), None).unwrap();
    store.set_pinned("old:saved", None, Some(true)).unwrap();

    clock.advance(1_000 * HOUR_MS);
    store.put(&EntryUpdate::new("new:plain", payload("Fresh"))).unwrap();

    // Cutoff far in the future: everything is "old"
    let removed = store.evict_stale(clock.now() + chrono::Duration::days(365)).unwrap();
    assert_eq!(removed, 2);

    let keys: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["old:bookmarked".to_string(), "old:saved".to_string()]);
}

#[test]
fn evict_stale_respects_cutoff() {
    let (store, clock) = store_at(0);
    store.put(&EntryUpdate::new("a:old", payload("Old"))).unwrap();
    clock.advance(2 * HOUR_MS);
    store.put(&EntryUpdate::new("b:new", payload("New"))).unwrap();

    let cutoff = crate::clock::from_millis(HOUR_MS);
    assert_eq!(store.evict_stale(cutoff).unwrap(), 1);
    assert!(store.get("a:old").unwrap().is_none());
    assert!(store.get("b:new").unwrap().is_some());
}

#[test]
fn evict_stale_is_strictly_older_than() {
    let (store, clock) = store_at(5_000);
    store.put(&EntryUpdate::new("a:edge", payload("Edge"))).unwrap();

    assert_eq!(store.evict_stale(clock.now()).unwrap(), 0);
    assert!(store.get("a:edge").unwrap().is_some());
}

#[test]
fn unpinned_entry_becomes_evictable() {
    let (store, clock) = store_at(0);
    store.set_pinned("jp:food", Some(true), None).unwrap();
    store.set_pinned("jp:food", Some(false), None).unwrap();

    clock.advance(HOUR_MS);
    assert_eq!(store.evict_stale(clock.now()).unwrap(), 1);
    assert!(store.is_empty().unwrap());
}

#[test]
fn list_all_orders_by_key() {
    let (store, _) = store_at(1_000);
    for key in ["c:3", "a:1", "b:2"] {
        store.put(&EntryUpdate::new(key, payload(key))).unwrap();
    }

    let keys: Vec<String> = store.list_all().unwrap().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["a:1", "b:2", "c:3"]);
    assert_eq!(store.len().unwrap(), 3);
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline.db");

    {
        let store = CacheStore::new(Arc::new(Database::open(&path).unwrap()));
        store.put(&EntryUpdate::new("pe:markets", payload("Markets")).saved_offline(true)).unwrap();
    }

    let store = CacheStore::new(Arc::new(Database::open(&path).unwrap()));
    let entry = store.get("pe:markets").unwrap().unwrap();
    assert_eq!(entry.payload.title, "Markets");
    assert!(entry.saved_offline);
}

#[test]
fn corrupted_payload_is_reported() {
    let (store, _) = store_at(1_000);
    store.put(&EntryUpdate::new("pe:markets", payload("Markets"))).unwrap();
    {
        let conn = store.db.lock().unwrap();
        conn.execute("UPDATE cache_entries SET payload = '{oops' WHERE key = 'pe:markets'", [])
            .unwrap();
    }

    assert!(matches!(store.get("pe:markets"), Err(Error::CorruptedData(_))));
}
