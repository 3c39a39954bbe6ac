// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the operation queue.

#![allow(clippy::unwrap_used)]

use super::*;
use crate::clock::ManualClock;
use crate::error::Error;
use tempfile::tempdir;

fn queue_at(start_ms: u64) -> (OperationQueue, Arc<ManualClock>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(start_ms));
    (OperationQueue::with_clock(db, clock.clone()), clock)
}

fn kinds(ops: &[PendingOperation]) -> Vec<OpKind> {
    ops.iter().map(|op| op.kind).collect()
}

#[test]
fn test_queue_starts_empty() {
    let (queue, _) = queue_at(1_000);
    assert!(queue.is_empty().unwrap());
    assert_eq!(queue.count().unwrap(), 0);
    assert!(queue.peek_all_ordered().unwrap().is_empty());
}

#[test]
fn test_enqueue_assigns_fresh_state() {
    let (queue, _) = queue_at(1_000);
    let op = queue.enqueue(OpKind::BookmarkAdd, "jp:food", None).unwrap();

    assert_eq!(op.kind, OpKind::BookmarkAdd);
    assert_eq!(op.target_key, "jp:food");
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.enqueued_at.timestamp_millis(), 1_000);
    assert!(op.last_attempt_at.is_none());
    assert!(op.last_error.is_none());

    // What enqueue returned is what is stored
    assert_eq!(queue.get(op.id).unwrap(), Some(op));
}

#[test]
fn test_enqueue_rejects_invalid_key() {
    let (queue, _) = queue_at(1_000);
    assert!(matches!(
        queue.enqueue(OpKind::BookmarkAdd, " ", None),
        Err(Error::InvalidKey(_))
    ));
    assert_eq!(queue.count().unwrap(), 0);
}

#[test]
fn test_enqueue_keeps_extra() {
    let (queue, _) = queue_at(1_000);
    let extra = serde_json::json!({"source": "detail_screen"});
    let op = queue.enqueue(OpKind::ContentUpdate, "jp:food", Some(extra.clone())).unwrap();

    let stored = queue.get(op.id).unwrap().unwrap();
    assert_eq!(stored.extra, Some(extra));
}

#[test]
fn test_peek_is_fifo_by_enqueue_time() {
    let (queue, clock) = queue_at(1_000);
    queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    clock.advance(10);
    queue.enqueue(OpKind::SaveOfflineAdd, "b:2", None).unwrap();
    clock.advance(10);
    queue.enqueue(OpKind::BookmarkRemove, "a:1", None).unwrap();

    let ops = queue.peek_all_ordered().unwrap();
    assert_eq!(
        kinds(&ops),
        vec![OpKind::BookmarkAdd, OpKind::SaveOfflineAdd, OpKind::BookmarkRemove]
    );
}

#[test]
fn test_peek_breaks_timestamp_ties_by_id() {
    let (queue, _) = queue_at(1_000);
    let first = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    let second = queue.enqueue(OpKind::BookmarkRemove, "a:1", None).unwrap();
    let third = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();

    let ids: Vec<OpId> = queue.peek_all_ordered().unwrap().iter().map(|op| op.id).collect();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
}

#[test]
fn test_peek_keeps_enqueue_order_when_clock_steps_back() {
    let (queue, clock) = queue_at(10_000);
    let add = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    clock.set(5_000);
    let remove = queue.enqueue(OpKind::BookmarkRemove, "a:1", None).unwrap();

    let ops = queue.peek_all_ordered().unwrap();
    assert_eq!(ops.iter().map(|op| op.id).collect::<Vec<_>>(), vec![add.id, remove.id]);
    assert_eq!(kinds(&ops), vec![OpKind::BookmarkAdd, OpKind::BookmarkRemove]);
}

#[test]
fn test_same_key_ops_are_not_coalesced() {
    let (queue, _) = queue_at(1_000);
    queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    queue.enqueue(OpKind::BookmarkRemove, "a:1", None).unwrap();

    assert_eq!(queue.count().unwrap(), 2);
    assert_eq!(queue.count_for_key("a:1").unwrap(), 2);
    assert_eq!(queue.count_for_key("b:2").unwrap(), 0);
}

#[test]
fn test_remove_deletes_once() {
    let (queue, _) = queue_at(1_000);
    let op = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();

    assert!(queue.remove(op.id).unwrap());
    assert!(!queue.remove(op.id).unwrap());
    assert!(queue.is_empty().unwrap());
}

#[test]
fn test_ids_are_never_reused() {
    let (queue, _) = queue_at(1_000);
    let first = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    queue.remove(first.id).unwrap();

    let second = queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    assert!(second.id > first.id);
}

#[test]
fn test_record_failure_bumps_retry_count() {
    let (queue, clock) = queue_at(1_000);
    let op = queue.enqueue(OpKind::SaveOfflineAdd, "a:1", None).unwrap();

    clock.advance(500);
    let updated = queue.record_failure(op.id, "connection reset").unwrap().unwrap();
    assert_eq!(updated.retry_count, 1);
    assert_eq!(updated.last_error.as_deref(), Some("connection reset"));
    assert_eq!(updated.last_attempt_at.unwrap().timestamp_millis(), 1_500);

    let updated = queue.record_failure(op.id, "conflict").unwrap().unwrap();
    assert_eq!(updated.retry_count, 2);
    assert_eq!(updated.last_error.as_deref(), Some("conflict"));

    // Order is unaffected by failures
    assert_eq!(updated.enqueued_at, op.enqueued_at);
}

#[test]
fn test_record_failure_on_missing_op() {
    let (queue, _) = queue_at(1_000);
    assert!(queue.record_failure(99, "gone").unwrap().is_none());
}

#[test]
fn test_queue_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("offline.db");

    {
        let queue = OperationQueue::new(Arc::new(Database::open(&path).unwrap()));
        queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
        queue.enqueue(OpKind::BookmarkRemove, "a:1", None).unwrap();
        let third = queue.enqueue(OpKind::SaveOfflineAdd, "b:2", None).unwrap();
        queue.record_failure(third.id, "timeout").unwrap();
    }

    let queue = OperationQueue::new(Arc::new(Database::open(&path).unwrap()));
    let ops = queue.peek_all_ordered().unwrap();
    assert_eq!(
        kinds(&ops),
        vec![OpKind::BookmarkAdd, OpKind::BookmarkRemove, OpKind::SaveOfflineAdd]
    );
    assert_eq!(ops[2].retry_count, 1);
}

#[test]
fn test_unknown_kind_is_corruption() {
    let (queue, _) = queue_at(1_000);
    queue.enqueue(OpKind::BookmarkAdd, "a:1", None).unwrap();
    {
        let conn = queue.db.lock().unwrap();
        conn.execute("UPDATE pending_ops SET kind = 'teleport'", []).unwrap();
    }

    assert!(matches!(queue.peek_all_ordered(), Err(Error::CorruptedData(_))));
}
