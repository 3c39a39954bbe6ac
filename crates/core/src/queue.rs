// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue of pending mutations.
//!
//! Each enqueue is committed before returning. Operations come back out in
//! enqueue order. The order follows the AUTOINCREMENT id rather than the
//! wall-clock `enqueued_at`, so a clock stepping backwards between two taps
//! cannot replay a `BookmarkRemove` ahead of the `BookmarkAdd` it follows.

use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::clock::{ClockSource, SystemClock};
use crate::db::{format_timestamp, parse_db, parse_json, parse_timestamp, Database};
use crate::entry::validate_key;
use crate::error::Result;
use crate::op::{OpId, OpKind, PendingOperation};

const OP_COLUMNS: &str =
    "id, kind, target_key, extra, enqueued_at, retry_count, last_attempt_at, last_error";

fn row_to_op(row: &Row) -> std::result::Result<PendingOperation, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let extra: Option<String> = row.get(3)?;
    let enqueued_at: String = row.get(4)?;
    let last_attempt_at: Option<String> = row.get(6)?;
    Ok(PendingOperation {
        id: row.get(0)?,
        kind: parse_db(&kind, "kind")?,
        target_key: row.get(2)?,
        extra: extra.map(|s| parse_json(&s, "extra")).transpose()?,
        enqueued_at: parse_timestamp(&enqueued_at, "enqueued_at")?,
        retry_count: row.get(5)?,
        last_attempt_at: last_attempt_at
            .map(|s| parse_timestamp(&s, "last_attempt_at"))
            .transpose()?,
        last_error: row.get(7)?,
    })
}

/// Durable, ordered queue of pending operations with retry bookkeeping.
pub struct OperationQueue {
    db: Arc<Database>,
    clock: Arc<dyn ClockSource>,
}

impl OperationQueue {
    /// Creates a queue over the given database using the system clock.
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Creates a queue with a custom clock source.
    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn ClockSource>) -> Self {
        OperationQueue { db, clock }
    }

    /// Appends an operation with a fresh id and the current timestamp.
    ///
    /// The row is committed before this returns.
    pub fn enqueue(
        &self,
        kind: OpKind,
        target_key: &str,
        extra: Option<serde_json::Value>,
    ) -> Result<PendingOperation> {
        validate_key(target_key)?;
        let extra_json = extra.as_ref().map(serde_json::to_string).transpose()?;
        let now = self.clock.now();

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO pending_ops (kind, target_key, extra, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), target_key, extra_json, format_timestamp(&now)],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(id, %kind, target_key, "enqueued operation");

        Ok(PendingOperation {
            id,
            kind,
            target_key: target_key.to_string(),
            extra,
            enqueued_at: now,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        })
    }

    /// Returns every pending operation in FIFO order.
    pub fn peek_all_ordered(&self) -> Result<Vec<PendingOperation>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OP_COLUMNS} FROM pending_ops ORDER BY id ASC"
        ))?;
        let ops = stmt
            .query_map([], row_to_op)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// Looks up a single operation.
    pub fn get(&self, id: OpId) -> Result<Option<PendingOperation>> {
        let conn = self.db.lock()?;
        let op = conn
            .query_row(
                &format!("SELECT {OP_COLUMNS} FROM pending_ops WHERE id = ?1"),
                params![id],
                row_to_op,
            )
            .optional()?;
        Ok(op)
    }

    /// Deletes an operation. Returns false if it was already gone.
    pub fn remove(&self, id: OpId) -> Result<bool> {
        let conn = self.db.lock()?;
        let removed = conn.execute("DELETE FROM pending_ops WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Records a failed attempt: bumps `retry_count` and stores the error.
    ///
    /// Returns the updated operation, or `None` if it no longer exists.
    pub fn record_failure(&self, id: OpId, error: &str) -> Result<Option<PendingOperation>> {
        let now = self.clock.now();
        let conn = self.db.lock()?;
        let changed = conn.execute(
            "UPDATE pending_ops
             SET retry_count = retry_count + 1, last_attempt_at = ?2, last_error = ?3
             WHERE id = ?1",
            params![id, format_timestamp(&now), error],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let op = conn.query_row(
            &format!("SELECT {OP_COLUMNS} FROM pending_ops WHERE id = ?1"),
            params![id],
            row_to_op,
        )?;
        Ok(Some(op))
    }

    /// Number of pending operations.
    pub fn count(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_ops", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of pending operations targeting one key.
    pub fn count_for_key(&self, target_key: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_ops WHERE target_key = ?1",
            params![target_key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
