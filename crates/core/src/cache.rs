// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local store of content snapshots.
//!
//! The cache never talks to the network and never retries: storage errors go
//! straight back to the caller. Eviction only ever removes unpinned entries.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::clock::{ClockSource, SystemClock};
use crate::db::{format_timestamp, parse_json, parse_timestamp, Database};
use crate::entry::{validate_key, CacheEntry, EntryUpdate, Payload};
use crate::error::Result;

const ENTRY_COLUMNS: &str =
    "key, payload, last_updated, bookmarked, saved_offline, synced";

fn row_to_entry(row: &Row) -> std::result::Result<CacheEntry, rusqlite::Error> {
    let payload: String = row.get(1)?;
    let last_updated: String = row.get(2)?;
    Ok(CacheEntry {
        key: row.get(0)?,
        payload: parse_json(&payload, "payload")?,
        last_updated: parse_timestamp(&last_updated, "last_updated")?,
        bookmarked: row.get(3)?,
        saved_offline: row.get(4)?,
        synced: row.get(5)?,
    })
}

/// Durable key/value store of content snapshots with pin and sync metadata.
pub struct CacheStore {
    db: Arc<Database>,
    clock: Arc<dyn ClockSource>,
}

impl CacheStore {
    /// Creates a store over the given database using the system clock.
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Creates a store with a custom clock source.
    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn ClockSource>) -> Self {
        CacheStore { db, clock }
    }

    /// Upserts an entry by key.
    ///
    /// The payload and `last_updated` are always overwritten. Pin and sync
    /// flags keep their stored values unless the update supplies them.
    pub fn put(&self, update: &EntryUpdate) -> Result<CacheEntry> {
        validate_key(&update.key)?;
        let payload = serde_json::to_string(&update.payload)?;
        let now = self.clock.now();

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO cache_entries (key, payload, last_updated, bookmarked, saved_offline, pinned, synced)
             VALUES (?1, ?2, ?3, COALESCE(?4, 0), COALESCE(?5, 0), COALESCE(?4, 0) OR COALESCE(?5, 0), COALESCE(?6, 0))
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 last_updated = excluded.last_updated,
                 bookmarked = COALESCE(?4, bookmarked),
                 saved_offline = COALESCE(?5, saved_offline),
                 pinned = COALESCE(?4, bookmarked) OR COALESCE(?5, saved_offline),
                 synced = COALESCE(?6, synced)",
            params![
                update.key,
                payload,
                format_timestamp(&now),
                update.bookmarked,
                update.saved_offline,
                update.synced,
            ],
        )?;

        let entry = conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE key = ?1"),
            params![update.key],
            row_to_entry,
        )?;
        Ok(entry)
    }

    /// Returns the current entry for a key, if cached.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.db.lock()?;
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE key = ?1"),
                params![key],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Updates the pin sub-flags of an entry and recomputes `pinned`.
    ///
    /// A key that has never been fetched gets an empty placeholder entry so
    /// the pin survives until the content arrives. Any local pin change marks
    /// the entry as not synced.
    pub fn set_pinned(
        &self,
        key: &str,
        bookmarked: Option<bool>,
        saved_offline: Option<bool>,
    ) -> Result<CacheEntry> {
        validate_key(key)?;
        let placeholder = serde_json::to_string(&Payload::default())?;
        let now = self.clock.now();

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO cache_entries (key, payload, last_updated, bookmarked, saved_offline, pinned, synced)
             VALUES (?1, ?2, ?3, COALESCE(?4, 0), COALESCE(?5, 0), COALESCE(?4, 0) OR COALESCE(?5, 0), 0)
             ON CONFLICT(key) DO UPDATE SET
                 last_updated = excluded.last_updated,
                 bookmarked = COALESCE(?4, bookmarked),
                 saved_offline = COALESCE(?5, saved_offline),
                 pinned = COALESCE(?4, bookmarked) OR COALESCE(?5, saved_offline),
                 synced = 0",
            params![key, placeholder, format_timestamp(&now), bookmarked, saved_offline],
        )?;

        let entry = conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE key = ?1"),
            params![key],
            row_to_entry,
        )?;
        Ok(entry)
    }

    /// Marks an entry as fully applied remotely.
    ///
    /// Returns false if the key is not cached.
    pub fn mark_synced(&self, key: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let changed =
            conn.execute("UPDATE cache_entries SET synced = 1 WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Deletes every unpinned entry last written before `older_than`.
    ///
    /// Returns the number of entries removed.
    pub fn evict_stale(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let conn = self.db.lock()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE pinned = 0 AND last_updated < ?1",
            params![format_timestamp(&older_than)],
        )?;

        if removed > 0 {
            tracing::debug!(removed, cutoff = %older_than, "evicted stale cache entries");
        }
        Ok(removed)
    }

    /// Lists pinned entries ordered by key.
    pub fn list_pinned(&self) -> Result<Vec<CacheEntry>> {
        self.query_entries(&format!(
            "SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE pinned = 1 ORDER BY key"
        ))
    }

    /// Lists every entry ordered by key.
    pub fn list_all(&self) -> Result<Vec<CacheEntry>> {
        self.query_entries(&format!("SELECT {ENTRY_COLUMNS} FROM cache_entries ORDER BY key"))
    }

    /// Number of cached entries.
    pub fn len(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn query_entries(&self, sql: &str) -> Result<Vec<CacheEntry>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
