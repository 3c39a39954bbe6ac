// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Entry points for the UI layer.
//!
//! Every user toggle is recorded as a pending operation first and then
//! applied to the cache, so the UI sees the new pin state immediately while
//! the remote catches up on the next drain.

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::op::{OpKind, PendingOperation};
use crate::queue::OperationQueue;

/// Facade over the cache and the queue for user-initiated mutations.
#[derive(Clone)]
pub struct OfflineRepository {
    cache: Arc<CacheStore>,
    queue: Arc<OperationQueue>,
}

impl OfflineRepository {
    pub fn new(cache: Arc<CacheStore>, queue: Arc<OperationQueue>) -> Self {
        OfflineRepository { cache, queue }
    }

    /// Bookmarks or un-bookmarks an entry.
    pub fn bookmark(&self, key: &str, on: bool) -> Result<CacheEntry> {
        self.toggle(OpKind::bookmark(on), key)
    }

    /// Saves or un-saves an entry for offline reading.
    pub fn save_offline(&self, key: &str, on: bool) -> Result<CacheEntry> {
        self.toggle(OpKind::save_offline(on), key)
    }

    /// Asks for the content of an entry to be re-fetched on the next drain.
    pub fn request_refresh(&self, key: &str) -> Result<PendingOperation> {
        self.queue.enqueue(OpKind::ContentUpdate, key, None)
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.cache.get(key)
    }

    pub fn list_pinned(&self) -> Result<Vec<CacheEntry>> {
        self.cache.list_pinned()
    }

    pub fn list_all(&self) -> Result<Vec<CacheEntry>> {
        self.cache.list_all()
    }

    /// Number of operations still waiting for the remote.
    pub fn pending_count(&self) -> Result<usize> {
        self.queue.count()
    }

    fn toggle(&self, kind: OpKind, key: &str) -> Result<CacheEntry> {
        // Durable intent first; a failed pin update then leaves nothing unsent
        let op = self.queue.enqueue(kind, key, None)?;
        let (bookmarked, saved_offline) = kind.pin_change();
        let entry = self.cache.set_pinned(key, bookmarked, saved_offline)?;
        tracing::info!(op = op.id, %kind, key, pinned = entry.pinned(), "recorded local toggle");
        Ok(entry)
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
