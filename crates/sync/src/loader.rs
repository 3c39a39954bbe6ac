// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cache-first content loading.
//!
//! 1. Fresh cached content is returned immediately
//! 2. Stale or missing content is fetched when reachable and stored
//! 3. On fetch failure or while offline, cached content is served and a
//!    refresh is queued for the next drain

use std::sync::Arc;
use std::time::Duration;

use bk_core::entry::validate_key;
use bk_core::{
    CacheEntry, CacheStore, ClockSource, EntryUpdate, OpKind, OperationQueue, SystemClock,
};
use tracing::{debug, warn};

use crate::connectivity::Reachability;
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::remote::{RemoteClient, RemoteError, WebSocketRemote};

/// Default age in hours after which cached content is refetched.
pub const DEFAULT_STALE_HOURS: i64 = 24;

/// Where loaded content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fresh data from the remote.
    Network,
    /// Cached data younger than the staleness window.
    CacheFresh,
    /// Cached data (or nothing) served because the remote was unavailable.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub entry: Option<CacheEntry>,
    pub source: LoadSource,
    /// A content refresh is queued for the next drain.
    pub refresh_queued: bool,
}

/// Serves content by key, preferring the cache.
pub struct ContentLoader<R: RemoteClient = WebSocketRemote> {
    cache: Arc<CacheStore>,
    queue: Arc<OperationQueue>,
    remote: Arc<R>,
    reachability: Arc<dyn Reachability>,
    clock: Arc<dyn ClockSource>,
    stale_after: chrono::Duration,
    timeout: Duration,
}

impl<R: RemoteClient> ContentLoader<R> {
    pub fn new(
        cache: Arc<CacheStore>,
        queue: Arc<OperationQueue>,
        remote: Arc<R>,
        reachability: Arc<dyn Reachability>,
        timeout: Duration,
    ) -> Self {
        ContentLoader {
            cache,
            queue,
            remote,
            reachability,
            clock: Arc::new(SystemClock),
            stale_after: chrono::Duration::hours(DEFAULT_STALE_HOURS),
            timeout,
        }
    }

    /// Shares the engine's stores, remote and reachability.
    pub fn for_engine(engine: &SyncEngine<R>) -> Self {
        Self::new(
            Arc::clone(engine.cache()),
            Arc::clone(engine.queue()),
            Arc::clone(engine.remote()),
            Arc::clone(engine.reachability()),
            engine.config().remote_timeout,
        )
    }

    pub fn with_stale_after(mut self, stale_after: chrono::Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        !entry.payload.is_empty() && self.clock.now() - entry.last_updated <= self.stale_after
    }

    pub async fn load(&self, key: &str) -> Result<LoadResult> {
        validate_key(key)?;
        let cached = self.cache.get(key)?;
        if let Some(entry) = cached.as_ref().filter(|e| self.is_fresh(e)) {
            debug!(key, "serving fresh cache");
            return Ok(LoadResult {
                entry: Some(entry.clone()),
                source: LoadSource::CacheFresh,
                refresh_queued: false,
            });
        }

        if self.reachability.is_reachable() {
            let fetched = match tokio::time::timeout(self.timeout, self.remote.fetch_content(key)).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout),
            };
            match fetched {
                Ok(payload) => {
                    let entry = self.cache.put(&EntryUpdate::new(key, payload))?;
                    debug!(key, "fetched from remote");
                    return Ok(LoadResult {
                        entry: Some(entry),
                        source: LoadSource::Network,
                        refresh_queued: false,
                    });
                }
                Err(e) => warn!(key, error = %e, "fetch failed, serving cache"),
            }
        }

        self.queue_refresh(key)?;
        Ok(LoadResult {
            entry: cached,
            source: LoadSource::Offline,
            refresh_queued: true,
        })
    }

    /// Queues a content refresh unless one is already waiting.
    fn queue_refresh(&self, key: &str) -> Result<()> {
        let already_queued = self
            .queue
            .peek_all_ordered()?
            .iter()
            .any(|op| op.kind == OpKind::ContentUpdate && op.target_key == key);
        if !already_queued {
            self.queue.enqueue(OpKind::ContentUpdate, key, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
