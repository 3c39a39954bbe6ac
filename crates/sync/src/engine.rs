// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue drain.
//!
//! A drain walks the pending operations in FIFO order and applies each to
//! the remote. Per-operation failures are aggregated into a [`SyncReport`];
//! only storage errors abort a drain.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bk_core::entry::validate_key;
use bk_core::{CacheStore, EntryUpdate, OpId, OpKind, OperationQueue, Payload, PendingOperation};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::connectivity::Reachability;
use crate::error::Result;
use crate::remote::{RemoteClient, RemoteError, RemoteResult, WebSocketRemote};

/// Tuning for [`SyncEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts before an operation is dropped.
    pub max_retries: u32,
    /// Upper bound on each remote call.
    pub remote_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_retries: 3,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// An operation removed from the queue without being applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedOperation {
    pub id: OpId,
    pub kind: OpKind,
    pub target_key: String,
    /// Attempts made, including the final one.
    pub attempts: u32,
    pub reason: String,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations applied and removed.
    pub synced: usize,
    /// Failed attempts this pass, retryable or dropped.
    pub failed: usize,
    /// Operations not attempted.
    pub skipped: usize,
    pub dropped: Vec<DroppedOperation>,
}

impl SyncReport {
    /// True when every attempted operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Drains the operation queue against a [`RemoteClient`].
///
/// At most one drain runs at a time per engine.
pub struct SyncEngine<R: RemoteClient = WebSocketRemote> {
    cache: Arc<CacheStore>,
    queue: Arc<OperationQueue>,
    remote: Arc<R>,
    reachability: Arc<dyn Reachability>,
    config: EngineConfig,
    /// Held for the whole body of a drain.
    slot: Mutex<()>,
    drains: AtomicU64,
    reports: watch::Sender<Option<SyncReport>>,
}

impl<R: RemoteClient> SyncEngine<R> {
    pub fn new(
        cache: Arc<CacheStore>,
        queue: Arc<OperationQueue>,
        remote: Arc<R>,
        reachability: Arc<dyn Reachability>,
        config: EngineConfig,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        SyncEngine {
            cache,
            queue,
            remote,
            reachability,
            config,
            slot: Mutex::new(()),
            drains: AtomicU64::new(0),
            reports,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn reachability(&self) -> &Arc<dyn Reachability> {
        &self.reachability
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a drain, waiting for any drain already in flight to finish first.
    pub async fn drain(&self) -> Result<SyncReport> {
        let _slot = self.slot.lock().await;
        self.run_pass().await
    }

    /// Runs a drain unless one is already in flight, in which case returns
    /// `None` immediately.
    pub async fn try_drain(&self) -> Option<Result<SyncReport>> {
        let _slot = self.slot.try_lock().ok()?;
        Some(self.run_pass().await)
    }

    pub fn is_draining(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Number of drains completed since construction.
    pub fn drain_count(&self) -> u64 {
        self.drains.load(Ordering::Acquire)
    }

    /// Report of the most recent completed drain.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.reports.borrow().clone()
    }

    /// Receiver updated after every completed drain.
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<SyncReport>> {
        self.reports.subscribe()
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        if !self.reachability.is_reachable() {
            let report = SyncReport {
                skipped: self.queue.count()?,
                ..SyncReport::default()
            };
            info!(skipped = report.skipped, "offline, drain skipped");
            self.publish(&report);
            return Ok(report);
        }

        let ops = self.queue.peek_all_ordered()?;
        let mut report = SyncReport::default();
        // Keys with a retryable failure this pass; later ops on them wait.
        let mut blocked: HashSet<String> = HashSet::new();

        for (index, op) in ops.iter().enumerate() {
            if blocked.contains(&op.target_key) {
                debug!(id = op.id, key = %op.target_key, "blocked behind earlier failure");
                report.skipped += 1;
                continue;
            }

            let err = match self.dispatch(op).await {
                Ok(content) => {
                    self.complete(op, content)?;
                    report.synced += 1;
                    continue;
                }
                Err(err) => err,
            };

            report.failed += 1;
            let attempts = op.retry_count.saturating_add(1);
            if !err.is_retryable() {
                error!(id = op.id, kind = %op.kind, key = %op.target_key, error = %err, "dropping malformed operation");
                self.drop_op(op, attempts, &err, &mut report)?;
            } else if attempts >= self.config.max_retries {
                warn!(id = op.id, kind = %op.kind, key = %op.target_key, attempts, error = %err, "retries exhausted, dropping operation");
                self.drop_op(op, attempts, &err, &mut report)?;
            } else {
                warn!(id = op.id, kind = %op.kind, key = %op.target_key, attempts, error = %err, "operation failed, will retry");
                self.queue.record_failure(op.id, &err.to_string())?;
                blocked.insert(op.target_key.clone());
            }

            if err.is_transport() && !self.reachability.is_reachable() {
                let remaining = ops.len() - index - 1;
                info!(remaining, "connectivity lost, stopping drain");
                report.skipped += remaining;
                break;
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            dropped = report.dropped.len(),
            "drain complete"
        );
        self.publish(&report);
        Ok(report)
    }

    /// Applies one operation remotely, bounded by the remote timeout.
    ///
    /// Returns fetched content for `ContentUpdate`.
    async fn dispatch(&self, op: &PendingOperation) -> RemoteResult<Option<Payload>> {
        if let Err(e) = validate_key(&op.target_key) {
            return Err(RemoteError::Malformed(e.to_string()));
        }
        let key = op.target_key.as_str();
        let call = async {
            match op.kind {
                OpKind::BookmarkAdd => self.remote.apply_bookmark(key, true).await.map(|_| None),
                OpKind::BookmarkRemove => self.remote.apply_bookmark(key, false).await.map(|_| None),
                OpKind::SaveOfflineAdd => self.remote.apply_save_offline(key, true).await.map(|_| None),
                OpKind::SaveOfflineRemove => {
                    self.remote.apply_save_offline(key, false).await.map(|_| None)
                }
                OpKind::ContentUpdate => self.remote.fetch_content(key).await.map(Some),
            }
        };
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    /// Stores fetched content before removing the operation, so a storage
    /// failure leaves the refresh queued.
    fn complete(&self, op: &PendingOperation, content: Option<Payload>) -> Result<()> {
        if let Some(payload) = content {
            self.cache.put(&EntryUpdate::new(op.target_key.clone(), payload))?;
        }
        self.queue.remove(op.id)?;
        if self.queue.count_for_key(&op.target_key)? == 0 {
            self.cache.mark_synced(&op.target_key)?;
        }
        debug!(id = op.id, kind = %op.kind, key = %op.target_key, "operation synced");
        Ok(())
    }

    fn drop_op(
        &self,
        op: &PendingOperation,
        attempts: u32,
        err: &RemoteError,
        report: &mut SyncReport,
    ) -> Result<()> {
        self.queue.remove(op.id)?;
        report.dropped.push(DroppedOperation {
            id: op.id,
            kind: op.kind,
            target_key: op.target_key.clone(),
            attempts,
            reason: err.to_string(),
        });
        Ok(())
    }

    fn publish(&self, report: &SyncReport) {
        self.drains.fetch_add(1, Ordering::AcqRel);
        self.reports.send_replace(Some(report.clone()));
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
