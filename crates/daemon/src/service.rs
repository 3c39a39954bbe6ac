// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring of the cache, queue, remote and scheduler for one state directory.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use bk_core::{
    CacheEntry, CacheStore, ClockSource, Database, OfflineRepository, OperationQueue,
    PendingOperation, SystemClock,
};
use bksync::config::db_path;
use bksync::{
    Config, ConnectivityMonitor, ContentLoader, LoadResult, Reachability, ReachabilityProbe,
    Result, Scheduler, SyncEngine, SyncReport, TcpProbe, TokioExecutor, WebSocketRemote,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Snapshot of local state for `bkd status`.
#[derive(Debug, Clone)]
pub struct Status {
    pub pending: Vec<PendingOperation>,
    pub pinned: Vec<CacheEntry>,
    pub entries: usize,
}

/// A live connection to the remote for one-shot commands.
struct Session {
    monitor: ConnectivityMonitor,
    engine: Arc<SyncEngine>,
}

impl Session {
    async fn close(self) {
        self.engine.remote().disconnect().await;
        self.monitor.shutdown();
    }
}

pub struct Service {
    config: Config,
    cache: Arc<CacheStore>,
    queue: Arc<OperationQueue>,
    repo: OfflineRepository,
    clock: Arc<dyn ClockSource>,
}

impl Service {
    /// Opens (creating if needed) the database under `state_dir`.
    pub fn open(state_dir: &Path, config: Config) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let db = Arc::new(Database::open(&db_path(state_dir))?);
        Ok(Self::with_database(db, config, Arc::new(SystemClock)))
    }

    pub fn with_database(db: Arc<Database>, config: Config, clock: Arc<dyn ClockSource>) -> Self {
        let cache = Arc::new(CacheStore::with_clock(Arc::clone(&db), Arc::clone(&clock)));
        let queue = Arc::new(OperationQueue::with_clock(db, Arc::clone(&clock)));
        let repo = OfflineRepository::new(Arc::clone(&cache), Arc::clone(&queue));
        Service {
            config,
            cache,
            queue,
            repo,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &OfflineRepository {
        &self.repo
    }

    pub fn status(&self) -> Result<Status> {
        Ok(Status {
            pending: self.queue.peek_all_ordered()?,
            pinned: self.cache.list_pinned()?,
            entries: self.cache.len()?,
        })
    }

    /// Deletes unpinned entries older than the configured maximum age.
    pub fn evict(&self) -> Result<usize> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.config.max_age())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.cache.evict_stale(cutoff)?)
    }

    /// Drains the queue once, probing the remote for reachability first.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let session = self.connect().await;
        let report = session.engine.drain().await;
        session.close().await;
        report
    }

    /// Loads `key` through the cache, fetching it when stale and reachable.
    pub async fn show(&self, key: &str) -> Result<LoadResult> {
        let session = self.connect().await;
        let loader = ContentLoader::for_engine(session.engine.as_ref())
            .with_stale_after(self.config.staleness())
            .with_clock(Arc::clone(&self.clock));
        let result = loader.load(key).await;
        session.close().await;
        result
    }

    /// Runs the scheduler and periodic eviction until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let monitor =
            ConnectivityMonitor::new(self.probe_once().await, self.config.settle_period());
        if let Some(probe) = self.probe() {
            monitor.spawn_probe(probe, self.config.probe_interval());
        }
        let reachability: Arc<dyn Reachability> = Arc::new(monitor.clone());
        let engine = self.engine(Arc::clone(&reachability));
        let scheduler = Scheduler::new(
            Arc::clone(&engine),
            monitor.clone(),
            Arc::new(TokioExecutor::new(reachability)),
            self.config.scheduler_config(),
        );
        scheduler.start();
        // Work left over from a previous session goes out right away.
        scheduler.trigger_now();

        let mut eviction = tokio::time::interval(self.config.eviction_interval());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = eviction.tick() => match self.evict() {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "evicted stale entries"),
                    Err(e) => warn!("eviction failed: {}", e),
                },
            }
        }

        scheduler.stop();
        monitor.shutdown();
        engine.remote().disconnect().await;
        info!(drains = engine.drain_count(), "service stopped");
        Ok(())
    }

    fn probe(&self) -> Option<TcpProbe> {
        self.config
            .remote_addr()
            .map(|addr| TcpProbe::new(addr, self.config.probe_timeout()))
    }

    async fn probe_once(&self) -> bool {
        match self.probe() {
            Some(probe) => probe.probe().await,
            None => false,
        }
    }

    async fn connect(&self) -> Session {
        let monitor =
            ConnectivityMonitor::new(self.probe_once().await, self.config.settle_period());
        let engine = self.engine(Arc::new(monitor.clone()));
        Session { monitor, engine }
    }

    fn engine(&self, reachability: Arc<dyn Reachability>) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.queue),
            Arc::new(WebSocketRemote::new(self.config.remote.url.clone())),
            reachability,
            self.config.engine_config(),
        ))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
