// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for sync module tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bk_core::{CacheStore, Database, OfflineRepository, OperationQueue, Payload};

use crate::connectivity::Reachability;
use crate::engine::{EngineConfig, SyncEngine};
use crate::remote::{RemoteClient, RemoteError, RemoteFuture, RemoteResult};

/// Reachability backed by a flag the test flips.
#[derive(Debug, Default)]
pub struct FlagReachability(AtomicBool);

impl FlagReachability {
    pub fn new(reachable: bool) -> Arc<Self> {
        Arc::new(FlagReachability(AtomicBool::new(reachable)))
    }

    pub fn set(&self, reachable: bool) {
        self.0.store(reachable, Ordering::SeqCst);
    }
}

impl Reachability for FlagReachability {
    fn is_reachable(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Bookmark(String, bool),
    SaveOffline(String, bool),
    Fetch(String),
}

impl RemoteCall {
    fn key(&self) -> &str {
        match self {
            RemoteCall::Bookmark(key, _) | RemoteCall::SaveOffline(key, _) | RemoteCall::Fetch(key) => key,
        }
    }
}

type CallHook = Box<dyn Fn(&RemoteCall) + Send + Sync>;

/// In-memory remote with scripted failures.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    /// Failures consumed one per call on the key.
    scripted: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    /// Failure returned for every call while set.
    always: Mutex<Option<RemoteError>>,
    bookmarks: Mutex<BTreeSet<String>>,
    saved: Mutex<BTreeSet<String>>,
    content: Mutex<HashMap<String, Payload>>,
    delay: Mutex<Option<Duration>>,
    hook: Mutex<Option<CallHook>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, key: &str, err: RemoteError) {
        self.scripted
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn fail_always(&self, err: Option<RemoteError>) {
        *self.always.lock().unwrap() = err;
    }

    pub fn set_content(&self, key: &str, payload: Payload) {
        self.content.lock().unwrap().insert(key.to_string(), payload);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Runs before each call is answered.
    pub fn on_call(&self, hook: impl Fn(&RemoteCall) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_bookmarked(&self, key: &str) -> bool {
        self.bookmarks.lock().unwrap().contains(key)
    }

    pub fn is_saved(&self, key: &str) -> bool {
        self.saved.lock().unwrap().contains(key)
    }

    async fn answer(&self, call: RemoteCall) -> RemoteResult<Option<Payload>> {
        self.calls.lock().unwrap().push(call.clone());
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(&call);
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let always = self.always.lock().unwrap().clone();
        if let Some(err) = always {
            return Err(err);
        }
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(call.key())
            .and_then(VecDeque::pop_front);
        if let Some(err) = scripted {
            return Err(err);
        }
        match call {
            RemoteCall::Bookmark(key, on) => {
                set_flag(&self.bookmarks, key, on);
                Ok(None)
            }
            RemoteCall::SaveOffline(key, on) => {
                set_flag(&self.saved, key, on);
                Ok(None)
            }
            RemoteCall::Fetch(key) => match self.content.lock().unwrap().get(&key) {
                Some(payload) => Ok(Some(payload.clone())),
                None => Err(RemoteError::Rejected(format!("no content for '{}'", key))),
            },
        }
    }
}

fn set_flag(set: &Mutex<BTreeSet<String>>, key: String, on: bool) {
    let mut set = set.lock().unwrap();
    if on {
        set.insert(key);
    } else {
        set.remove(&key);
    }
}

impl RemoteClient for MockRemote {
    fn apply_bookmark(&self, key: &str, bookmarked: bool) -> RemoteFuture<'_, ()> {
        let call = RemoteCall::Bookmark(key.to_string(), bookmarked);
        Box::pin(async move { self.answer(call).await.map(|_| ()) })
    }

    fn apply_save_offline(&self, key: &str, saved: bool) -> RemoteFuture<'_, ()> {
        let call = RemoteCall::SaveOffline(key.to_string(), saved);
        Box::pin(async move { self.answer(call).await.map(|_| ()) })
    }

    fn fetch_content(&self, key: &str) -> RemoteFuture<'_, Payload> {
        let call = RemoteCall::Fetch(key.to_string());
        Box::pin(async move {
            match self.answer(call).await? {
                Some(payload) => Ok(payload),
                None => Err(RemoteError::Malformed("no payload".into())),
            }
        })
    }
}

/// Stores, repository and doubles over one in-memory database.
pub struct Fixture {
    pub cache: Arc<CacheStore>,
    pub queue: Arc<OperationQueue>,
    pub repo: OfflineRepository,
    pub remote: Arc<MockRemote>,
    pub reachability: Arc<FlagReachability>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::over(Arc::new(Database::open_in_memory().unwrap()))
    }

    /// Fixture over a database file other connections can also open.
    pub fn on_disk(path: &Path) -> Self {
        Self::over(Arc::new(Database::open(path).unwrap()))
    }

    fn over(db: Arc<Database>) -> Self {
        let cache = Arc::new(CacheStore::new(Arc::clone(&db)));
        let queue = Arc::new(OperationQueue::new(db));
        let repo = OfflineRepository::new(Arc::clone(&cache), Arc::clone(&queue));
        Fixture {
            cache,
            queue,
            repo,
            remote: MockRemote::new(),
            reachability: FlagReachability::new(true),
        }
    }

    pub fn engine(&self) -> SyncEngine<MockRemote> {
        self.engine_with(EngineConfig::default())
    }

    pub fn engine_with(&self, config: EngineConfig) -> SyncEngine<MockRemote> {
        SyncEngine::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.queue),
            Arc::clone(&self.remote),
            self.reachability.clone(),
            config,
        )
    }

    /// Engine that asks `reachability` instead of the fixture flag.
    pub fn engine_over(&self, reachability: Arc<dyn Reachability>) -> SyncEngine<MockRemote> {
        SyncEngine::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.queue),
            Arc::clone(&self.remote),
            reachability,
            EngineConfig::default(),
        )
    }
}
