// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Canonical flags and content for thread-safe access across connections.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use bk_core::protocol::ClientMessage;
use bk_core::Payload;

/// Injected misbehavior for exercising client failure handling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fault {
    /// Answer normally.
    #[default]
    None,
    /// Reject the next `remaining` requests with `reason`.
    Reject { remaining: u32, reason: String },
    /// Answer every mutation with `Invalid`.
    Invalid(String),
    /// Read requests but never answer.
    Silent,
    /// Close the connection on the next request.
    Close,
}

/// How a connection should respond to one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultAction {
    Proceed,
    Reject(String),
    Invalid(String),
    Silent,
    Close,
}

/// Error loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shared server state.
#[derive(Clone, Default)]
pub struct ServerState {
    inner: Arc<Mutex<Catalog>>,
}

#[derive(Default)]
struct Catalog {
    bookmarks: BTreeSet<String>,
    saved: BTreeSet<String>,
    content: HashMap<String, Payload>,
    /// Every request received, in arrival order.
    requests: Vec<ClientMessage>,
    fault: Fault,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates state with content loaded from a JSON object of key to payload.
    pub fn from_seed(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path)?;
        let content: HashMap<String, Payload> = serde_json::from_str(&text)?;
        Ok(ServerState {
            inner: Arc::new(Mutex::new(Catalog {
                content,
                ..Catalog::default()
            })),
        })
    }

    /// Records a request and decides how to answer it.
    pub async fn admit(&self, msg: &ClientMessage) -> FaultAction {
        let mut catalog = self.inner.lock().await;
        catalog.requests.push(msg.clone());
        if matches!(msg, ClientMessage::Ping { .. }) {
            return FaultAction::Proceed;
        }
        match &mut catalog.fault {
            Fault::None => FaultAction::Proceed,
            Fault::Reject { remaining, reason } => {
                let reason = reason.clone();
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    catalog.fault = Fault::None;
                }
                FaultAction::Reject(reason)
            }
            Fault::Invalid(reason) => FaultAction::Invalid(reason.clone()),
            Fault::Silent => FaultAction::Silent,
            Fault::Close => {
                catalog.fault = Fault::None;
                FaultAction::Close
            }
        }
    }

    pub async fn set_fault(&self, fault: Fault) {
        self.inner.lock().await.fault = fault;
    }

    pub async fn apply_bookmark(&self, key: &str, bookmarked: bool) {
        let mut catalog = self.inner.lock().await;
        if bookmarked {
            catalog.bookmarks.insert(key.to_string());
        } else {
            catalog.bookmarks.remove(key);
        }
    }

    pub async fn apply_save_offline(&self, key: &str, saved: bool) {
        let mut catalog = self.inner.lock().await;
        if saved {
            catalog.saved.insert(key.to_string());
        } else {
            catalog.saved.remove(key);
        }
    }

    pub async fn fetch_content(&self, key: &str) -> Option<Payload> {
        self.inner.lock().await.content.get(key).cloned()
    }

    pub async fn put_content(&self, key: impl Into<String>, payload: Payload) {
        self.inner.lock().await.content.insert(key.into(), payload);
    }

    pub async fn is_bookmarked(&self, key: &str) -> bool {
        self.inner.lock().await.bookmarks.contains(key)
    }

    pub async fn is_saved(&self, key: &str) -> bool {
        self.inner.lock().await.saved.contains(key)
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<ClientMessage> {
        self.inner.lock().await.requests.clone()
    }
}
