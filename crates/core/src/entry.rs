// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cached content snapshots.
//!
//! A [`CacheEntry`] is the local copy of one piece of guide content, keyed by
//! source and category. The [`Payload`] body is opaque to the sync machinery:
//! it is serialized as JSON and never interpreted beyond round-tripping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of a cache key in bytes.
pub const MAX_KEY_LEN: usize = 512;

/// Builds the composite key for a source/category pair.
pub fn cache_key(source_id: &str, category_id: &str) -> String {
    format!("{source_id}:{category_id}")
}

/// Checks that a key can be stored and sent to the remote.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".to_string()));
    }
    if key.trim() != key {
        return Err(Error::InvalidKey(format!("'{key}' has surrounding whitespace")));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    Ok(())
}

/// The content body of a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub donts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    /// Domain-specific sub-fields (phrases, etiquette notes, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Payload {
    /// Creates a payload with a title and body and no structured lists.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Payload { title: title.into(), body: body.into(), ..Default::default() }
    }

    /// True for the placeholder body of an entry that was pinned before its
    /// content was ever fetched.
    pub fn is_empty(&self) -> bool {
        *self == Payload::default()
    }
}

/// A locally stored snapshot of remotely sourced content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Payload,
    pub last_updated: DateTime<Utc>,
    pub bookmarked: bool,
    pub saved_offline: bool,
    pub synced: bool,
}

impl CacheEntry {
    /// Returns true if the entry is exempt from eviction.
    pub fn pinned(&self) -> bool {
        self.bookmarked || self.saved_offline
    }
}

/// An upsert request for [`crate::CacheStore::put`].
///
/// Flags left as `None` keep their stored value (or default to `false` for a
/// new entry).
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub key: String,
    pub payload: Payload,
    pub bookmarked: Option<bool>,
    pub saved_offline: Option<bool>,
    pub synced: Option<bool>,
}

impl EntryUpdate {
    pub fn new(key: impl Into<String>, payload: Payload) -> Self {
        EntryUpdate {
            key: key.into(),
            payload,
            bookmarked: None,
            saved_offline: None,
            synced: None,
        }
    }

    pub fn bookmarked(mut self, value: bool) -> Self {
        self.bookmarked = Some(value);
        self
    }

    pub fn saved_offline(mut self, value: bool) -> Self {
        self.saved_offline = Some(value);
        self
    }

    pub fn synced(mut self, value: bool) -> Self {
        self.synced = Some(value);
        self
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
