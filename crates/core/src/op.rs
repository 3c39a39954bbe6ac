// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending mutations awaiting remote confirmation.
//!
//! Every local bookmark or save-for-offline toggle, and every deferred content
//! refresh, becomes one [`PendingOperation`]. Operations are never coalesced:
//! the remote observes each discrete toggle in the order it was issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Durable identifier of a queued operation.
pub type OpId = i64;

/// What a pending operation asks the remote to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    BookmarkAdd,
    BookmarkRemove,
    SaveOfflineAdd,
    SaveOfflineRemove,
    /// Re-fetch the content body for the target key.
    ContentUpdate,
}

impl OpKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::BookmarkAdd => "bookmark_add",
            OpKind::BookmarkRemove => "bookmark_remove",
            OpKind::SaveOfflineAdd => "save_offline_add",
            OpKind::SaveOfflineRemove => "save_offline_remove",
            OpKind::ContentUpdate => "content_update",
        }
    }

    /// The bookmark toggle for the given target state.
    pub fn bookmark(on: bool) -> Self {
        if on {
            OpKind::BookmarkAdd
        } else {
            OpKind::BookmarkRemove
        }
    }

    /// The save-for-offline toggle for the given target state.
    pub fn save_offline(on: bool) -> Self {
        if on {
            OpKind::SaveOfflineAdd
        } else {
            OpKind::SaveOfflineRemove
        }
    }

    /// The pin sub-flags this kind sets locally, as `(bookmarked, saved_offline)`.
    pub fn pin_change(&self) -> (Option<bool>, Option<bool>) {
        match self {
            OpKind::BookmarkAdd => (Some(true), None),
            OpKind::BookmarkRemove => (Some(false), None),
            OpKind::SaveOfflineAdd => (None, Some(true)),
            OpKind::SaveOfflineRemove => (None, Some(false)),
            OpKind::ContentUpdate => (None, None),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bookmark_add" => Ok(OpKind::BookmarkAdd),
            "bookmark_remove" => Ok(OpKind::BookmarkRemove),
            "save_offline_add" => Ok(OpKind::SaveOfflineAdd),
            "save_offline_remove" => Ok(OpKind::SaveOfflineRemove),
            "content_update" => Ok(OpKind::ContentUpdate),
            _ => Err(Error::InvalidOpKind(s.to_string())),
        }
    }
}

/// A durable record of a local mutation awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OpId,
    pub kind: OpKind,
    pub target_key: String,
    /// Opaque data carried with the operation.
    pub extra: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
