// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between the client and the guide service.
//!
//! The protocol is request/response:
//! - Client sends one mutation or fetch per message, tagged with an `id`
//! - Server answers each request with a message carrying the same `id`

use serde::{Deserialize, Serialize};

use crate::entry::Payload;

/// Correlation id pairing a request with its response.
pub type RequestId = u64;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set or clear the bookmark flag for a key.
    ApplyBookmark {
        id: RequestId,
        key: String,
        bookmarked: bool,
    },

    /// Set or clear the saved-for-offline flag for a key.
    ApplySaveOffline {
        id: RequestId,
        key: String,
        saved: bool,
    },

    /// Request the current content body for a key.
    FetchContent { id: RequestId, key: String },

    /// Ping message for keepalive.
    Ping { id: RequestId },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The mutation was applied.
    Ack { id: RequestId },

    /// Response to a FetchContent request.
    Content { id: RequestId, payload: Payload },

    /// The service refused the request (conflict, unknown key, ...).
    ///
    /// The client may retry later.
    Rejected { id: RequestId, reason: String },

    /// The request can never succeed as sent.
    Invalid { id: RequestId, reason: String },

    /// Pong response to client Ping.
    Pong { id: RequestId },

    /// Error not tied to a request (e.g. unparseable message).
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    /// Creates an ApplyBookmark message.
    pub fn apply_bookmark(id: RequestId, key: impl Into<String>, bookmarked: bool) -> Self {
        ClientMessage::ApplyBookmark { id, key: key.into(), bookmarked }
    }

    /// Creates an ApplySaveOffline message.
    pub fn apply_save_offline(id: RequestId, key: impl Into<String>, saved: bool) -> Self {
        ClientMessage::ApplySaveOffline { id, key: key.into(), saved }
    }

    /// Creates a FetchContent message.
    pub fn fetch_content(id: RequestId, key: impl Into<String>) -> Self {
        ClientMessage::FetchContent { id, key: key.into() }
    }

    /// Creates a Ping message.
    pub fn ping(id: RequestId) -> Self {
        ClientMessage::Ping { id }
    }

    /// The correlation id of this request.
    pub fn id(&self) -> RequestId {
        match self {
            ClientMessage::ApplyBookmark { id, .. }
            | ClientMessage::ApplySaveOffline { id, .. }
            | ClientMessage::FetchContent { id, .. }
            | ClientMessage::Ping { id } => *id,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Ack message.
    pub fn ack(id: RequestId) -> Self {
        ServerMessage::Ack { id }
    }

    /// Creates a Content message.
    pub fn content(id: RequestId, payload: Payload) -> Self {
        ServerMessage::Content { id, payload }
    }

    /// Creates a Rejected message.
    pub fn rejected(id: RequestId, reason: impl Into<String>) -> Self {
        ServerMessage::Rejected { id, reason: reason.into() }
    }

    /// Creates an Invalid message.
    pub fn invalid(id: RequestId, reason: impl Into<String>) -> Self {
        ServerMessage::Invalid { id, reason: reason.into() }
    }

    /// Creates a Pong message.
    pub fn pong(id: RequestId) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    /// The request this message answers, if any.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            ServerMessage::Ack { id }
            | ServerMessage::Content { id, .. }
            | ServerMessage::Rejected { id, .. }
            | ServerMessage::Invalid { id, .. }
            | ServerMessage::Pong { id } => Some(*id),
            ServerMessage::Error { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
