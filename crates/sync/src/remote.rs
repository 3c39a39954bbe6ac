// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote guide service client.
//!
//! Provides a trait-based remote layer that enables:
//! - Real WebSocket connections for production
//! - Mock remotes for unit testing

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use bk_core::protocol::{ClientMessage, RequestId, ServerMessage};
use bk_core::Payload;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Error type for remote operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network failure: connect, send, receive or closed connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The service refused the request; retrying later may succeed.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// The request can never succeed as sent.
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// True for failures that consume a retry rather than dropping the
    /// operation outright.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::Malformed(_))
    }

    /// True for failures caused by the network path rather than the service.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Timeout)
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteClient`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Remote guide service.
///
/// Mutations are idempotent on the service side: applying the same flag
/// twice leaves the same state.
pub trait RemoteClient: Send + Sync {
    /// Set or clear the bookmark flag for `key`.
    fn apply_bookmark(&self, key: &str, bookmarked: bool) -> RemoteFuture<'_, ()>;

    /// Set or clear the saved-for-offline flag for `key`.
    fn apply_save_offline(&self, key: &str, saved: bool) -> RemoteFuture<'_, ()>;

    /// Fetch the current content for `key`.
    fn fetch_content(&self, key: &str) -> RemoteFuture<'_, Payload>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

/// [`RemoteClient`] over a JSON request/response WebSocket protocol.
///
/// Connects lazily on the first request and again after any transport
/// failure. Requests are serialized over the single connection.
pub struct WebSocketRemote {
    url: String,
    conn: Mutex<Option<WebSocketConnection>>,
    next_id: AtomicU64,
}

impl WebSocketRemote {
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketRemote {
            url: url.into(),
            conn: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a connection is currently held open.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Round-trip a ping to check the service is answering.
    pub async fn ping(&self) -> RemoteResult<()> {
        let id = self.next_request_id();
        match self.request(ClientMessage::ping(id)).await? {
            ServerMessage::Pong { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Close the connection if one is open.
    pub async fn disconnect(&self) {
        if let Some(mut ws) = self.conn.lock().await.take() {
            let _ = ws.sink.close().await;
        }
    }

    fn next_request_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn connect(url: &str) -> RemoteResult<WebSocketConnection> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RemoteError::Transport(format!("connection failed: {}", e)))?;
        let (sink, stream) = ws_stream.split();
        debug!(url, "connected to remote");
        Ok(WebSocketConnection { sink, stream })
    }

    /// Send `msg` and wait for the response carrying its id.
    ///
    /// Any transport failure drops the connection so the next request
    /// reconnects.
    async fn request(&self, msg: ClientMessage) -> RemoteResult<ServerMessage> {
        let id = msg.id();
        let json = msg
            .to_json()
            .map_err(|e| RemoteError::Malformed(format!("serialization error: {}", e)))?;

        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(Self::connect(&self.url).await?);
        }
        let result = match guard.as_mut() {
            Some(ws) => Self::exchange(ws, id, json).await,
            None => Err(RemoteError::Transport("connection closed".to_string())),
        };
        if matches!(result, Err(RemoteError::Transport(_))) {
            *guard = None;
        }
        result
    }

    async fn exchange(
        ws: &mut WebSocketConnection,
        id: RequestId,
        json: String,
    ) -> RemoteResult<ServerMessage> {
        ws.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RemoteError::Transport(format!("send failed: {}", e)))?;

        loop {
            match ws.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let reply = match ServerMessage::from_json(&text) {
                        Ok(reply) => reply,
                        Err(e) => {
                            debug!(error = %e, "ignoring unparseable server message");
                            continue;
                        }
                    };
                    match reply.request_id() {
                        Some(reply_id) if reply_id == id => return Ok(reply),
                        Some(reply_id) => {
                            // Late answer to a request that timed out.
                            debug!(reply_id, expected = id, "discarding stale response");
                        }
                        None => {
                            if let ServerMessage::Error { message } = reply {
                                return Err(RemoteError::Malformed(message));
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RemoteError::Transport("connection closed".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(RemoteError::Transport(format!("receive failed: {}", e)));
                }
            }
        }
    }
}

fn unexpected(reply: ServerMessage) -> RemoteError {
    match reply {
        ServerMessage::Rejected { reason, .. } => RemoteError::Rejected(reason),
        ServerMessage::Invalid { reason, .. } => RemoteError::Malformed(reason),
        ServerMessage::Error { message } => RemoteError::Malformed(message),
        other => RemoteError::Malformed(format!("unexpected response: {:?}", other)),
    }
}

impl RemoteClient for WebSocketRemote {
    fn apply_bookmark(&self, key: &str, bookmarked: bool) -> RemoteFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let id = self.next_request_id();
            match self.request(ClientMessage::apply_bookmark(id, key, bookmarked)).await? {
                ServerMessage::Ack { .. } => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn apply_save_offline(&self, key: &str, saved: bool) -> RemoteFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            let id = self.next_request_id();
            match self.request(ClientMessage::apply_save_offline(id, key, saved)).await? {
                ServerMessage::Ack { .. } => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn fetch_content(&self, key: &str) -> RemoteFuture<'_, Payload> {
        let key = key.to_string();
        Box::pin(async move {
            let id = self.next_request_id();
            match self.request(ClientMessage::fetch_content(id, key)).await? {
                ServerMessage::Content { payload, .. } => Ok(payload),
                other => Err(unexpected(other)),
            }
        })
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
