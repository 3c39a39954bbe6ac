// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection reads requests in order and answers each one with a
//! message carrying the request's id.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use bk_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{FaultAction, ServerState};

/// Run the WebSocket server on the given address.
pub async fn run(
    addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await?;
    Ok(())
}

/// Accept connections on an already-bound listener.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// What to do after processing one text frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Reply {
    Send(ServerMessage),
    Nothing,
    Close,
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => match handle_client_message(&text, &state).await {
                Reply::Send(response) => {
                    let json = response.to_json()?;
                    ws_sink.send(Message::Text(json.into())).await?;
                }
                Reply::Nothing => {}
                Reply::Close => {
                    info!("Closing connection to {} (injected)", peer_addr);
                    let _ = ws_sink.close().await;
                    break;
                }
            },
            Some(Ok(Message::Close(_))) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            Some(Ok(Message::Ping(data))) => {
                ws_sink.send(Message::Pong(data)).await?;
            }
            Some(Ok(_)) => {
                // Ignore other message types (Binary, Pong, Frame)
            }
            Some(Err(e)) => {
                error!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
            None => {
                info!("Client {} stream ended", peer_addr);
                break;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client message and decide the reply.
pub(crate) async fn handle_client_message(text: &str, state: &ServerState) -> Reply {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => return Reply::Send(ServerMessage::error(format!("invalid message: {}", e))),
    };
    debug!("Received message: {:?}", msg);
    let id = msg.id();

    match state.admit(&msg).await {
        FaultAction::Proceed => {}
        FaultAction::Reject(reason) => return Reply::Send(ServerMessage::rejected(id, reason)),
        FaultAction::Invalid(reason) => return Reply::Send(ServerMessage::invalid(id, reason)),
        FaultAction::Silent => return Reply::Nothing,
        FaultAction::Close => return Reply::Close,
    }

    let response = match msg {
        ClientMessage::ApplyBookmark { key, .. }
        | ClientMessage::ApplySaveOffline { key, .. }
        | ClientMessage::FetchContent { key, .. }
            if key.trim().is_empty() =>
        {
            ServerMessage::invalid(id, "empty key")
        }

        ClientMessage::ApplyBookmark { key, bookmarked, .. } => {
            state.apply_bookmark(&key, bookmarked).await;
            debug!(key, bookmarked, "bookmark applied");
            ServerMessage::ack(id)
        }

        ClientMessage::ApplySaveOffline { key, saved, .. } => {
            state.apply_save_offline(&key, saved).await;
            debug!(key, saved, "save-offline applied");
            ServerMessage::ack(id)
        }

        ClientMessage::FetchContent { key, .. } => match state.fetch_content(&key).await {
            Some(payload) => ServerMessage::content(id, payload),
            None => ServerMessage::rejected(id, format!("no content for '{}'", key)),
        },

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            ServerMessage::pong(id)
        }
    };
    Reply::Send(response)
}
