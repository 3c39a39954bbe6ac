// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test server utilities for integration testing.
//!
//! Provides a TestServer that runs on a random port with fault injection
//! capabilities for testing client behavior under various conditions.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::server;
use crate::state::{Fault, ServerState};

/// A test server that runs on a random port and can be controlled.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    state: ServerState,
}

impl TestServer {
    /// Start a new test server on a random available port.
    pub async fn start() -> io::Result<Self> {
        Self::start_with(ServerState::new()).await
    }

    /// Start a test server over existing state.
    pub async fn start_with(state: ServerState) -> io::Result<Self> {
        // Bind to port 0 to get a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state_clone = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = server::serve(listener, state_clone) => {
                    if let Err(e) = result {
                        tracing::error!("Test server error: {}", e);
                    }
                }
                _ = shutdown_rx => {}
            }
        });

        Ok(TestServer {
            addr,
            shutdown_tx,
            state,
        })
    }

    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the WebSocket URL for connecting to this server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get access to the server state for verification.
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub async fn set_fault(&self, fault: Fault) {
        self.state.set_fault(fault).await;
    }

    /// Stop accepting connections. Connections already open keep running.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
