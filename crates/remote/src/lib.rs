// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bk-remote: reference guide service for the baedeker sync protocol.
//!
//! Holds bookmark and saved-offline flags plus guide content in memory and
//! answers `ClientMessage` requests over WebSocket. [`TestServer`] runs it on
//! a random local port with fault injection for client tests.

pub mod server;
pub mod state;
pub mod test_server;

pub use state::{Fault, ServerState};
pub use test_server::TestServer;
