// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync layer for the baedeker offline cache.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  reachable  ┌─────────────┐  drain  ┌─────────────┐
//! │ Connectivity │────────────►│  Scheduler  │────────►│ SyncEngine  │
//! │   Monitor    │             │ (+executor) │         │             │
//! └──────────────┘             └─────────────┘         └─────────────┘
//!                                                        │        │
//!                                                        ▼        ▼
//!                                              ┌────────────┐ ┌──────────────┐
//!                                              │ Queue +    │ │ RemoteClient │
//!                                              │ CacheStore │ │   (trait)    │
//!                                              └────────────┘ └──────────────┘
//! ```
//!
//! # Features
//!
//! - Debounced connectivity transitions
//! - Single-flight drains with per-key FIFO and a retry ceiling
//! - Periodic background drains with exponential backoff
//! - Cache-first content loading with refresh-on-reconnect
//! - Injectable remote, reachability and executor traits for testing

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod loader;
pub mod remote;
pub mod scheduler;

pub use config::Config;
pub use connectivity::{ConnectivityMonitor, Reachability, ReachabilityProbe, Subscription, TcpProbe};
pub use engine::{DroppedOperation, EngineConfig, SyncEngine, SyncReport};
pub use error::{Error, Result};
pub use loader::{ContentLoader, LoadResult, LoadSource};
pub use remote::{RemoteClient, RemoteError, RemoteResult, WebSocketRemote};
pub use scheduler::{
    BackgroundExecutor, Job, JobFuture, JobOutcome, PeriodicRequest, Scheduler, SchedulerConfig,
    SchedulerState, TokioExecutor,
};

#[cfg(test)]
mod test_helpers;
