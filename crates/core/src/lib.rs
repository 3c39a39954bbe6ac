// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bk-core: Offline storage for the baedeker travel guide client
//!
//! This crate provides the data model, the SQLite-backed content cache and
//! pending-operation queue, and the wire protocol shared by the sync engine
//! and the reference remote service.

pub mod cache;
pub mod clock;
pub mod db;
pub mod entry;
pub mod error;
pub mod op;
pub mod protocol;
pub mod queue;
pub mod repository;

pub use cache::CacheStore;
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use db::Database;
pub use entry::{cache_key, CacheEntry, EntryUpdate, Payload};
pub use error::{Error, Result};
pub use op::{OpId, OpKind, PendingOperation};
pub use queue::OperationQueue;
pub use repository::OfflineRepository;
