// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bkd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline cache and background sync service for the travel guide")]
pub struct Cli {
    /// State directory holding the cache database, config and logs
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Config file (defaults to <state-dir>/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sync service until interrupted
    Run,

    /// Show queued operations, pinned entries and the cache size
    Status,

    /// Bookmark an entry
    Bookmark {
        key: String,
        /// Remove the bookmark instead
        #[arg(long)]
        remove: bool,
    },

    /// Save an entry for offline reading
    SaveOffline {
        key: String,
        /// Remove the offline copy instead
        #[arg(long)]
        remove: bool,
    },

    /// Queue a content refresh for an entry
    Refresh { key: String },

    /// Print an entry, fetching it when the cached copy is stale
    Show { key: String },

    /// Drain the operation queue once
    Sync,

    /// Delete stale unpinned entries
    Evict,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
