// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bkd - offline cache and sync service for the travel guide.
//!
//! Keeps the content cache and the pending-operation queue in a SQLite
//! database under the state directory, and pushes queued bookmark and
//! offline-save toggles to the remote whenever it is reachable.
//!
//! Usage:
//!   bkd [--state-dir <path>] [--config <file>] <command>

use std::fs;
use std::path::Path;

use clap::Parser;

use bksync::config::{config_path, default_state_dir};
use bksync::{Config, LoadSource};

mod cli;
mod service;

use cli::{Cli, Command};
use service::Service;

/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "bkd.lock";
/// PID filename within the state directory.
const PID_NAME: &str = "bkd.pid";
const LOG_NAME: &str = "bkd.log";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);

    if let Err(e) = fs::create_dir_all(&state_dir) {
        eprintln!("error: cannot create {}: {}", state_dir.display(), e);
        std::process::exit(1);
    }
    setup_logging(&state_dir.join(LOG_NAME));

    if let Err(e) = run(cli, &state_dir).await {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state_dir: &Path) -> bksync::Result<()> {
    let config_file = cli.config.unwrap_or_else(|| config_path(state_dir));
    let config = Config::load(&config_file)?;
    let service = Service::open(state_dir, config)?;

    match cli.command {
        Command::Run => serve(&service, state_dir).await,
        Command::Status => print_status(&service),
        Command::Bookmark { key, remove } => {
            let entry = service.repository().bookmark(&key, !remove)?;
            println!("{} bookmarked={}", entry.key, entry.bookmarked);
            Ok(())
        }
        Command::SaveOffline { key, remove } => {
            let entry = service.repository().save_offline(&key, !remove)?;
            println!("{} saved_offline={}", entry.key, entry.saved_offline);
            Ok(())
        }
        Command::Refresh { key } => {
            let op = service.repository().request_refresh(&key)?;
            println!("queued {} for {}", op.kind, op.target_key);
            Ok(())
        }
        Command::Show { key } => {
            let result = service.show(&key).await?;
            let source = match result.source {
                LoadSource::Network => "network",
                LoadSource::CacheFresh => "cache",
                LoadSource::Offline => "offline",
            };
            match result.entry {
                Some(entry) => {
                    println!("{} ({})", entry.key, source);
                    println!("{}", entry.payload.title);
                    println!("{}", entry.payload.body);
                }
                None => println!("{}: not cached ({})", key, source),
            }
            if result.refresh_queued {
                println!("refresh queued");
            }
            Ok(())
        }
        Command::Sync => {
            let report = service.sync_once().await?;
            println!(
                "synced {}, failed {}, skipped {}",
                report.synced, report.failed, report.skipped
            );
            for dropped in &report.dropped {
                println!(
                    "dropped {} {} after {} attempts: {}",
                    dropped.kind, dropped.target_key, dropped.attempts, dropped.reason
                );
            }
            Ok(())
        }
        Command::Evict => {
            let removed = service.evict()?;
            println!("evicted {}", removed);
            Ok(())
        }
    }
}

async fn serve(service: &Service, state_dir: &Path) -> bksync::Result<()> {
    tracing::info!("bkd starting, state_dir={}", state_dir.display());

    let lock_file = acquire_lock(&state_dir.join(LOCK_NAME))?;
    let pid_path = state_dir.join(PID_NAME);
    write_pid_file(&pid_path)?;

    let result = service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await;

    cleanup(&pid_path);
    drop(lock_file);
    tracing::info!("bkd stopped");
    result
}

fn print_status(service: &Service) -> bksync::Result<()> {
    let status = service.status()?;
    println!("remote: {}", service.config().remote.url);
    println!("cached entries: {}", status.entries);
    println!("pending operations: {}", status.pending.len());
    for op in &status.pending {
        match &op.last_error {
            Some(err) => println!(
                "  #{} {} {} (retries {}, last error: {})",
                op.id, op.kind, op.target_key, op.retry_count, err
            ),
            None => println!("  #{} {} {}", op.id, op.kind, op.target_key),
        }
    }
    println!("pinned entries: {}", status.pinned.len());
    for entry in &status.pinned {
        let mut flags = Vec::new();
        if entry.bookmarked {
            flags.push("bookmarked");
        }
        if entry.saved_offline {
            flags.push("offline");
        }
        if !entry.synced {
            flags.push("unsynced");
        }
        println!("  {} [{}]", entry.key, flags.join(", "));
    }
    Ok(())
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another bkd instance is already running"))?;
    Ok(file)
}

fn write_pid_file(pid_path: &Path) -> std::io::Result<()> {
    fs::write(pid_path, format!("{}", std::process::id()))
}

fn cleanup(pid_path: &Path) {
    let _ = fs::remove_file(pid_path);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
