// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! bk-remote: reference WebSocket guide service for baedeker clients.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bk_remote::{server, ServerState};

/// bk-remote: Reference guide service
#[derive(Parser, Debug)]
#[command(name = "bk-remote")]
#[command(about = "Reference WebSocket guide service for baedeker clients")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// JSON file mapping cache keys to guide content
    #[arg(short, long)]
    seed: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting bk-remote server");
    info!("  Bind address: {}", args.bind);

    let state = match &args.seed {
        Some(path) => {
            info!("  Seed content: {}", path.display());
            ServerState::from_seed(path)?
        }
        None => ServerState::new(),
    };

    server::run(args.bind, state).await?;

    Ok(())
}
