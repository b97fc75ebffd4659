//! Serves an in-memory tree over a Unix datagram socket until killed.
//!
//! Usage:
//!   treefs-server /tmp/treefs.sock --workers 4
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use treefs::{TreeFsBuilder, INODE_TABLE_SIZE, MAX_DIR_ENTRIES};
use treefs_server::Server;

#[derive(Parser, Debug)]
#[command(name = "treefs-server")]
#[command(about = "Serve an in-memory tree over a Unix datagram socket")]
struct Args {
    /// Socket path to bind
    socket: PathBuf,

    /// Number of worker threads sharing the socket
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Inode table capacity, root included
    #[arg(long, default_value_t = INODE_TABLE_SIZE)]
    inodes: usize,

    /// Entries per directory
    #[arg(long, default_value_t = MAX_DIR_ENTRIES)]
    dir_entries: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let fs = TreeFsBuilder::new()
        .with_inode_capacity(args.inodes)
        .with_dir_capacity(args.dir_entries)
        .build()
        .context("failed to initialize tree")?;

    let server = Server::bind(&args.socket, Arc::new(fs))
        .with_context(|| format!("failed to bind {}", args.socket.display()))?;
    info!("starting {} workers", args.workers);
    server.spawn(args.workers)?.wait()?;
    Ok(())
}
