//! Applies a command file to a fresh tree with a pool of worker threads, then
//! dumps the resulting tree.
//!
//! Usage:
//!   treefs-batch commands.txt tree.txt 4
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use treefs::{TreeFsBuilder, INODE_TABLE_SIZE, MAX_DIR_ENTRIES};
use treefs_server::run_batch;

#[derive(Parser, Debug)]
#[command(name = "treefs-batch")]
#[command(about = "Apply a command file to an in-memory tree")]
struct Args {
    /// File with one command per line
    input: PathBuf,

    /// Where to write the final tree
    output: PathBuf,

    /// Number of worker threads
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    threads: u16,

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

    let start = Instant::now();
    let input = File::open(&args.input)
        .with_context(|| format!("error opening input file {}", args.input.display()))?;
    let status = Mutex::new(io::stdout());
    run_batch(&fs, BufReader::new(input), args.threads as usize, &status)?;

    let output = File::create(&args.output)
        .with_context(|| format!("error opening output file {}", args.output.display()))?;
    let mut output = BufWriter::new(output);
    fs.print_tree(&mut output)?;
    output.flush()?;
    fs.teardown();

    println!("completed in {:.4} seconds", start.elapsed().as_secs_f64());
    Ok(())
}
