//! Binary crate for the `station` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive station configuration
//! - Human-friendly output of sun times and data freshness

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cmd = cli::Cli::parse();
    cmd.run()
}
