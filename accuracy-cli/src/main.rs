//! Binary crate for the `accuracy` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Running the pipeline over JSON fixtures or live endpoints
//! - Human-friendly output formatting

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
