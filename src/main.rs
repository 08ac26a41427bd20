//! Task Graph & Orchestrator demonstration CLI entry point.

use clap::Parser;
use taskgraph::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run(Cli::parse()).await
}
