//! burst-race - barrier-synchronized burst reproducer for writeback races

#[cfg(not(unix))]
compile_error!("burst-race drives Unix file descriptors and only builds on Unix");

use anyhow::Result;
use clap::Parser;

mod cli;
mod report;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    tracing::debug!(?cli, "burst-race starting");

    cli.run()
}
