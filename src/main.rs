#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use clap::Parser;
use toolgate::Config;
use toolgate::cli::Cli;
use toolgate::session::JsonFileSessionStore;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.state_dir {
        Some(state_dir) => Config::load_or_init_at(state_dir)?,
        None => Config::load_or_init()?,
    };

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.observability.tracing_level()
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("setting default subscriber failed: {error}"))?;

    let store = JsonFileSessionStore::new();
    toolgate::app::dispatch(cli, config, &store).await
}
