use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod config;
mod db;
mod error;
mod events;
mod executor;
mod logging;
mod planner;
mod scanner;
mod session;

#[cfg(test)]
mod tests;

use cli::Cli;
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let _log_guard = logging::init_logging(cli.verbose, config.log_file.as_deref())?;
    debug!("consld8 v{} using config {}", env!("CARGO_PKG_VERSION"), config.config_path);

    cli::run(cli, config).await
}
