mod cli;
mod commands;

use anyhow::{Context as _, Result};
use clap::Parser;

use crate::cli::Cli;
use crate::commands::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = subbrain_core::config::load_config();
    if let Some(panel) = cli.panel {
        config.panel_url = panel;
    }
    log::debug!("Using control panel at {}", config.panel_url);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("subbrain")
        .build()
        .context("Failed to create tokio runtime")?;

    let ctx = Context::new(config, runtime.handle().clone());
    runtime.block_on(commands::run(&ctx, cli.command))
}
