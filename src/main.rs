//! shadow-bridge - drive shadow-cljs for a dev server.

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use shadow_bridge::cli::{self, Cli, Commands};
use shadow_bridge::config::BridgeConfig;
use shadow_bridge::{Bridge, logger};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    shadow_bridge::core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let session = BridgeConfig::load(&cli.config)?.into_session(cli.command.builds())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let bridge = Bridge::new(session);
        match &cli.command {
            Commands::Watch { .. } => cli::watch::run(&bridge).await,
            Commands::Release { .. } => cli::release::run(&bridge).await,
            Commands::Load { id, watch } => cli::inspect::load(&bridge, id, *watch).await,
            Commands::Transform { file } => cli::inspect::transform(&bridge, file),
        }
    })
}
