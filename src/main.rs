//! ClipBridge - HTTP bridge to the desktop clipboard
//!
//! This is the main entry point for the ClipBridge service.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipbridge::cli::{Cli, CliHandler};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut handler = CliHandler::new(cli.config)?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        handler.config().log_level.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("clipbridge={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "ClipBridge v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("TARGET"),
        env!("BUILD_DATE")
    );

    handler.handle_command(cli.command).await?;

    Ok(())
}
