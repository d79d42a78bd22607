use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::clipboard::{self, ClipboardProvider, MemoryClipboard};
use crate::config::Config;
use crate::notify::{LogNotifier, NotificationQueue};
use crate::server;
use crate::staging::StagingArea;
use crate::sync::SyncHandler;

#[derive(Parser)]
#[command(name = "clipbridge")]
#[command(about = "HTTP bridge between a remote device's clipboard and the desktop clipboard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the clipboard bridge")]
    Serve {
        /// Listen address, overrides the configuration
        #[arg(short, long)]
        listen: Option<String>,

        /// Use an in-memory clipboard instead of the desktop clipboard
        #[arg(long)]
        headless: bool,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

pub struct CliHandler {
    config: Config,
    config_path: Option<PathBuf>,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        // A missing explicit path is allowed so `config init` can create it
        let config = match config_path.as_deref() {
            Some(path) if !path.exists() => Config::default(),
            path => {
                Config::load_config(path).map_err(|e| anyhow!("Failed to load config: {}", e))?
            }
        };

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn missing_config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref().filter(|p| !p.exists())
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Serve { listen, headless } => self.serve(listen, headless).await,
            Commands::Config { action } => self.handle_config_action(action),
        }
    }

    async fn serve(&mut self, listen: Option<String>, headless: bool) -> Result<()> {
        if let Some(addr) = listen {
            self.config.listen_addr = addr;
        }
        let addr = self.config.socket_addr()?;
        if let Some(path) = self.missing_config_path() {
            warn!("Config file {} not found, using defaults", path.display());
        }

        let clipboard: Arc<dyn ClipboardProvider> = if headless {
            Arc::new(MemoryClipboard::new())
        } else {
            Arc::from(clipboard::create_provider().context("Failed to open desktop clipboard")?)
        };
        info!("Using {} clipboard", clipboard.name());

        let staging = StagingArea::from_config(&self.config.staging)?;
        info!("Staging pushed files in {:?}", staging.dir());

        let notifications = if self.config.notify.enabled {
            let (queue, _task) =
                NotificationQueue::spawn(Arc::new(LogNotifier), self.config.notify.queue_size);
            queue
        } else {
            NotificationQueue::disabled()
        };

        let handler = Arc::new(SyncHandler::new(clipboard, staging, notifications));
        let router = server::build_router(handler, &self.config.server);

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Listening on {}", addr);

        server::serve(listener, router, server::shutdown_signal()).await?;
        info!("ClipBridge stopped");
        Ok(())
    }

    fn handle_config_action(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("{}", self.config.to_toml()?);
                Ok(())
            }
            ConfigAction::Init { force } => {
                let path = self
                    .config_path
                    .clone()
                    .or_else(Config::default_path)
                    .ok_or_else(|| anyhow!("Could not find config directory"))?;
                Config::write_example(&path, force)?;
                println!("Wrote example configuration to {}", path.display());
                Ok(())
            }
            ConfigAction::Validate => {
                if let Some(path) = self.missing_config_path() {
                    return Err(anyhow!("Config file {} not found", path.display()));
                }
                self.config.validate_config()?;
                println!("Configuration is valid");
                Ok(())
            }
        }
    }
}
