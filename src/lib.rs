//! # ClipBridge
//!
//! Bridges a remote device's clipboard, reached over HTTP (for example from a
//! phone shortcut), with the local desktop clipboard.
//!
//! A client can pull the current local clipboard (text or a list of files)
//! and push text, files, or media into it. Pushed files are materialized in
//! a staging directory so the native clipboard can reference them by path;
//! the files of the previous push are removed before the next one lands.

pub mod cli;
pub mod clipboard;
pub mod codec;
pub mod config;
pub mod notify;
pub mod server;
pub mod staging;
pub mod sync;

pub use config::Config;
pub use sync::SyncHandler;

/// Result type alias for ClipBridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ClipBridge operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Clipboard operation error
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] clipboard::ClipboardError),

    /// Wire encoding error
    #[error("Codec error: {0}")]
    Codec(#[from] codec::CodecError),

    /// Staging directory error
    #[error("Staging error: {0}")]
    Staging(#[from] staging::StagingError),

    /// Pull/push protocol error
    #[error("Sync error: {0}")]
    Sync(#[from] sync::SyncError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API version clients must announce in `X-API-Version`
pub const API_VERSION: &str = "1";
