//! Clipboard abstraction layer
//!
//! The bridge only needs to know what kind of content the clipboard holds
//! and to read or replace it as text or as a list of file paths. Native
//! access lives behind [`ClipboardProvider`] so the protocol logic can run
//! against an in-memory clipboard as well.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub mod memory;
pub mod native;

pub use memory::MemoryClipboard;
pub use native::NativeClipboard;

/// Content kinds exchanged with clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Plain text
    Text,
    /// A list of files
    File,
    /// Photos or videos, staged like files
    Media,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::File => "file",
            ContentKind::Media => "media",
        }
    }

    /// Whether pushes of this kind go through the staging directory
    pub fn is_staged(&self) -> bool {
        matches!(self, ContentKind::File | ContentKind::Media)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ClipboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(ContentKind::Text),
            "file" => Ok(ContentKind::File),
            "media" => Ok(ContentKind::Media),
            other => Err(ClipboardError::UnsupportedType(other.to_string())),
        }
    }
}

/// Clipboard provider trait
#[async_trait]
pub trait ClipboardProvider: Send + Sync {
    /// Kind of the current clipboard content, `None` if it is neither text
    /// nor files
    async fn content_type(&self) -> Result<Option<ContentKind>, ClipboardError>;

    /// Get clipboard text
    async fn get_text(&self) -> Result<String, ClipboardError>;

    /// Replace clipboard content with text
    async fn set_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Get the paths of the files on the clipboard
    async fn get_file_paths(&self) -> Result<Vec<PathBuf>, ClipboardError>;

    /// Replace clipboard content with references to `paths`
    async fn set_file_paths(&self, paths: &[PathBuf]) -> Result<(), ClipboardError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Unsupported content type
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    /// No content available
    #[error("No clipboard content available")]
    NoContent,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Create the clipboard provider for the current desktop session
pub fn create_provider() -> Result<Box<dyn ClipboardProvider>, ClipboardError> {
    Ok(Box::new(NativeClipboard::new()?))
}

/// Base file name of a clipboard path, as shown to clients
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
