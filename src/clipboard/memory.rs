//! In-process clipboard for headless runs and tests

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ClipboardError, ClipboardProvider, ContentKind};

/// What the in-memory clipboard currently holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MemoryContents {
    #[default]
    Empty,
    Text(String),
    Files(Vec<PathBuf>),
}

/// Clipboard kept in process memory
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<MemoryContents>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(MemoryContents::Text(text.into())),
        }
    }

    pub fn with_files(paths: Vec<PathBuf>) -> Self {
        Self {
            contents: Mutex::new(MemoryContents::Files(paths)),
        }
    }

    /// Snapshot of the current contents
    pub fn contents(&self) -> MemoryContents {
        self.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryContents>, ClipboardError> {
        self.contents
            .lock()
            .map_err(|_| ClipboardError::Platform("memory clipboard poisoned".to_string()))
    }
}

#[async_trait]
impl ClipboardProvider for MemoryClipboard {
    async fn content_type(&self) -> Result<Option<ContentKind>, ClipboardError> {
        Ok(match &*self.lock()? {
            MemoryContents::Empty => None,
            MemoryContents::Text(_) => Some(ContentKind::Text),
            MemoryContents::Files(_) => Some(ContentKind::File),
        })
    }

    async fn get_text(&self) -> Result<String, ClipboardError> {
        match &*self.lock()? {
            MemoryContents::Text(text) => Ok(text.clone()),
            _ => Err(ClipboardError::NoContent),
        }
    }

    async fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.lock()? = MemoryContents::Text(text.to_string());
        Ok(())
    }

    async fn get_file_paths(&self) -> Result<Vec<PathBuf>, ClipboardError> {
        match &*self.lock()? {
            MemoryContents::Files(paths) => Ok(paths.clone()),
            _ => Err(ClipboardError::NoContent),
        }
    }

    async fn set_file_paths(&self, paths: &[PathBuf]) -> Result<(), ClipboardError> {
        *self.lock()? = MemoryContents::Files(paths.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
