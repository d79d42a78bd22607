//! Desktop clipboard backed by clipboard-rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use percent_encoding::percent_decode_str;
use tokio::task::spawn_blocking;
use tracing::debug;

use super::{ClipboardError, ClipboardProvider, ContentKind};

/// Characters escaped when a path is turned into a `file://` URI
#[cfg(target_os = "linux")]
const URI_PATH: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const FILE_URI_PREFIX: &str = "file://";

/// Native clipboard of the current desktop session
pub struct NativeClipboard {
    ctx: Arc<Mutex<ClipboardContext>>,
}

impl NativeClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let ctx = ClipboardContext::new().map_err(platform_err)?;
        Ok(Self {
            ctx: Arc::new(Mutex::new(ctx)),
        })
    }

    /// Run `f` against the clipboard context on the blocking pool
    async fn with_context<T, F>(&self, f: F) -> Result<T, ClipboardError>
    where
        T: Send + 'static,
        F: FnOnce(&ClipboardContext) -> Result<T, ClipboardError> + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        spawn_blocking(move || {
            let guard = ctx
                .lock()
                .map_err(|_| ClipboardError::Platform("clipboard context poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| ClipboardError::Platform(format!("clipboard task failed: {}", e)))?
    }
}

#[async_trait]
impl ClipboardProvider for NativeClipboard {
    async fn content_type(&self) -> Result<Option<ContentKind>, ClipboardError> {
        self.with_context(|ctx| {
            // File managers also put the file names on the clipboard as text
            if ctx.has(ContentFormat::Files) {
                Ok(Some(ContentKind::File))
            } else if ctx.has(ContentFormat::Text) {
                Ok(Some(ContentKind::Text))
            } else {
                Ok(None)
            }
        })
        .await
    }

    async fn get_text(&self) -> Result<String, ClipboardError> {
        self.with_context(|ctx| ctx.get_text().map_err(platform_err))
            .await
    }

    async fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let text = text.to_string();
        self.with_context(move |ctx| ctx.set_text(text).map_err(platform_err))
            .await
    }

    async fn get_file_paths(&self) -> Result<Vec<PathBuf>, ClipboardError> {
        let files = self
            .with_context(|ctx| ctx.get_files().map_err(platform_err))
            .await?;
        debug!("Clipboard holds {} file(s)", files.len());
        Ok(files.iter().map(|f| path_from_clipboard(f)).collect())
    }

    async fn set_file_paths(&self, paths: &[PathBuf]) -> Result<(), ClipboardError> {
        let files: Vec<String> = paths.iter().map(|p| path_to_clipboard(p)).collect();
        self.with_context(move |ctx| ctx.set_files(files).map_err(platform_err))
            .await
    }

    fn name(&self) -> &str {
        "native"
    }
}

fn platform_err(e: Box<dyn std::error::Error + Send + Sync>) -> ClipboardError {
    ClipboardError::Platform(e.to_string())
}

/// Clipboard file entries may be `file://` URIs or plain paths
fn path_from_clipboard(entry: &str) -> PathBuf {
    match entry.strip_prefix(FILE_URI_PREFIX) {
        Some(rest) => PathBuf::from(percent_decode_str(rest).decode_utf8_lossy().into_owned()),
        None => PathBuf::from(entry),
    }
}

#[cfg(target_os = "linux")]
fn path_to_clipboard(path: &Path) -> String {
    format!(
        "{}{}",
        FILE_URI_PREFIX,
        percent_encoding::utf8_percent_encode(&path.to_string_lossy(), URI_PATH)
    )
}

#[cfg(not(target_os = "linux"))]
fn path_to_clipboard(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
