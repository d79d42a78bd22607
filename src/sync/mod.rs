//! Pull and push between clients and the local clipboard
//!
//! [`SyncHandler`] is shared by all requests. Pulls read the clipboard
//! concurrently; file and media pushes hold the staging lock for the whole
//! cleanup → stage → manifest → clipboard sequence.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clipboard::{display_name, ClipboardError, ClipboardProvider, ContentKind};
use crate::codec::{self, CodecError};
use crate::notify::{Notification, NotificationQueue};
use crate::staging::{CleanupReport, StagedFile, StagingArea, StagingError};

/// Notification summary for pulled files
pub const FILES_COPIED: &str = "[文件] 被复制";
/// Notification summary for pushed files
pub const FILES_PASTED: &str = "[文件] 已复制到剪贴板";
/// Notification summary for pushed media
pub const MEDIA_PASTED: &str = "[图片媒体] 已复制到剪贴板";

/// Sync errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Clipboard holds something other than text or files
    #[error("无法识别剪切板内容")]
    Unrecognized,

    /// Native clipboard failed
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// Pushed batch could not be decoded
    #[error("Invalid file batch: {0}")]
    Codec(#[from] CodecError),

    /// Staging directory unusable
    #[error("Staging unavailable: {0}")]
    Staging(#[from] StagingError),
}

/// A file read from the local clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Base file name
    pub name: String,
    pub content: Vec<u8>,
}

/// Local clipboard content returned by a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardSnapshot {
    Text { body: String },
    FileSet { entries: Vec<FileEntry> },
}

/// A file in a pull response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFile {
    pub name: String,
    /// Base64-encoded content
    pub content: String,
}

/// Pull response body: `{"type": "text"|"file", "data": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PullResponse {
    Text(String),
    File(Vec<WireFile>),
}

impl From<ClipboardSnapshot> for PullResponse {
    fn from(snapshot: ClipboardSnapshot) -> Self {
        match snapshot {
            ClipboardSnapshot::Text { body } => PullResponse::Text(body),
            ClipboardSnapshot::FileSet { entries } => PullResponse::File(
                entries
                    .into_iter()
                    .map(|e| WireFile {
                        content: codec::encode(&e.content),
                        name: e.name,
                    })
                    .collect(),
            ),
        }
    }
}

/// Body of a text push
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: String,
}

/// Body of a file or media push
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileBody {
    /// Newline-joined file names
    #[serde(default)]
    pub names: String,
    /// Newline-joined base64 file contents, matching `names`
    #[serde(default)]
    pub files: String,
}

/// What a file or media push did
#[derive(Debug, Default)]
pub struct PushReport {
    /// Previous generation removed before staging
    pub cleanup: CleanupReport,
    /// Files now on the clipboard, in request order
    pub staged: Vec<StagedFile>,
    /// Entries dropped because they failed to decode
    pub decode_failures: Vec<CodecError>,
    /// Entries dropped because they failed to write
    pub write_failures: Vec<StagingError>,
}

impl PushReport {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.staged.iter().map(|f| f.path.clone()).collect()
    }
}

/// Protocol core shared by all requests
pub struct SyncHandler {
    clipboard: Arc<dyn ClipboardProvider>,
    staging: StagingArea,
    notifications: NotificationQueue,
}

impl SyncHandler {
    pub fn new(
        clipboard: Arc<dyn ClipboardProvider>,
        staging: StagingArea,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            clipboard,
            staging,
            notifications,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Read the local clipboard for `client`
    pub async fn pull(&self, client: &str) -> Result<ClipboardSnapshot, SyncError> {
        let kind = match self.clipboard.content_type().await {
            Ok(Some(kind)) => kind,
            Ok(None) => return Err(SyncError::Unrecognized),
            Err(e) => {
                info!("Failed to get content type of clipboard: {}", e);
                return Err(SyncError::Unrecognized);
            }
        };

        match kind {
            ContentKind::Text => {
                let body = self.clipboard.get_text().await.map_err(|e| {
                    warn!("Failed to get clipboard text: {}", e);
                    e
                })?;
                info!("Get clipboard text");
                self.notifications.push(Notification::copy(client, &body));
                Ok(ClipboardSnapshot::Text { body })
            }
            ContentKind::File => {
                let paths = self.clipboard.get_file_paths().await.map_err(|e| {
                    warn!("Failed to get path of files from clipboard: {}", e);
                    e
                })?;

                let mut entries = Vec::with_capacity(paths.len());
                for path in &paths {
                    match tokio::fs::read(path).await {
                        Ok(content) => entries.push(FileEntry {
                            name: display_name(path),
                            content,
                        }),
                        Err(e) => warn!("Failed to read clipboard file {:?}: {}", path, e),
                    }
                }

                info!(files = entries.len(), "Get clipboard files");
                self.notifications.push(Notification::copy(client, FILES_COPIED));
                Ok(ClipboardSnapshot::FileSet { entries })
            }
            ContentKind::Media => Err(SyncError::Unrecognized),
        }
    }

    /// Put pushed text on the local clipboard
    pub async fn push_text(&self, client: &str, body: TextBody) -> Result<(), SyncError> {
        self.clipboard.set_text(&body.text).await.map_err(|e| {
            warn!("Failed to set clipboard: {}", e);
            e
        })?;

        info!(text = %body.text, "Set clipboard text");
        self.notifications.push(Notification::paste(client, &body.text));
        Ok(())
    }

    /// Stage pushed files and put them on the local clipboard.
    ///
    /// Entries that fail to decode or write are dropped; the push goes ahead
    /// with the rest, even if nothing is left.
    pub async fn push_files(
        &self,
        client: &str,
        kind: ContentKind,
        body: FileBody,
    ) -> Result<PushReport, SyncError> {
        let report = {
            let _guard = self.staging.lock().await;
            self.stage_and_set(body).await?
        };

        info!(paths = ?report.paths(), "Set clipboard file");
        let summary = if kind == ContentKind::Media {
            MEDIA_PASTED
        } else {
            FILES_PASTED
        };
        self.notifications.push(Notification::paste(client, summary));
        Ok(report)
    }

    /// Cleanup, staging, manifest and clipboard update, in that order.
    /// Caller holds the staging lock.
    async fn stage_and_set(&self, body: FileBody) -> Result<PushReport, SyncError> {
        self.staging.ensure_directory().await.map_err(|e| {
            warn!("Staging directory unavailable: {}", e);
            e
        })?;

        let mut report = PushReport {
            cleanup: self.staging.clean_previous().await,
            ..PushReport::default()
        };

        let decoded = codec::split_named_blobs(&body.names, &body.files).map_err(|e| {
            warn!("Failed to get files from request: {}", e);
            e
        })?;
        if !decoded.is_clean() {
            for failure in &decoded.failures {
                warn!("Skipping pushed file: {}", failure);
            }
        }
        report.decode_failures = decoded.failures;

        for blob in decoded.items {
            match self.staging.stage_file(&blob.name, &blob.bytes).await {
                Ok(staged) => {
                    debug!(path = ?staged.path, "Staged file");
                    report.staged.push(staged);
                }
                Err(e) => {
                    warn!("Failed to create file: {}", e);
                    report.write_failures.push(e);
                }
            }
        }

        let paths = report.paths();
        if let Err(e) = self.staging.write_manifest(&paths).await {
            warn!("{}", e);
        }

        self.clipboard.set_file_paths(&paths).await.map_err(|e| {
            warn!("Failed to set clipboard: {}", e);
            e
        })?;

        Ok(report)
    }
}
