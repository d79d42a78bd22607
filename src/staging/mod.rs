//! Staging directory for pushed files
//!
//! Native clipboards hold file references rather than file contents, so the
//! files of a push are written to a staging directory first. A manifest in
//! that directory records which paths the last push produced; the next push
//! deletes them before writing its own.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::StagingConfig;

/// File inside the staging directory listing the staged paths
pub const MANIFEST_FILE_NAME: &str = "_filename.txt";

/// Name used when a wire-supplied name has no usable file name component
const FALLBACK_FILE_NAME: &str = "unnamed";

/// Staging errors
#[derive(Debug, Error)]
pub enum StagingError {
    /// Staging directory cannot be created or used
    #[error("Staging directory {path:?} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Staging path exists but is not a directory
    #[error("Staging path {0:?} exists and is not a directory")]
    NotADirectory(PathBuf),

    /// A staged file could not be written
    #[error("Failed to write staged file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Manifest could not be written
    #[error("Failed to write manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file materialized on disk for the native clipboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute path of the staged file
    pub path: PathBuf,
    /// Name as supplied by the client
    pub original_name: String,
}

/// A path from the manifest that could not be deleted
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Result of removing the previous push's files
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files that were deleted
    pub removed: Vec<PathBuf>,
    /// Files listed in the manifest that no longer existed
    pub already_gone: Vec<PathBuf>,
    /// Files that could not be deleted
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.already_gone.is_empty() && self.failures.is_empty()
    }
}

/// Exclusive access to the staging directory for one push
pub struct StagingGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// The staging directory and its manifest.
///
/// One value per process; pushes serialize on [`StagingArea::lock`].
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl StagingArea {
    /// Use `dir` as the staging directory. The path must already be resolved.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Build from configuration, resolving relative paths against the
    /// executable's directory
    pub fn from_config(config: &StagingConfig) -> Result<Self, StagingError> {
        let exe = std::env::current_exe().map_err(|e| StagingError::Unavailable {
            path: config.temp_dir.clone(),
            source: e,
        })?;
        let exe_dir = exe.parent().unwrap_or_else(|| Path::new("/"));
        Ok(Self::new(resolve_dir(&config.temp_dir, exe_dir)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    /// Wait for exclusive use of the staging directory
    pub async fn lock(&self) -> StagingGuard<'_> {
        StagingGuard {
            _guard: self.lock.lock().await,
        }
    }

    /// Create the staging directory if it does not exist yet
    pub async fn ensure_directory(&self) -> Result<(), StagingError> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StagingError::NotADirectory(self.dir.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Creating staging directory {:?}", self.dir);
                tokio::fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| StagingError::Unavailable {
                        path: self.dir.clone(),
                        source: e,
                    })
            }
            Err(e) => Err(StagingError::Unavailable {
                path: self.dir.clone(),
                source: e,
            }),
        }
    }

    /// Delete every file listed in the manifest, then the manifest itself.
    ///
    /// Never fails: an absent or unreadable manifest means nothing is staged,
    /// and paths that cannot be deleted are reported without stopping the rest.
    pub async fn clean_previous(&self) -> CleanupReport {
        let manifest = self.manifest_path();
        let mut report = CleanupReport::default();

        let contents = match tokio::fs::read_to_string(&manifest).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!("Failed to read manifest {:?}: {}", manifest, e);
                return report;
            }
        };

        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = PathBuf::from(line);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => report.already_gone.push(path),
                Err(error) => {
                    warn!("Failed to delete staged file {:?}: {}", path, error);
                    report.failures.push(CleanupFailure { path, error });
                }
            }
        }

        if let Err(e) = tokio::fs::remove_file(&manifest).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove manifest {:?}: {}", manifest, e);
            }
        }

        debug!(
            removed = report.removed.len(),
            failed = report.failures.len(),
            "Cleaned previous staging generation"
        );
        report
    }

    /// Write one file into the staging directory.
    ///
    /// Only the final component of `name` is used, so a wire-supplied name
    /// can never place a file outside the directory.
    pub async fn stage_file(&self, name: &str, bytes: &[u8]) -> Result<StagedFile, StagingError> {
        let path = self.dir.join(sanitize_file_name(name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StagingError::Write {
                path: path.clone(),
                source: e,
            })?;

        Ok(StagedFile {
            path,
            original_name: name.to_string(),
        })
    }

    /// Replace the manifest with `paths`
    pub async fn write_manifest(&self, paths: &[PathBuf]) -> Result<(), StagingError> {
        let manifest = self.manifest_path();
        let joined = paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("\n");

        tokio::fs::write(&manifest, joined)
            .await
            .map_err(|e| StagingError::Manifest {
                path: manifest,
                source: e,
            })
    }

    /// Paths currently listed in the manifest
    pub async fn read_manifest(&self) -> Vec<PathBuf> {
        match tokio::fs::read_to_string(self.manifest_path()).await {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Resolve the configured staging directory.
///
/// `~` is expanded; a path that is still relative is joined onto `base`.
pub fn resolve_dir(configured: &Path, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(&configured.to_string_lossy()).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Reduce a wire-supplied name to a bare file name
pub fn sanitize_file_name(name: &str) -> String {
    // Both separators, whatever the host platform
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    let last = last.trim();

    let usable = !last.is_empty()
        && matches!(Path::new(last).components().next(), Some(Component::Normal(_)))
        && last != MANIFEST_FILE_NAME;

    if usable {
        last.to_string()
    } else {
        FALLBACK_FILE_NAME.to_string()
    }
}
