//! Deletion of duplicate files.
//!
//! # Overview
//!
//! [`delete_duplicates`] removes every duplicate of every group while
//! keeping the elected original:
//! - Groups flagged `no_matching_original` are skipped entirely
//! - Groups whose original is not a regular file (a symlink, for one) are
//!   kept and reported
//! - Deletion is permanent or goes to the system trash
//! - `simulate` logs what would happen without touching anything
//! - `verify` compares each duplicate byte for byte with its original
//!   before deleting it
//!
//! Deleted paths are removed from the index right away, one transaction
//! per group.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::actions::delete::{delete_duplicates, DeleteConfig};
//! use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
//! use dupindex::index::FileIndex;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("file_index.db")).unwrap();
//! let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
//! let summary = delete_duplicates(&groups, &index, &DeleteConfig::default().with_simulate(true)).unwrap();
//! println!("{} files would be deleted", summary.simulated.len());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytesize::ByteSize;
use thiserror::Error;

use crate::duplicates::DuplicateGroup;
use crate::index::{FileIndex, IndexError};
use crate::progress::{ProgressCallback, PHASE_DELETE};
use crate::scanner::{files_identical, DEFAULT_CHUNK_SIZE};

/// Error type for deletion of a single file.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The original to compare against is gone.
    #[error("original missing, refusing to delete {path}: {original}")]
    OriginalMissing {
        /// Duplicate that was kept
        path: PathBuf,
        /// Original that could not be read
        original: PathBuf,
    },

    /// The original is a symlink or another non-regular file.
    #[error("original is not a regular file, keeping its group: {0}")]
    OriginalNotAFile(PathBuf),

    /// Byte comparison found different content.
    #[error("content differs from original {original}: {path}")]
    ContentMismatch {
        /// Duplicate that was kept
        path: PathBuf,
        /// Original it was compared with
        original: PathBuf,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that stayed in place
        path: PathBuf,
        /// Platform message
        message: String,
    },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {source}")]
    PermanentDeleteFailed {
        /// File that stayed in place
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::OriginalNotAFile(p)
            | Self::OriginalMissing { path: p, .. }
            | Self::ContentMismatch { path: p, .. }
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Where deleted files go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Remove immediately
    #[default]
    Permanent,
    /// Move to the system trash
    Trash,
}

/// Configuration for [`delete_duplicates`].
#[derive(Clone)]
pub struct DeleteConfig {
    /// Permanent or trash
    pub mode: DeleteMode,
    /// Log only, change nothing
    pub simulate: bool,
    /// Compare content with the original before deleting
    pub verify: bool,
    /// Buffer size for verification reads
    pub chunk_size: usize,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DeleteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteConfig")
            .field("mode", &self.mode)
            .field("simulate", &self.simulate)
            .field("verify", &self.verify)
            .field("chunk_size", &self.chunk_size)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            mode: DeleteMode::Permanent,
            simulate: false,
            verify: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DeleteConfig {
    /// Set the delete mode.
    #[must_use]
    pub fn with_mode(mut self, mode: DeleteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable/disable dry run.
    #[must_use]
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Enable/disable byte-for-byte verification.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the verification buffer size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Outcome of [`delete_duplicates`].
#[derive(Debug, Default)]
pub struct DeleteSummary {
    /// Groups whose duplicates were handled
    pub groups_processed: usize,
    /// Groups skipped because no preferred original matched
    pub groups_skipped: usize,
    /// Files deleted
    pub deleted: Vec<PathBuf>,
    /// Files that would have been deleted in a dry run
    pub simulated: Vec<PathBuf>,
    /// Duplicates already gone from disk
    pub already_missing: usize,
    /// Files kept because of an error or failed verification
    pub failures: Vec<DeleteError>,
    /// Bytes freed (or that would be freed)
    pub bytes_freed: u64,
    /// Index records removed
    pub records_removed: usize,
    /// Whether the run stopped early on shutdown
    pub interrupted: bool,
}

impl DeleteSummary {
    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.simulated.is_empty() {
            return format!(
                "Would delete {} file(s), freeing {}",
                self.simulated.len(),
                ByteSize::b(self.bytes_freed)
            );
        }
        let mut text = format!(
            "Deleted {} file(s), freed {}",
            self.deleted.len(),
            ByteSize::b(self.bytes_freed)
        );
        if !self.failures.is_empty() {
            text.push_str(&format!(", {} failed", self.failures.len()));
        }
        if self.groups_skipped > 0 {
            text.push_str(&format!(
                ", {} group(s) skipped without a matching original",
                self.groups_skipped
            ));
        }
        text
    }
}

/// Delete the duplicates of every group, keeping each original.
///
/// A group whose original is a symlink or other non-regular file is left
/// alone and reported as a failure.
///
/// # Arguments
///
/// * `groups` - Groups from [`find_duplicate_groups`](crate::duplicates::find_duplicate_groups)
/// * `index` - Index to remove deleted and vanished paths from
/// * `config` - Mode, dry run, verification and shutdown settings
///
/// # Errors
///
/// Returns an error only if the index cannot be updated. Per-file problems
/// are collected in [`DeleteSummary::failures`].
pub fn delete_duplicates(
    groups: &[DuplicateGroup],
    index: &FileIndex,
    config: &DeleteConfig,
) -> Result<DeleteSummary, IndexError> {
    let mut summary = DeleteSummary::default();
    let callback = config.progress_callback.as_ref();
    let total: usize = groups
        .iter()
        .filter(|g| !g.no_matching_original)
        .map(DuplicateGroup::duplicate_count)
        .sum();
    if let Some(cb) = callback {
        cb.on_phase_start(PHASE_DELETE, total);
    }

    let mut handled = 0;
    for group in groups {
        if config.is_shutdown_requested() {
            log::info!("Deletion interrupted; remaining groups left untouched");
            summary.interrupted = true;
            break;
        }
        if group.no_matching_original {
            log::warn!(
                "Skipping group {}: no original in the preferred directories",
                group.fingerprint
            );
            summary.groups_skipped += 1;
            continue;
        }

        if let Err(e) = check_original(&group.original) {
            log::warn!("Skipping group {}: {}", group.fingerprint, e);
            handled += group.duplicate_count();
            summary.failures.push(e);
            continue;
        }

        let mut gone = Vec::new();
        for duplicate in &group.duplicates {
            handled += 1;
            if let Some(cb) = callback {
                cb.on_progress(handled, &duplicate.to_string_lossy());
            }
            if duplicate == &group.original {
                continue;
            }
            if config.verify {
                match verify_against_original(duplicate, &group.original, config) {
                    Ok(()) => {}
                    Err(DeleteError::NotFound(path)) => {
                        log::info!("Duplicate already gone: {}", path.display());
                        summary.already_missing += 1;
                        if !config.simulate {
                            gone.push(path);
                        }
                        continue;
                    }
                    Err(e) => {
                        log::warn!("Keeping {}: {}", duplicate.display(), e);
                        summary.failures.push(e);
                        continue;
                    }
                }
            }

            if config.simulate {
                log::info!("Would delete duplicate: {}", duplicate.display());
                summary.simulated.push(duplicate.clone());
                summary.bytes_freed += group.size;
                continue;
            }

            match delete_file(duplicate, config.mode) {
                Ok(size) => {
                    summary.bytes_freed += size;
                    summary.deleted.push(duplicate.clone());
                    gone.push(duplicate.clone());
                }
                Err(DeleteError::NotFound(path)) => {
                    log::info!("Duplicate already gone: {}", path.display());
                    summary.already_missing += 1;
                    gone.push(path);
                }
                Err(e) => {
                    log::error!("{}", e);
                    summary.failures.push(e);
                }
            }
        }

        summary.records_removed += index.remove_paths(&gone)?;
        summary.groups_processed += 1;
    }

    if let Some(cb) = callback {
        cb.on_phase_end(PHASE_DELETE);
    }
    log::info!("{}", summary.summary());
    Ok(summary)
}

/// Refuse originals that are symlinks, directories or special files.
///
/// A missing original is not rejected here; `verify` reports it per
/// duplicate.
fn check_original(original: &Path) -> Result<(), DeleteError> {
    match fs::symlink_metadata(original) {
        Ok(metadata) if !metadata.file_type().is_file() => {
            Err(DeleteError::OriginalNotAFile(original.to_path_buf()))
        }
        _ => Ok(()),
    }
}

fn verify_against_original(
    duplicate: &Path,
    original: &Path,
    config: &DeleteConfig,
) -> Result<(), DeleteError> {
    if let Err(e) = fs::symlink_metadata(original) {
        log::debug!("Original {} unreadable: {}", original.display(), e);
        return Err(DeleteError::OriginalMissing {
            path: duplicate.to_path_buf(),
            original: original.to_path_buf(),
        });
    }
    match fs::symlink_metadata(duplicate) {
        Ok(metadata) if !metadata.file_type().is_file() => {
            return Err(DeleteError::Io {
                path: duplicate.to_path_buf(),
                source: io::Error::other("not a regular file"),
            });
        }
        Err(e) => return Err(DeleteError::from_io(duplicate, e)),
        Ok(_) => {}
    }
    match files_identical(duplicate, original, config.chunk_size) {
        Ok(true) => Ok(()),
        Ok(false) => Err(DeleteError::ContentMismatch {
            path: duplicate.to_path_buf(),
            original: original.to_path_buf(),
        }),
        Err(e) => Err(DeleteError::from_io(duplicate, e)),
    }
}

/// Delete one file, returning its size.
fn delete_file(path: &Path, mode: DeleteMode) -> Result<u64, DeleteError> {
    let size = fs::symlink_metadata(path)
        .map_err(|e| DeleteError::from_io(path, e))?
        .len();

    match mode {
        DeleteMode::Permanent => {
            fs::remove_file(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DeleteError::NotFound(path.to_path_buf()),
                _ => DeleteError::PermanentDeleteFailed {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;
            log::info!("Deleted duplicate file: {}", path.display());
        }
        DeleteMode::Trash => {
            trash::delete(path).map_err(|e| DeleteError::TrashFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            log::info!("Moved to trash: {}", path.display());
        }
    }
    Ok(size)
}
