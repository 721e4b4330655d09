//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Lazy directory walking that never follows symbolic links
//! - Streaming XXH64 content fingerprints with bounded memory
//! - Lexical path normalization and prefix matching
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and regular-file discovery
//! - [`hasher`]: Chunked content fingerprinting
//! - [`path_utils`]: Absolute, normalized path handling
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{Hasher, Walker};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let walker = Walker::new(Path::new("."));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => {
//!             if let Ok(digest) = hasher.fingerprint_file(&path) {
//!                 println!("{} {}", digest.fingerprint, path.display());
//!             }
//!         }
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{
    files_identical, FileDigest, Fingerprint, Hasher, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
};
pub use walker::Walker;

/// Errors that can occur during directory scanning.
///
/// A scan error never aborts a walk: the affected directory is pruned
/// and the error is yielded to the caller for counting.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while reading a directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::Io { path: p, .. } => p,
        }
    }
}

/// Errors that can occur during file hashing.
///
/// These are transient: the file vanished or became unreadable between
/// enumeration and hashing. The worker pool logs and skips them.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path exists but is not a regular file anymore.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// Hashing stopped because shutdown was requested mid-file.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for the given path.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Whether the error means the file is gone from disk.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether no regular file exists at the path any more.
    ///
    /// True for a vanished path and for one replaced by a symlink,
    /// directory or special file. Records for such paths are stale.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotAFile(_))
    }
}
