//! Report formatters for duplicate groups.
//!
//! This module provides two output formats:
//! - Plain text: one duplicate path per line, originals excluded
//! - CSV: every member with its status and fingerprint
//!
//! Reports go to stdout or to a file opened through [`OutputTarget`].
//!
//! # Example
//!
//! ```no_run
//! use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
//! use dupindex::index::FileIndex;
//! use dupindex::output::text::TextReport;
//! use std::path::Path;
//!
//! let index = FileIndex::open(Path::new("file_index.db")).unwrap();
//! let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
//! TextReport::new(&groups).write_to(std::io::stdout()).unwrap();
//! ```

pub mod csv;
pub mod text;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub use self::csv::CsvReport;
pub use text::TextReport;

/// Errors that can occur while writing a report.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The output file exists and neither append nor overwrite was asked.
    #[error("Output file already exists: {0} (use --append or --overwrite)")]
    AlreadyExists(PathBuf),

    /// I/O error while opening or writing.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Destination
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing the report failed.
    #[error("Write error: {0}")]
    Write(#[from] io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// How an output file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if the file exists
    #[default]
    CreateNew,
    /// Truncate an existing file
    Overwrite,
    /// Add to the end of an existing file
    Append,
}

/// Where a report is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output
    Stdout,
    /// A file
    File {
        /// Destination path
        path: PathBuf,
        /// Open mode
        mode: WriteMode,
    },
}

impl OutputTarget {
    /// File target, or stdout when `path` is `None`.
    #[must_use]
    pub fn from_option(path: Option<PathBuf>, mode: WriteMode) -> Self {
        match path {
            Some(path) => Self::File { path, mode },
            None => Self::Stdout,
        }
    }

    /// Destination file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout => None,
            Self::File { path, .. } => Some(path),
        }
    }

    /// Open the destination.
    ///
    /// The flag is `true` when appending to a file that already has
    /// content, so a CSV header can be skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::AlreadyExists`] in create-new mode when the
    /// file exists, or an I/O error if it cannot be opened.
    pub fn open(&self) -> Result<(Box<dyn Write>, bool), OutputError> {
        let (path, mode) = match self {
            Self::Stdout => return Ok((Box::new(io::stdout().lock()), false)),
            Self::File { path, mode } => (path, *mode),
        };

        let io_err = |source: io::Error| OutputError::Io {
            path: path.clone(),
            source,
        };

        let (file, continuing) = match mode {
            WriteMode::CreateNew => {
                let file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(path)
                    .map_err(|e| {
                        if e.kind() == io::ErrorKind::AlreadyExists {
                            OutputError::AlreadyExists(path.clone())
                        } else {
                            io_err(e)
                        }
                    })?;
                (file, false)
            }
            WriteMode::Overwrite => (File::create(path).map_err(io_err)?, false),
            WriteMode::Append => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(io_err)?;
                let has_content = file.metadata().map(|m| m.len() > 0).unwrap_or(false);
                (file, has_content)
            }
        };

        Ok((Box::new(io::BufWriter::new(file)), continuing))
    }
}
