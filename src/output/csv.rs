//! CSV report of duplicate groups.
//!
//! # Columns
//!
//! - `status`: `original`, `duplicate`, or
//!   `duplicate - no matching original path` for the elected member of a
//!   group where no preferred directory matched
//! - `path`: Absolute path to the file
//! - `fingerprint`: XXH64 content fingerprint (16 hex characters)
//!
//! Each group contributes its elected member first, then its duplicates.
//!
//! # Example
//!
//! ```
//! use dupindex::output::CsvReport;
//!
//! let csv = CsvReport::new(&[]).render().unwrap();
//! assert_eq!(csv, "status,path,fingerprint\n");
//! ```

use std::io;

use serde::Serialize;

use super::OutputError;
use crate::duplicates::DuplicateGroup;

/// Status for a group's kept member.
pub const STATUS_ORIGINAL: &str = "original";
/// Status for every other member.
pub const STATUS_DUPLICATE: &str = "duplicate";
/// Status for the elected member when no preferred directory matched.
pub const STATUS_NO_MATCHING_ORIGINAL: &str = "duplicate - no matching original path";

const HEADER: [&str; 3] = ["status", "path", "fingerprint"];

/// A single row in the CSV output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    /// Member status
    pub status: &'static str,
    /// Absolute path
    pub path: String,
    /// Fingerprint hex
    pub fingerprint: String,
}

/// CSV formatter.
pub struct CsvReport<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> CsvReport<'a> {
    /// Create a report over `groups`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Rows in output order.
    #[must_use]
    pub fn rows(&self) -> Vec<CsvRow> {
        let mut rows = Vec::new();
        for group in self.groups {
            let fingerprint = group.fingerprint.to_hex();
            let status = if group.no_matching_original {
                STATUS_NO_MATCHING_ORIGINAL
            } else {
                STATUS_ORIGINAL
            };
            rows.push(CsvRow {
                status,
                path: group.original.to_string_lossy().into_owned(),
                fingerprint: fingerprint.clone(),
            });
            rows.extend(group.duplicates.iter().map(|path| CsvRow {
                status: STATUS_DUPLICATE,
                path: path.to_string_lossy().into_owned(),
                fingerprint: fingerprint.clone(),
            }));
        }
        rows
    }

    /// Write the CSV, with a header row unless `continuing` an existing
    /// file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W, continuing: bool) -> Result<usize, OutputError> {
        // Header goes out even for an empty report
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        if !continuing {
            csv_writer.write_record(HEADER)?;
        }

        let rows = self.rows();
        for row in &rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(rows.len())
    }

    /// Render the CSV as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, OutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, false)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
