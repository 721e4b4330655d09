//! Plain-text duplicate list.
//!
//! One path per line, originals excluded, in group order. The elected
//! original of each group is logged at `info` so the list stays pipeable.

use std::io::Write;
use std::path::Path;

use super::OutputError;
use crate::duplicates::DuplicateGroup;

/// Plain-text formatter.
pub struct TextReport<'a> {
    groups: &'a [DuplicateGroup],
}

impl<'a> TextReport<'a> {
    /// Create a report over `groups`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup]) -> Self {
        Self { groups }
    }

    /// Duplicate paths in output order.
    pub fn duplicate_paths(&self) -> impl Iterator<Item = &'a Path> + 'a {
        self.groups
            .iter()
            .flat_map(|g| g.duplicates.iter().map(std::path::PathBuf::as_path))
    }

    /// Log which path was kept for each group.
    pub fn log_originals(&self) {
        for group in self.groups {
            if group.no_matching_original {
                log::info!(
                    "Duplicate group {} has no original in the preferred directories",
                    group.fingerprint
                );
            } else {
                log::info!(
                    "Original for {}: {}",
                    group.fingerprint,
                    group.original.display()
                );
            }
        }
    }

    /// Write the list, returning how many paths were written.
    ///
    /// # Example
    ///
    /// ```
    /// use dupindex::output::TextReport;
    ///
    /// let mut out = Vec::new();
    /// assert_eq!(TextReport::new(&[]).write_to(&mut out).unwrap(), 0);
    /// assert!(out.is_empty());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize, OutputError> {
        let mut lines = 0;
        for path in self.duplicate_paths() {
            writeln!(writer, "{}", path.display())?;
            lines += 1;
        }
        writer.flush()?;
        Ok(lines)
    }
}
