//! Index record model.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::scanner::{FileDigest, Fingerprint};

/// One indexed file.
///
/// `path` is the unique key: the index holds at most one record per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Content fingerprint
    pub fingerprint: Fingerprint,
    /// Size in bytes
    pub size: u64,
    /// Filesystem modification time
    pub last_modified: DateTime<Utc>,
    /// When the path was last successfully hashed
    pub last_checked: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record checked "now".
    #[must_use]
    pub fn new(
        path: PathBuf,
        fingerprint: Fingerprint,
        size: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            fingerprint,
            size,
            last_modified,
            last_checked: Utc::now(),
        }
    }

    /// Build a record from a fresh hashing result.
    #[must_use]
    pub fn from_digest(path: &Path, digest: &FileDigest) -> Self {
        Self::new(
            path.to_path_buf(),
            digest.fingerprint,
            digest.size,
            system_time_to_utc(digest.modified),
        )
    }
}

/// Convert a filesystem timestamp to UTC.
#[must_use]
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Stored timestamp form: RFC 3339, nanoseconds, `Z` suffix.
#[must_use]
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp.
///
/// # Errors
///
/// Returns a parse error if the text is not RFC 3339.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|t| t.with_timezone(&Utc))
}
