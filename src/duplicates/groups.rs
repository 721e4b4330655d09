//! Duplicate groups derived from the index.
//!
//! # Overview
//!
//! A duplicate group is every indexed path sharing one fingerprint, as
//! long as there are at least two of them. Groups are recomputed from
//! committed index rows on every call and never stored.
//!
//! # Example
//!
//! ```
//! use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
//! use dupindex::index::{FileIndex, FileRecord};
//! use dupindex::scanner::Fingerprint;
//! use chrono::Utc;
//! use std::path::PathBuf;
//!
//! let index = FileIndex::open_in_memory().unwrap();
//! for path in ["/a/x.txt", "/b/x.txt", "/c/other.txt"] {
//!     let fp = if path.ends_with("other.txt") { 2 } else { 1 };
//!     let record = FileRecord::new(PathBuf::from(path), Fingerprint::from_u64(fp), 3, Utc::now());
//!     index.upsert_one(&record).unwrap();
//! }
//!
//! let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].original, PathBuf::from("/a/x.txt"));
//! ```

use std::path::{Path, PathBuf};

use super::selector::{select_original, PreferencePolicy};
use crate::index::{FileIndex, IndexError};
use crate::scanner::path_utils::is_within;
use crate::scanner::Fingerprint;

/// Paths sharing one fingerprint, with the elected original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Shared content fingerprint
    pub fingerprint: Fingerprint,
    /// Size in bytes of each member
    pub size: u64,
    /// All members, sorted
    pub paths: Vec<PathBuf>,
    /// The member to keep
    pub original: PathBuf,
    /// Every other member, sorted
    pub duplicates: Vec<PathBuf>,
    /// Preferences were set but none matched a member
    pub no_matching_original: bool,
}

impl DuplicateGroup {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always false for a group produced by this module.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of members that are not the original.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Bytes that removing every duplicate would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates.len() as u64
    }
}

/// Summary figures for a set of groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Number of groups
    pub groups: usize,
    /// Duplicates across all groups, originals excluded
    pub duplicate_files: usize,
    /// Sum of [`DuplicateGroup::wasted_space`]
    pub reclaimable_bytes: u64,
    /// Groups flagged `no_matching_original`
    pub unmatched_groups: usize,
}

impl GroupStats {
    /// Tally `groups`.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        groups.iter().fold(Self::default(), |mut stats, group| {
            stats.groups += 1;
            stats.duplicate_files += group.duplicate_count();
            stats.reclaimable_bytes += group.wasted_space();
            stats.unmatched_groups += usize::from(group.no_matching_original);
            stats
        })
    }
}

/// Every fingerprint held by two or more paths, as groups sorted by
/// fingerprint.
///
/// With `subtree`, only members inside it count: a group is returned when
/// at least two of its members lie in the subtree, and it contains just
/// those members.
///
/// # Arguments
///
/// * `index` - Index to read committed records from
/// * `subtree` - Optional directory limiting which members count
/// * `policy` - Preferences handed to [`select_original`](super::select_original)
///
/// # Example
///
/// ```no_run
/// use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
/// use dupindex::index::FileIndex;
/// use std::path::{Path, PathBuf};
///
/// let index = FileIndex::open(Path::new("file_index.db")).unwrap();
/// let policy = PreferencePolicy::with_directories(vec![PathBuf::from("/photos/originals")]);
/// for group in find_duplicate_groups(&index, Some(Path::new("/photos")), &policy).unwrap() {
///     println!("{} keeps {}", group.fingerprint, group.original.display());
/// }
/// ```
///
/// # Errors
///
/// Returns an error if the index cannot be queried.
pub fn find_duplicate_groups(
    index: &FileIndex,
    subtree: Option<&Path>,
    policy: &PreferencePolicy,
) -> Result<Vec<DuplicateGroup>, IndexError> {
    let mut groups = Vec::new();

    for fingerprint in index.query_duplicate_fingerprints()? {
        let records = index.query_records_for_fingerprint(fingerprint)?;
        let members: Vec<_> = records
            .iter()
            .filter(|r| subtree.map_or(true, |dir| is_within(&r.path, dir)))
            .collect();
        if members.len() < 2 {
            continue;
        }

        let size = members[0].size;
        if members.iter().any(|r| r.size != size) {
            log::warn!(
                "Fingerprint {} shared by files of different sizes; treating as one group",
                fingerprint
            );
        }

        let paths: Vec<PathBuf> = members.iter().map(|r| r.path.clone()).collect();
        let Some(selection) = select_original(&paths, policy) else {
            continue;
        };

        groups.push(DuplicateGroup {
            fingerprint,
            size,
            paths,
            original: selection.original,
            duplicates: selection.duplicates,
            no_matching_original: selection.no_matching_original,
        });
    }

    log::debug!("Found {} duplicate groups", groups.len());
    Ok(groups)
}
