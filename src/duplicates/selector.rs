//! Deterministic choice of the "original" in a duplicate group.
//!
//! # Rules
//!
//! Each rule narrows the candidate set; the first rule that leaves a single
//! candidate decides.
//!
//! 1. **Preferred directory** - walk the preferred directories in priority
//!    order and keep the members under the first one that matches anything.
//!    If none matches, every member stays a candidate and the selection is
//!    flagged `no_matching_original`.
//! 2. **Fewest path segments** - shallowest paths win.
//! 3. **Shortest path** - fewest characters win.
//! 4. **Lexicographic** - smallest path string wins.
//!
//! Input order never matters and repeated paths are collapsed, so the same
//! set of paths always elects the same original.
//!
//! # Example
//!
//! ```
//! use dupindex::duplicates::{select_original, PreferencePolicy};
//! use std::path::PathBuf;
//!
//! let paths = vec![PathBuf::from("/a/b/x.txt"), PathBuf::from("/a/x.txt")];
//! let selection = select_original(&paths, &PreferencePolicy::default()).unwrap();
//! assert_eq!(selection.original, PathBuf::from("/a/x.txt"));
//! assert!(!selection.no_matching_original);
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::scanner::path_utils::{char_length, is_within, segment_count, to_index_key};

/// Ordered list of directories whose members should be kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencePolicy {
    /// Highest priority first
    pub preferred_directories: Vec<PathBuf>,
}

impl PreferencePolicy {
    /// Policy with no preferred directories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy with the given directories, highest priority first.
    #[must_use]
    pub fn with_directories(directories: Vec<PathBuf>) -> Self {
        Self {
            preferred_directories: directories,
        }
    }

    /// Whether any preferred directory is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preferred_directories.is_empty()
    }
}

/// Result of [`select_original`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The path to keep
    pub original: PathBuf,
    /// Every other member, sorted
    pub duplicates: Vec<PathBuf>,
    /// Preferences were configured but no member lies under any of them
    pub no_matching_original: bool,
}

/// Pick the original among `paths`.
///
/// Returns `None` only for an empty input. Paths are expected to be
/// absolute and normalized.
///
/// # Rules
///
/// Each rule narrows the candidates left by the previous one:
///
/// 1. Members under the first preferred directory that holds any
/// 2. Fewest path segments
/// 3. Shortest path in characters
/// 4. Lexicographically smallest
///
/// # Arguments
///
/// * `paths` - Members of one duplicate group, in any order
/// * `policy` - Preferred directories, highest priority first
#[must_use]
pub fn select_original(paths: &[PathBuf], policy: &PreferencePolicy) -> Option<Selection> {
    let members: BTreeSet<&Path> = paths.iter().map(PathBuf::as_path).collect();
    if members.is_empty() {
        return None;
    }

    let (mut candidates, no_matching_original) = preferred_candidates(&members, policy);

    if candidates.len() > 1 {
        let fewest = candidates.iter().map(|p| segment_count(p)).min().unwrap_or(0);
        candidates.retain(|p| segment_count(p) == fewest);
    }
    if candidates.len() > 1 {
        let shortest = candidates.iter().map(|p| char_length(p)).min().unwrap_or(0);
        candidates.retain(|p| char_length(p) == shortest);
    }

    // Compare the stored string form so ordering matches the index
    let original = candidates
        .into_iter()
        .min_by(|a, b| to_index_key(a).cmp(&to_index_key(b)))?;

    let mut duplicates: Vec<PathBuf> = members
        .iter()
        .filter(|p| **p != original)
        .map(|p| p.to_path_buf())
        .collect();
    duplicates.sort_by_cached_key(|p| to_index_key(p));

    Some(Selection {
        original: original.to_path_buf(),
        duplicates,
        no_matching_original,
    })
}

/// First rule: restrict to the highest-priority preferred directory that
/// holds at least one member.
fn preferred_candidates<'a>(
    members: &BTreeSet<&'a Path>,
    policy: &PreferencePolicy,
) -> (Vec<&'a Path>, bool) {
    let all: Vec<&Path> = members.iter().copied().collect();
    if policy.is_empty() {
        return (all, false);
    }

    for dir in &policy.preferred_directories {
        let matching: Vec<&Path> = all
            .iter()
            .copied()
            .filter(|p| is_within(p, dir))
            .collect();
        if !matching.is_empty() {
            return (matching, false);
        }
    }
    (all, true)
}
