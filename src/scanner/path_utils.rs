//! Path normalization utilities.
//!
//! Every path stored in the index is absolute and lexically normalized:
//! `.` components are dropped and `..` components pop their parent.
//! Symbolic links are *not* resolved, so a path keeps naming the entry
//! the walker actually visited.
//!
//! Picking an original out of a duplicate group depends on this: depth,
//! length and ordering comparisons are only meaningful between normalized
//! paths.
//!
//! # Example
//!
//! ```
//! use dupindex::scanner::path_utils::{is_within, normalize_lexically};
//! use std::path::Path;
//!
//! let p = normalize_lexically(Path::new("/data/./photos/../music/a.mp3"));
//! assert_eq!(p, Path::new("/data/music/a.mp3"));
//! assert!(is_within(&p, Path::new("/data")));
//! assert!(!is_within(&p, Path::new("/dat")));
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path without touching the filesystem.
///
/// `..` at the root stays at the root. Relative inputs stay relative.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make a path absolute against the current directory, then normalize it.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize_lexically(&absolute))
}

/// Check whether `path` is located in, or nested under, `dir`.
///
/// Matching is component-wise, so `/archive2/f` is not within `/archive`.
#[must_use]
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path != dir && path.starts_with(dir)
}

/// Number of path components, root included.
#[must_use]
pub fn segment_count(path: &Path) -> usize {
    path.components().count()
}

/// Path length in characters, as the selector measures it.
#[must_use]
pub fn char_length(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}

/// Render a path as the string stored in the index.
#[must_use]
pub fn to_index_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
