//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Grouping indexed paths by shared fingerprint
//! - Electing one original per group with a deterministic tie-break

pub mod groups;
pub mod selector;

pub use groups::{find_duplicate_groups, DuplicateGroup, GroupStats};
pub use selector::{select_original, PreferencePolicy, Selection};
