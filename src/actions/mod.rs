//! File actions module.
//!
//! Actions consume [`DuplicateGroup`](crate::duplicates::DuplicateGroup)
//! values and change the filesystem. The only action is deletion of
//! duplicates; see [`delete`].

pub mod delete;

pub use delete::{delete_duplicates, DeleteConfig, DeleteError, DeleteMode, DeleteSummary};
