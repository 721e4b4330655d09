//! Persistent fingerprint index.
//!
//! This module provides the durable store behind every other component:
//! a SQLite table mapping each absolute path to its content fingerprint,
//! size and timestamps, with a secondary index on the fingerprint column.
//!
//! # Architecture
//!
//! * [`database`]: Connection handling, schema management and queries.
//! * [`record`]: The [`FileRecord`] model and timestamp encoding.
//!
//! # Consistency
//!
//! The path column is `UNIQUE`, so a path has at most one record. Duplicate
//! groups are always derived from committed rows with SQL; nothing is
//! cached in memory between calls.

pub mod database;
pub mod record;

pub use database::{FileIndex, IndexError, IndexResult, UpsertOutcome, SCHEMA_VERSION};
pub use record::FileRecord;
