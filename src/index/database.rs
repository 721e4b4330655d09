//! SQLite-backed fingerprint index.
//!
//! # Schema
//!
//! One `files` table keyed by a unique `path`, with the fingerprint stored
//! as 16 lowercase hex characters and timestamps as RFC 3339 UTC strings.
//! `PRAGMA user_version` records [`SCHEMA_VERSION`]; an index written by a
//! newer build is refused rather than modified.
//!
//! The connection runs in WAL mode with a busy timeout, so a reader in
//! another process does not block the writer.
//!
//! # Example
//!
//! ```
//! use dupindex::index::{FileIndex, FileRecord};
//! use dupindex::scanner::Fingerprint;
//! use std::path::PathBuf;
//! use chrono::Utc;
//!
//! let index = FileIndex::open_in_memory().unwrap();
//! for name in ["/data/a.txt", "/data/b.txt"] {
//!     let record = FileRecord::new(
//!         PathBuf::from(name),
//!         Fingerprint::of_bytes(b"same"),
//!         4,
//!         Utc::now(),
//!     );
//!     index.upsert_one(&record).unwrap();
//! }
//! assert_eq!(index.query_duplicate_fingerprints().unwrap().len(), 1);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::record::{format_timestamp, parse_timestamp, FileRecord};
use crate::scanner::path_utils::{is_within, to_index_key};
use crate::scanner::Fingerprint;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    last_modified TEXT NOT NULL,
    last_checked TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_hash ON files (hash);
";

const UPSERT_SQL: &str = "
INSERT INTO files (hash, path, size, last_modified, last_checked)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(path) DO UPDATE SET
    hash = excluded.hash,
    size = excluded.size,
    last_modified = excluded.last_modified,
    last_checked = excluded.last_checked
";

const SELECT_RECORD: &str = "SELECT path, hash, size, last_modified, last_checked FROM files";

/// Errors raised by the persistent index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// SQLite reported an error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A thread panicked while holding the connection.
    #[error("Index connection lock poisoned")]
    LockPoisoned,

    /// A record was rejected before reaching SQLite.
    #[error("Invalid record for {path}: {reason}")]
    InvalidRecord {
        /// Offending path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// The on-disk schema is newer than this build understands.
    #[error("Unsupported index schema version {found}; upgrade dupindex to open this index")]
    UnsupportedSchema {
        /// Version found in the database
        found: i64,
    },
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Counts reported by [`FileIndex::upsert_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Records written
    pub written: usize,
    /// Records rejected, logged and skipped
    pub failed: usize,
}

/// Durable `path → FileRecord` mapping with lookup by fingerprint.
///
/// One instance per process, shared as `Arc<FileIndex>`. All access goes
/// through a single connection guarded by a mutex.
pub struct FileIndex {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIndex")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl FileIndex {
    /// Open or create the index at `path`.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!(
                    "Could not create index directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }
        let conn = Connection::open(path)?;
        let index = Self::init(conn, Some(path.to_path_buf()))?;
        log::debug!("Opened file index at {}", path.display());
        Ok(index)
    }

    /// Open a throwaway in-memory index.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot be initialized.
    pub fn open_in_memory() -> IndexResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> IndexResult<Self> {
        configure_pragmas(&conn)?;
        migrate_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Database file backing this index, if any.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| IndexError::LockPoisoned)
    }

    /// Run `f` with exclusive access to the connection.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> IndexResult<T>) -> IndexResult<T> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    /// Insert or update a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid or the write fails.
    pub fn upsert_one(&self, record: &FileRecord) -> IndexResult<()> {
        let checked = format_timestamp(&Utc::now());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
            write_record(&mut stmt, record, &checked)
        })
    }

    /// Insert or update many records in one transaction.
    ///
    /// A record that fails is logged and counted, the rest still commit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the transaction itself cannot be opened or
    /// committed.
    pub fn upsert_batch(&self, records: &[FileRecord]) -> IndexResult<UpsertOutcome> {
        self.apply_batch(records, &[]).map(|(outcome, _)| outcome)
    }

    /// Delete the record for `path`.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_by_path(&self, path: &Path) -> IndexResult<bool> {
        let key = to_index_key(path);
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM files WHERE path = ?1", params![key])?;
            Ok(removed > 0)
        })
    }

    /// Delete records for many paths in one transaction.
    ///
    /// Returns how many rows were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn remove_paths(&self, paths: &[PathBuf]) -> IndexResult<usize> {
        self.apply_batch(&[], paths).map(|(_, removed)| removed)
    }

    /// Upsert `records` and delete `removals` in a single transaction.
    ///
    /// Per-row failures are logged and skipped; upsert failures are counted
    /// in the returned [`UpsertOutcome`]. The second value is the number of
    /// rows deleted.
    ///
    /// # Arguments
    ///
    /// * `records` - Records to insert or refresh; `last_checked` is set to now
    /// * `removals` - Paths confirmed absent from disk
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be opened or committed.
    pub fn apply_batch(
        &self,
        records: &[FileRecord],
        removals: &[PathBuf],
    ) -> IndexResult<(UpsertOutcome, usize)> {
        if records.is_empty() && removals.is_empty() {
            return Ok((UpsertOutcome::default(), 0));
        }
        let checked = format_timestamp(&Utc::now());

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut outcome = UpsertOutcome::default();
            let mut removed = 0;
            {
                let mut upsert = tx.prepare_cached(UPSERT_SQL)?;
                for record in records {
                    match write_record(&mut upsert, record, &checked) {
                        Ok(()) => outcome.written += 1,
                        Err(e) => {
                            log::warn!("Failed to persist {}: {}", record.path.display(), e);
                            outcome.failed += 1;
                        }
                    }
                }

                let mut delete = tx.prepare_cached("DELETE FROM files WHERE path = ?1")?;
                for path in removals {
                    match delete.execute(params![to_index_key(path)]) {
                        Ok(n) => removed += n,
                        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
                    }
                }
            }
            tx.commit()?;
            Ok((outcome, removed))
        })
    }

    /// Look up the record for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, path: &Path) -> IndexResult<Option<FileRecord>> {
        let key = to_index_key(path);
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    &format!("{SELECT_RECORD} WHERE path = ?1"),
                    params![key],
                    read_record,
                )
                .optional()?;
            Ok(record)
        })
    }

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn len(&self) -> IndexResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Whether the index holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Fingerprints held by two or more distinct paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_duplicate_fingerprints(&self) -> IndexResult<Vec<Fingerprint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT hash FROM files GROUP BY hash HAVING COUNT(*) > 1 ORDER BY hash",
            )?;
            let hashes = stmt
                .query_map([], |row| {
                    let text: String = row.get(0)?;
                    parse_fingerprint(0, &text)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(hashes)
        })
    }

    /// Paths currently holding `fingerprint`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_paths_for_fingerprint(&self, fingerprint: Fingerprint) -> IndexResult<Vec<PathBuf>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT path FROM files WHERE hash = ?1 ORDER BY path")?;
            let paths = stmt
                .query_map(params![fingerprint.to_hex()], |row| {
                    row.get::<_, String>(0).map(PathBuf::from)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(paths)
        })
    }

    /// Full records currently holding `fingerprint`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_records_for_fingerprint(
        &self,
        fingerprint: Fingerprint,
    ) -> IndexResult<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached(&format!("{SELECT_RECORD} WHERE hash = ?1 ORDER BY path"))?;
            let records = stmt
                .query_map(params![fingerprint.to_hex()], read_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// Every known path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_all_paths(&self) -> IndexResult<HashSet<PathBuf>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT path FROM files")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0).map(PathBuf::from))?
                .collect::<Result<HashSet<_>, _>>()?;
            Ok(paths)
        })
    }

    /// Known paths located under `prefix`, sorted.
    ///
    /// Matching is by path component: `/data2/x` is not under `/data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_paths_under(&self, prefix: &Path) -> IndexResult<Vec<PathBuf>> {
        let mut key = to_index_key(prefix);
        if !key.ends_with(MAIN_SEPARATOR) {
            key.push(MAIN_SEPARATOR);
        }
        let key_len = i64::try_from(key.chars().count()).unwrap_or(i64::MAX);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT path FROM files WHERE substr(path, 1, ?1) = ?2 ORDER BY path",
            )?;
            let paths = stmt
                .query_map(params![key_len, key], |row| {
                    row.get::<_, String>(0).map(PathBuf::from)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(paths
                .into_iter()
                .filter(|p| is_within(p, prefix))
                .collect())
        })
    }
}

fn configure_pragmas(conn: &Connection) -> IndexResult<()> {
    // journal_mode returns a row, so it cannot go through execute_batch
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    log::debug!("SQLite pragmas configured (journal_mode={})", mode);
    Ok(())
}

fn migrate_schema(conn: &Connection) -> IndexResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(IndexError::UnsupportedSchema { found: version });
    }
    conn.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
        log::debug!("Index schema initialized (version {})", SCHEMA_VERSION);
    }
    Ok(())
}

fn write_record(
    stmt: &mut rusqlite::CachedStatement<'_>,
    record: &FileRecord,
    checked: &str,
) -> IndexResult<()> {
    if !record.path.is_absolute() {
        return Err(IndexError::InvalidRecord {
            path: record.path.clone(),
            reason: "path is not absolute".to_string(),
        });
    }
    let size = i64::try_from(record.size).map_err(|_| IndexError::InvalidRecord {
        path: record.path.clone(),
        reason: format!("size {} out of range", record.size),
    })?;

    stmt.execute(params![
        record.fingerprint.to_hex(),
        to_index_key(&record.path),
        size,
        format_timestamp(&record.last_modified),
        checked,
    ])?;
    Ok(())
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(0)?;
    let hash: String = row.get(1)?;
    let size: i64 = row.get(2)?;
    let modified: String = row.get(3)?;
    let checked: String = row.get(4)?;

    Ok(FileRecord {
        path: PathBuf::from(path),
        fingerprint: parse_fingerprint(1, &hash)?,
        size: u64::try_from(size)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?,
        last_modified: parse_stored_time(3, &modified)?,
        last_checked: parse_stored_time(4, &checked)?,
    })
}

fn parse_fingerprint(column: usize, text: &str) -> rusqlite::Result<Fingerprint> {
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_stored_time(column: usize, text: &str) -> rusqlite::Result<chrono::DateTime<Utc>> {
    parse_timestamp(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
