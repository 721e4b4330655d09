//! Incremental, interrupt-safe indexing of directory trees.
//!
//! # Overview
//!
//! [`Indexer`] drives the pipeline:
//!
//! 1. **Walk** - [`Walker`] lazily yields regular files under the root
//! 2. **Batch** - paths are grouped into batches of one item per worker
//! 3. **Hash** - [`WorkerPool`] fingerprints the batch in parallel
//! 4. **Flush** - the [`IndexWriter`] commits the batch as one transaction
//!    and acknowledges before the next batch starts
//!
//! Cancellation is checked between batches. Whatever finished before the
//! flag was seen is committed; earlier batches are never rolled back. A
//! later run with `skip_existing` resumes where the last one stopped.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::index::FileIndex;
//! use dupindex::indexer::{Indexer, IndexerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let index = Arc::new(FileIndex::open(Path::new("file_index.db")).unwrap());
//! let indexer = Indexer::new(index, IndexerConfig::default().with_workers(4)).unwrap();
//! let summary = indexer.index_tree(Path::new("/data")).unwrap();
//! println!("{} files hashed", summary.hashed);
//! ```

pub mod pool;
pub mod writer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use crate::index::{FileIndex, IndexError};
use crate::progress::{ProgressCallback, PHASE_CLEANUP, PHASE_INDEXING, PHASE_RESCAN};
use crate::scanner::path_utils::normalize_path;
use crate::scanner::{Hasher, ScanError, Walker, DEFAULT_CHUNK_SIZE};

pub use pool::{BatchTally, FileOutcome, WorkerPool};
pub use writer::{FlushReport, IndexWriter, WriteOp};

/// Paths checked between shutdown polls during cleanup.
const CLEANUP_CHUNK: usize = 256;

/// Host parallelism, or one if it cannot be determined.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Indexer settings.
#[derive(Clone)]
pub struct IndexerConfig {
    /// Worker threads, which is also the batch size
    pub workers: usize,
    /// Read size per hashing chunk
    pub chunk_size: usize,
    /// Skip paths that already have a record
    pub skip_existing: bool,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("workers", &self.workers)
            .field("chunk_size", &self.chunk_size)
            .field("skip_existing", &self.skip_existing)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_existing: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl IndexerConfig {
    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the hashing chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Skip paths already present in the index.
    #[must_use]
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Outcome of an indexing or rescan pass.
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    /// Regular files yielded by the walk (or queued for rescan)
    pub discovered: usize,
    /// Files fingerprinted
    pub hashed: usize,
    /// Records committed
    pub written: usize,
    /// Files skipped because they were already indexed
    pub skipped_existing: usize,
    /// Records removed because the file vanished
    pub missing_removed: usize,
    /// Files that could not be read
    pub hash_failures: usize,
    /// Directories or entries the walk could not read
    pub walk_errors: usize,
    /// Records the index rejected
    pub persist_failures: usize,
    /// Files left unprocessed because of cancellation
    pub cancelled: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Transactions committed
    pub batches_flushed: usize,
    /// Whether the pass stopped early on shutdown
    pub interrupted: bool,
    /// Wall-clock time
    pub duration: Duration,
}

impl IndexSummary {
    /// Whether any per-file or per-directory error was recovered from.
    #[must_use]
    pub fn has_recovered_errors(&self) -> bool {
        self.hash_failures + self.walk_errors + self.persist_failures > 0
    }

    fn log_summary(&self, what: &str) {
        log::info!(
            "{} {}: {} discovered, {} hashed ({}), {} skipped, {} removed, {} batches in {:.2?}",
            what,
            if self.interrupted { "interrupted" } else { "complete" },
            self.discovered,
            self.hashed,
            ByteSize::b(self.bytes_hashed),
            self.skipped_existing,
            self.missing_removed,
            self.batches_flushed,
            self.duration
        );
        if self.has_recovered_errors() {
            log::warn!(
                "{} recovered errors: {} unreadable files, {} walk errors, {} persistence failures",
                what,
                self.hash_failures,
                self.walk_errors,
                self.persist_failures
            );
        }
    }
}

/// Errors that stop an indexing pass.
#[derive(thiserror::Error, Debug)]
pub enum IndexerError {
    /// The root does not exist.
    #[error("Path not found: {0}")]
    InvalidRoot(PathBuf),

    /// The root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The index failed in a way that cannot be skipped.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Worker or writer threads could not be started.
    #[error("Failed to start worker threads: {0}")]
    ThreadPool(String),

    /// The writer thread stopped unexpectedly.
    #[error("Index writer thread stopped unexpectedly")]
    WriterGone,

    /// The current directory could not be resolved.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Walks, hashes and persists; see the [module docs](self).
pub struct Indexer {
    index: Arc<FileIndex>,
    config: IndexerConfig,
    pool: WorkerPool,
}

impl Indexer {
    /// Create an indexer writing to `index`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ThreadPool`] if the worker pool cannot start.
    pub fn new(index: Arc<FileIndex>, config: IndexerConfig) -> Result<Self, IndexerError> {
        let mut hasher = Hasher::new().with_chunk_size(config.chunk_size);
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        let pool = WorkerPool::new(config.workers, Arc::new(hasher))?;
        Ok(Self {
            index,
            config,
            pool,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index every regular file under `root`.
    ///
    /// Existing records are refreshed in place; with `skip_existing` set,
    /// paths already in the index are counted and passed over.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory to walk; symlinks below it are never followed
    ///
    /// # Errors
    ///
    /// Returns an error if the root is invalid or the index cannot commit.
    /// Cancellation is not an error: the summary has `interrupted` set.
    pub fn index_tree(&self, root: &Path) -> Result<IndexSummary, IndexerError> {
        let start = Instant::now();
        if !root.exists() {
            return Err(IndexerError::InvalidRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(IndexerError::NotADirectory(root.to_path_buf()));
        }
        let root = normalize_path(root)?;

        let known = if self.config.skip_existing {
            let known = self.index.query_all_paths()?;
            log::info!("Skipping {} already indexed paths", known.len());
            known
        } else {
            HashSet::new()
        };

        log::info!(
            "Indexing {} with {} workers",
            root.display(),
            self.pool.workers()
        );

        let mut walker = Walker::new(&root);
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut summary = self.drive(walker.walk(), &known, PHASE_INDEXING, 0, start)?;
        summary.duration = start.elapsed();
        summary.log_summary("Indexing");
        Ok(summary)
    }

    /// Hash an explicit list of paths through the pool.
    ///
    /// Vanished paths are removed from the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot commit.
    pub fn index_paths(&self, paths: Vec<PathBuf>) -> Result<IndexSummary, IndexerError> {
        let start = Instant::now();
        let total = paths.len();
        let mut summary = self.drive(
            paths.into_iter().map(Ok),
            &HashSet::new(),
            PHASE_RESCAN,
            total,
            start,
        )?;
        summary.duration = start.elapsed();
        Ok(summary)
    }

    /// Re-hash every path that currently belongs to a duplicate group.
    ///
    /// Changed files move to their new fingerprint and vanished ones are
    /// dropped, so stale groups dissolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be queried or committed.
    pub fn rescan_duplicates(&self) -> Result<IndexSummary, IndexerError> {
        let mut paths = Vec::new();
        let fingerprints = self.index.query_duplicate_fingerprints()?;
        for fingerprint in &fingerprints {
            paths.extend(self.index.query_paths_for_fingerprint(*fingerprint)?);
        }
        log::info!(
            "Rescanning {} paths in {} duplicate groups",
            paths.len(),
            fingerprints.len()
        );

        let summary = self.index_paths(paths)?;
        summary.log_summary("Rescan");
        Ok(summary)
    }

    /// Remove records whose path no longer exists, optionally only under
    /// `under`. Returns how many records were removed.
    ///
    /// Only a positive "not found" from the filesystem removes a record;
    /// unreadable parents keep theirs.
    ///
    /// # Arguments
    ///
    /// * `under` - Limit the pass to this subtree, or `None` for every record
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be queried or committed.
    pub fn cleanup_missing(&self, under: Option<&Path>) -> Result<usize, IndexerError> {
        let paths: Vec<PathBuf> = match under {
            Some(dir) => self.index.query_paths_under(&normalize_path(dir)?)?,
            None => {
                let mut all: Vec<_> = self.index.query_all_paths()?.into_iter().collect();
                all.sort();
                all
            }
        };
        let callback = self.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_phase_start(PHASE_CLEANUP, paths.len());
        }
        log::info!("Checking {} indexed paths for existence", paths.len());

        let mut removed = 0;
        let mut checked = 0;
        for chunk in paths.chunks(CLEANUP_CHUNK) {
            if self.config.is_shutdown_requested() {
                log::info!("Cleanup interrupted after {} paths", checked);
                break;
            }
            let missing: Vec<PathBuf> = chunk
                .iter()
                .filter(|path| is_confirmed_missing(path))
                .cloned()
                .collect();
            for path in &missing {
                log::info!("Removing missing file from index: {}", path.display());
            }
            removed += self.index.remove_paths(&missing)?;
            checked += chunk.len();
            if let (Some(cb), Some(last)) = (callback, chunk.last()) {
                cb.on_progress(checked, &last.to_string_lossy());
            }
        }

        if let Some(cb) = callback {
            cb.on_phase_end(PHASE_CLEANUP);
        }
        log::info!("Cleanup removed {} missing records", removed);
        Ok(removed)
    }

    /// Batch `source` through the pool and writer.
    fn drive<I>(
        &self,
        source: I,
        known: &HashSet<PathBuf>,
        phase: &str,
        total: usize,
        start: Instant,
    ) -> Result<IndexSummary, IndexerError>
    where
        I: Iterator<Item = Result<PathBuf, ScanError>>,
    {
        let batch_size = self.pool.workers();
        let writer = IndexWriter::spawn(Arc::clone(&self.index), batch_size)?;
        let sink = writer.sender();
        let callback = self.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_phase_start(phase, total);
        }

        let mut summary = IndexSummary::default();
        let mut batch: Vec<PathBuf> = Vec::with_capacity(batch_size);
        let mut outcome = Ok(());

        for entry in source {
            match entry {
                Ok(path) => {
                    summary.discovered += 1;
                    if known.contains(&path) {
                        summary.skipped_existing += 1;
                        continue;
                    }
                    batch.push(path);
                }
                Err(_) => {
                    summary.walk_errors += 1;
                    continue;
                }
            }

            if batch.len() >= batch_size {
                outcome = self.run_batch(&mut batch, &sink, &writer, &mut summary);
                if outcome.is_err() {
                    break;
                }
                if self.config.is_shutdown_requested() {
                    break;
                }
            }
        }

        // Partial final batch, or the in-flight one when the walk was cut short
        if outcome.is_ok() && !batch.is_empty() {
            outcome = self.run_batch(&mut batch, &sink, &writer, &mut summary);
        }

        drop(sink);
        let finished = writer.finish();
        if let Some(cb) = callback {
            cb.on_phase_end(phase);
        }
        outcome?;
        finished?;

        summary.interrupted = self.config.is_shutdown_requested();
        summary.duration = start.elapsed();
        Ok(summary)
    }

    fn run_batch(
        &self,
        batch: &mut Vec<PathBuf>,
        sink: &crossbeam_channel::Sender<WriteOp>,
        writer: &IndexWriter,
        summary: &mut IndexSummary,
    ) -> Result<(), IndexerError> {
        let callback = self.config.progress_callback.as_ref();
        let tally = self.pool.process_batch(
            batch,
            sink,
            self.config.shutdown_flag.as_ref(),
            callback,
        );
        if tally.completed() == 0 {
            summary.cancelled += tally.cancelled;
            log::debug!("Batch of {} cancelled before any file finished", tally.cancelled);
            batch.clear();
            return Ok(());
        }
        let report = writer.flush()?;

        summary.hashed += tally.hashed;
        summary.hash_failures += tally.failed;
        summary.cancelled += tally.cancelled;
        summary.bytes_hashed += tally.bytes;
        summary.written += report.written;
        summary.persist_failures += report.failed;
        summary.missing_removed += report.removed;
        summary.batches_flushed += 1;
        log::debug!(
            "Batch {} committed: {} hashed, {} missing, {} failed, {} cancelled",
            summary.batches_flushed,
            tally.hashed,
            tally.missing,
            tally.failed,
            tally.cancelled
        );

        if let (Some(cb), Some(last)) = (callback, batch.last()) {
            let processed = summary.hashed + summary.hash_failures + summary.missing_removed;
            cb.on_progress(processed, &last.to_string_lossy());
        }
        batch.clear();
        Ok(())
    }
}

/// True only when the filesystem positively reports the path absent.
fn is_confirmed_missing(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => false,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("Cannot check {}: {}; keeping record", path.display(), e);
            false
        }
    }
}
