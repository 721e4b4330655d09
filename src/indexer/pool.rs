//! Fixed-size hashing pool.
//!
//! A dedicated rayon pool of N threads processes one batch of at most N
//! paths at a time. Every outcome is sent to the index writer; nothing is
//! collected in shared memory.
//!
//! # Outcomes
//!
//! | Hash result              | Sent to the writer | Counted as  |
//! |--------------------------|--------------------|-------------|
//! | digest                   | upsert             | `hashed`    |
//! | not found / not a file   | removal            | `missing`   |
//! | unreadable               | nothing            | `failed`    |
//! | shutdown before or during| nothing            | `cancelled` |
//!
//! # Example
//!
//! ```no_run
//! use dupindex::index::FileIndex;
//! use dupindex::indexer::pool::WorkerPool;
//! use dupindex::indexer::writer::IndexWriter;
//! use dupindex::scanner::Hasher;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let index = Arc::new(FileIndex::open_in_memory().unwrap());
//! let writer = IndexWriter::spawn(Arc::clone(&index), 4).unwrap();
//! let pool = WorkerPool::new(4, Arc::new(Hasher::new())).unwrap();
//!
//! let batch = vec![PathBuf::from("/data/a.jpg"), PathBuf::from("/data/b.jpg")];
//! let tally = pool.process_batch(&batch, &writer.sender(), None, None);
//! writer.flush().unwrap();
//! println!("{} hashed, {} missing", tally.hashed, tally.missing);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use rayon::prelude::*;

use super::writer::WriteOp;
use super::IndexerError;
use crate::index::FileRecord;
use crate::progress::ProgressCallback;
use crate::scanner::{HashError, Hasher};

/// What happened to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Hashed; a record was sent for upsert
    Hashed {
        /// Bytes read
        size: u64,
    },
    /// Gone from disk or no longer a regular file; a removal was sent
    Missing,
    /// Unreadable; skipped
    Failed,
    /// Not started because shutdown was requested
    Cancelled,
}

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    /// Files hashed and queued for upsert
    pub hashed: usize,
    /// Files found missing and queued for removal
    pub missing: usize,
    /// Files that failed to hash
    pub failed: usize,
    /// Files skipped because of cancellation
    pub cancelled: usize,
    /// Bytes read while hashing
    pub bytes: u64,
}

impl BatchTally {
    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Hashed { size } => {
                self.hashed += 1;
                self.bytes += size;
            }
            FileOutcome::Missing => self.missing += 1,
            FileOutcome::Failed => self.failed += 1,
            FileOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Items that were actually processed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.hashed + self.missing + self.failed
    }
}

/// Worker pool bound to one hasher.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    hasher: Arc<Hasher>,
    workers: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Build a pool of `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ThreadPool`] if rayon cannot spawn threads.
    pub fn new(workers: usize, hasher: Arc<Hasher>) -> Result<Self, IndexerError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hash-worker-{i}"))
            .build()
            .map_err(|e| IndexerError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            hasher,
            workers,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hash every path in `batch`, sending results to `sink`.
    ///
    /// Returns once every worker has finished its item. Items not yet
    /// started when `shutdown` is set are reported as cancelled.
    ///
    /// # Arguments
    ///
    /// * `batch` - Paths to hash, at most one per worker
    /// * `sink` - Channel into the [`IndexWriter`](super::writer::IndexWriter)
    /// * `shutdown` - Optional cancellation flag, checked before each item
    /// * `progress` - Receives `on_item_completed` with the bytes hashed
    pub fn process_batch(
        &self,
        batch: &[PathBuf],
        sink: &Sender<WriteOp>,
        shutdown: Option<&Arc<AtomicBool>>,
        progress: Option<&Arc<dyn ProgressCallback>>,
    ) -> BatchTally {
        let outcomes: Vec<FileOutcome> = self.pool.install(|| {
            batch
                .par_iter()
                .map(|path| {
                    if shutdown.is_some_and(|f| f.load(Ordering::SeqCst)) {
                        return FileOutcome::Cancelled;
                    }
                    let outcome = self.process_file(path, sink);
                    if let (Some(cb), FileOutcome::Hashed { size }) = (progress, &outcome) {
                        cb.on_item_completed(*size);
                    }
                    outcome
                })
                .collect()
        });

        let mut tally = BatchTally::default();
        for outcome in &outcomes {
            tally.record(outcome);
        }
        tally
    }

    fn process_file(&self, path: &Path, sink: &Sender<WriteOp>) -> FileOutcome {
        match self.hasher.fingerprint_file(path) {
            Ok(digest) => {
                let size = digest.size;
                let record = FileRecord::from_digest(path, &digest);
                if sink.send(WriteOp::Upsert(record)).is_err() {
                    log::error!("Index writer stopped; dropping {}", path.display());
                    return FileOutcome::Failed;
                }
                FileOutcome::Hashed { size }
            }
            Err(e) if e.is_gone() => {
                if e.is_not_found() {
                    log::info!("File no longer exists, removing from index: {}", path.display());
                } else {
                    log::warn!("No longer a regular file, removing from index: {}", path.display());
                }
                if sink.send(WriteOp::Remove(path.to_path_buf())).is_err() {
                    log::error!("Index writer stopped; cannot remove {}", path.display());
                    return FileOutcome::Failed;
                }
                FileOutcome::Missing
            }
            Err(HashError::Interrupted(_)) => {
                log::debug!("Hashing abandoned on shutdown: {}", path.display());
                FileOutcome::Cancelled
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                FileOutcome::Failed
            }
        }
    }
}
