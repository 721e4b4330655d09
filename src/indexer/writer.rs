//! Single index-writer thread.
//!
//! Workers never touch SQLite. They push [`WriteOp`]s into a bounded
//! channel; this thread buffers them and commits one transaction whenever
//! the coordinator sends [`WriteOp::Flush`], replying once the commit is
//! durable.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::index::FileIndex;
//! use dupindex::indexer::writer::{IndexWriter, WriteOp};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let index = Arc::new(FileIndex::open_in_memory().unwrap());
//! let writer = IndexWriter::spawn(index, 8).unwrap();
//!
//! let tx = writer.sender();
//! tx.send(WriteOp::Remove(PathBuf::from("/data/gone.txt"))).unwrap();
//! let report = writer.flush().unwrap();
//! assert_eq!(report.written, 0);
//!
//! drop(tx);
//! writer.finish().unwrap();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use super::IndexerError;
use crate::index::{FileIndex, FileRecord, IndexError};

/// Message accepted by the writer thread.
#[derive(Debug)]
pub enum WriteOp {
    /// Insert or update a record
    Upsert(FileRecord),
    /// Forget a path confirmed absent from disk
    Remove(PathBuf),
    /// Commit everything buffered so far, then reply
    Flush(Sender<Result<FlushReport, IndexError>>),
}

/// What one commit (or a whole run) wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records inserted or updated
    pub written: usize,
    /// Records rejected by the index
    pub failed: usize,
    /// Records deleted
    pub removed: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.written += other.written;
        self.failed += other.failed;
        self.removed += other.removed;
    }
}

/// Handle to the running writer thread.
pub struct IndexWriter {
    tx: Sender<WriteOp>,
    handle: JoinHandle<FlushReport>,
}

impl IndexWriter {
    /// Start the writer with a channel of `capacity` slots.
    ///
    /// # Arguments
    ///
    /// * `index` - Index the thread commits into
    /// * `capacity` - Channel slots; workers block once it is full
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(index: Arc<FileIndex>, capacity: usize) -> Result<Self, IndexerError> {
        let (tx, rx) = bounded(capacity.max(1));
        let handle = thread::Builder::new()
            .name("index-writer".to_string())
            .spawn(move || run(&index, &rx))
            .map_err(|e| IndexerError::ThreadPool(e.to_string()))?;
        Ok(Self { tx, handle })
    }

    /// Sender for workers.
    #[must_use]
    pub fn sender(&self) -> Sender<WriteOp> {
        self.tx.clone()
    }

    /// Commit everything sent so far and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Index`] if the commit failed and
    /// [`IndexerError::WriterGone`] if the thread is no longer running.
    pub fn flush(&self) -> Result<FlushReport, IndexerError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(WriteOp::Flush(ack_tx))
            .map_err(|_| IndexerError::WriterGone)?;
        let report = ack_rx.recv().map_err(|_| IndexerError::WriterGone)??;
        Ok(report)
    }

    /// Close the channel, commit leftovers and return run totals.
    ///
    /// Any sender clones handed to workers must be dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::WriterGone`] if the thread panicked.
    pub fn finish(self) -> Result<FlushReport, IndexerError> {
        drop(self.tx);
        self.handle.join().map_err(|_| IndexerError::WriterGone)
    }
}

fn run(index: &FileIndex, rx: &Receiver<WriteOp>) -> FlushReport {
    let mut upserts = Vec::new();
    let mut removals = Vec::new();
    let mut totals = FlushReport::default();

    for op in rx {
        match op {
            WriteOp::Upsert(record) => upserts.push(record),
            WriteOp::Remove(path) => removals.push(path),
            WriteOp::Flush(ack) => {
                let result = commit(index, &mut upserts, &mut removals);
                if let Ok(report) = &result {
                    totals.absorb(*report);
                }
                // Coordinator may have given up waiting
                let _ = ack.send(result);
            }
        }
    }

    if !upserts.is_empty() || !removals.is_empty() {
        match commit(index, &mut upserts, &mut removals) {
            Ok(report) => totals.absorb(report),
            Err(e) => log::error!("Final index flush failed: {}", e),
        }
    }

    log::debug!(
        "Index writer finished: {} written, {} failed, {} removed",
        totals.written,
        totals.failed,
        totals.removed
    );
    totals
}

fn commit(
    index: &FileIndex,
    upserts: &mut Vec<FileRecord>,
    removals: &mut Vec<PathBuf>,
) -> Result<FlushReport, IndexError> {
    let records = std::mem::take(upserts);
    let paths = std::mem::take(removals);
    if records.is_empty() && paths.is_empty() {
        return Ok(FlushReport::default());
    }

    let (outcome, removed) = index.apply_batch(&records, &paths)?;
    log::debug!(
        "Flushed batch: {} written, {} failed, {} removed",
        outcome.written,
        outcome.failed,
        removed
    );
    Ok(FlushReport {
        written: outcome.written,
        failed: outcome.failed,
        removed,
    })
}
