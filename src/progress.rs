//! Terminal progress reporting using indicatif.
//!
//! The indexer, rescan, cleanup and delete passes report through the
//! [`ProgressCallback`] trait. [`Progress`] renders those callbacks as
//! indicatif bars; library users can plug in their own implementation or
//! none at all.
//!
//! # Example
//!
//! ```
//! use dupindex::indexer::IndexerConfig;
//! use dupindex::progress::ProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct CountBatches(AtomicUsize);
//!
//! impl ProgressCallback for CountBatches {
//!     fn on_phase_start(&self, _phase: &str, _total: usize) {}
//!     fn on_progress(&self, _current: usize, _path: &str) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!     fn on_phase_end(&self, _phase: &str) {}
//! }
//!
//! let config = IndexerConfig::default().with_progress_callback(Arc::new(CountBatches::default()));
//! ```

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name used while walking and hashing a tree.
pub const PHASE_INDEXING: &str = "indexing";
/// Phase name used while re-hashing duplicate members.
pub const PHASE_RESCAN: &str = "rescan";
/// Phase name used while checking indexed paths for existence.
pub const PHASE_CLEANUP: &str = "cleanup";
/// Phase name used while deleting duplicates.
pub const PHASE_DELETE: &str = "delete";

/// Progress hooks for long-running passes.
///
/// `total` is `0` when the amount of work is not known up front, as with
/// a lazy directory walk.
pub trait ProgressCallback: Send + Sync {
    /// A phase is starting.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// `current` items are done; `path` is the latest one.
    fn on_progress(&self, current: usize, path: &str);

    /// An item of `bytes` bytes finished; used for throughput.
    fn on_item_completed(&self, _bytes: u64) {}

    /// The phase finished or was interrupted.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; `quiet` suppresses all drawing.
    ///
    /// ```
    /// use dupindex::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    /// Open-ended counter with byte throughput, for lazy walks.
    fn streaming_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bytes} hashed ({binary_bytes_per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn with_active(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new(0));
            pb.set_style(Self::streaming_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(phase.to_string());

        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_active(|pb| {
            // Streaming bars count bytes, so the file count goes in the message
            if pb.length() == Some(0) {
                pb.set_message(format!("{} files: {}", current, truncate_path(path, 40)));
            } else {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(path, 40));
            }
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        self.with_active(|pb| {
            if pb.length() == Some(0) {
                pb.inc(bytes);
            }
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut active) = self.active.lock() {
            if let Some(pb) = active.take() {
                pb.finish_with_message(format!("{phase} complete"));
            }
        }
    }
}

/// Shorten a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
