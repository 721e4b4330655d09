//! Streaming XXH64 content fingerprints.
//!
//! # Overview
//!
//! [`Hasher`] reads a file in fixed-size chunks and feeds each chunk into
//! an XXH64 state, so memory use is bounded by the chunk size no matter how
//! large the file is. Each worker owns one chunk buffer, giving an overall
//! footprint of `chunk_size × workers`.
//!
//! # Collision tradeoff
//!
//! XXH64 is non-cryptographic. Two different contents producing the same
//! fingerprint is treated as practically impossible for file deduplication.
//! Callers that need certainty before destroying data use
//! [`files_identical`] for a byte-for-byte comparison.

use std::fmt;
use std::fs::{self, File};
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use twox_hash::XxHash64;

use super::HashError;

/// Default read size per chunk (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest chunk size accepted from configuration (64 MiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

const SEED: u64 = 0;

/// Fixed-width 64-bit content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Wrap a raw digest value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Raw digest value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Fingerprint of an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut state = XxHash64::with_seed(SEED);
        state.write(data);
        Self(state.finish())
    }

    /// Lowercase, zero-padded 16 character hex form.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Error parsing a fingerprint from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint '{0}': expected 16 hex characters")]
pub struct ParseFingerprintError(String);

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(ParseFingerprintError(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseFingerprintError(s.to_string()))
    }
}

/// Result of fingerprinting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Content fingerprint
    pub fingerprint: Fingerprint,
    /// Number of bytes hashed
    pub size: u64,
    /// Modification time reported by the open handle
    pub modified: SystemTime,
}

/// Chunked file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            shutdown_flag: None,
        }
    }

    /// Set the chunk size, clamped to `1..=MAX_CHUNK_SIZE`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Abandon in-progress files once the flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint a file by streaming its content.
    ///
    /// Size and mtime come from the opened handle, so they describe the same
    /// inode that was hashed even if the path is replaced concurrently.
    /// Symbolic links are never followed: a path that is a link is rejected
    /// with [`HashError::NotAFile`] before anything is opened.
    ///
    /// # Arguments
    ///
    /// * `path` - File to fingerprint
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupindex::scanner::Hasher;
    /// use std::path::Path;
    ///
    /// let digest = Hasher::new().fingerprint_file(Path::new("photo.jpg")).unwrap();
    /// println!("{} ({} bytes)", digest.fingerprint, digest.size);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, is not a
    /// regular file, or shutdown was requested while reading.
    pub fn fingerprint_file(&self, path: &Path) -> Result<FileDigest, HashError> {
        let link_metadata = fs::symlink_metadata(path).map_err(|e| HashError::from_io(path, e))?;
        if !link_metadata.file_type().is_file() {
            return Err(HashError::NotAFile(path.to_path_buf()));
        }

        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let metadata = file.metadata().map_err(|e| HashError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(HashError::NotAFile(path.to_path_buf()));
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut state = XxHash64::with_seed(SEED);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut size: u64 = 0;

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            state.write(&buffer[..n]);
            size += n as u64;
        }

        log::trace!("Fingerprinted {} ({} bytes)", path.display(), size);

        Ok(FileDigest {
            fingerprint: Fingerprint(state.finish()),
            size,
            modified,
        })
    }
}

/// Compare two files byte by byte using bounded buffers.
///
/// # Errors
///
/// Returns an I/O error if either file cannot be read.
pub fn files_identical(a: &Path, b: &Path, chunk_size: usize) -> io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }

    let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
    let mut buf_a = vec![0u8; chunk_size];
    let mut buf_b = vec![0u8; chunk_size];

    loop {
        let n = read_full(&mut fa, &mut buf_a)?;
        let m = read_full(&mut fb, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as possible; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
