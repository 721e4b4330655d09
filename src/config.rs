//! Layered application configuration.
//!
//! Values are merged in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config
//!    directory)
//! 3. `DUPINDEX_*` environment variables
//! 4. Command-line flags (applied by the caller)
//!
//! # Example
//!
//! ```toml
//! database = "/var/lib/dupindex/file_index.db"
//! workers = 8
//! chunk_size = 131072
//! preferred_directories = ["/archive", "/photos/originals"]
//! skip_existing = true
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::{OutputTarget, WriteMode};
use crate::scanner::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPINDEX_";

/// File name of the index when no database path is configured.
pub const DEFAULT_DATABASE_NAME: &str = "file_index.db";

/// Configuration problems, all reported before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be merged or parsed.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    MissingConfigFile(PathBuf),

    /// Zero workers requested.
    #[error("Worker count must be at least 1")]
    InvalidWorkers,

    /// Chunk size outside the supported range.
    #[error("Chunk size must be between 1 byte and {max} bytes, got {0}", max = MAX_CHUNK_SIZE)]
    InvalidChunkSize(usize),

    /// The scan root does not exist.
    #[error("Directory not found: {0}")]
    RootNotFound(PathBuf),

    /// The scan root is not a directory.
    #[error("Not a directory: {0}")]
    RootNotADirectory(PathBuf),

    /// `--append` and `--overwrite` given together.
    #[error("--append and --overwrite cannot be used together")]
    ConflictingOutputModes,

    /// The output file exists and no write mode was chosen.
    #[error("Output file already exists: {0} (use --append or --overwrite)")]
    OutputExists(PathBuf),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index database location
    pub database: PathBuf,
    /// Hashing workers; host parallelism when unset
    pub workers: Option<usize>,
    /// Bytes read per hashing chunk
    pub chunk_size: usize,
    /// Directories whose files are kept, highest priority first
    pub preferred_directories: Vec<PathBuf>,
    /// Skip files that already have a record
    pub skip_existing: bool,
    /// Remove records of vanished files after a scan
    pub cleanup_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            workers: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            preferred_directories: Vec::new(),
            skip_existing: false,
            cleanup_missing: false,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// With `explicit` set, that file must exist. Otherwise the platform
    /// config file is used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or any source fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::MissingConfigFile(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.is_file()),
        };
        if let Some(ref path) = file {
            log::debug!("Loading configuration from {}", path.display());
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// The layered figment, without CLI overrides.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error for zero workers or an unusable chunk size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }

    /// Worker count to use.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(crate::indexer::default_workers)
    }
}

/// Check that a scan root exists and is a directory.
///
/// # Errors
///
/// Returns [`ConfigError::RootNotFound`] or [`ConfigError::RootNotADirectory`].
pub fn validate_root(root: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::RootNotADirectory(root.to_path_buf())),
        Err(_) => Err(ConfigError::RootNotFound(root.to_path_buf())),
    }
}

/// Report destination options from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Output file; stdout when unset
    pub output: Option<PathBuf>,
    /// Append to an existing file
    pub append: bool,
    /// Replace an existing file
    pub overwrite: bool,
}

impl OutputOptions {
    /// Resolve the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if both modes are set, or if the file exists and
    /// neither is.
    pub fn validate(&self) -> Result<OutputTarget, ConfigError> {
        let mode = match (self.append, self.overwrite) {
            (true, true) => return Err(ConfigError::ConflictingOutputModes),
            (true, false) => WriteMode::Append,
            (false, true) => WriteMode::Overwrite,
            (false, false) => WriteMode::CreateNew,
        };
        if let Some(ref path) = self.output {
            if mode == WriteMode::CreateNew && path.exists() {
                return Err(ConfigError::OutputExists(path.clone()));
            }
        }
        Ok(OutputTarget::from_option(self.output.clone(), mode))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dupindex")
}

/// `config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Index in the platform data directory, or the working directory.
#[must_use]
pub fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join(DEFAULT_DATABASE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_NAME))
}
