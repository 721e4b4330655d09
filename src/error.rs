//! Structured error handling and exit codes.
//!
//! Library functions return typed errors (`thiserror` enums per module);
//! the binary collects them as `anyhow::Error` and maps the root cause to
//! an [`ExitCode`]. With `--json-errors` the failure is printed as a
//! [`StructuredError`] instead of plain text.
//!
//! # Example
//!
//! ```
//! use dupindex::config::ConfigError;
//! use dupindex::error::{ExitCode, StructuredError};
//!
//! let err = anyhow::Error::new(ConfigError::InvalidWorkers).context("Loading settings");
//! let code = ExitCode::for_error(&err);
//! assert_eq!(code, ExitCode::ConfigError);
//!
//! let json = serde_json::to_string(&StructuredError::new(&err, code)).unwrap();
//! assert!(json.contains("DX002"));
//! ```

use serde::Serialize;

use crate::config::ConfigError;

/// Exit codes for the dupindex binary.
///
/// - 0: Success
/// - 1: General error (unexpected failure, index unusable)
/// - 2: Configuration error, reported before any work
/// - 3: Partial success (completed, but some files or rows were skipped)
/// - 130: Interrupted by user (Ctrl+C); finished work is in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Invalid configuration or arguments.
    ConfigError = 2,
    /// Completed with recovered errors.
    PartialSuccess = 3,
    /// Interrupted by a signal.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DX000",
            Self::GeneralError => "DX001",
            Self::ConfigError => "DX002",
            Self::PartialSuccess => "DX003",
            Self::Interrupted => "DX130",
        }
    }

    /// Exit code for an error that ended the run.
    ///
    /// A [`ConfigError`], even under added context, maps to
    /// [`ExitCode::ConfigError`]; everything else is a general error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<ConfigError>().is_some() {
            Self::ConfigError
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DX001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Underlying causes, outermost first
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
