//! Command-line interface definitions.
//!
//! Global options (verbosity, config file, database) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Index a tree, resuming an earlier interrupted run
//! dupindex process ~/Pictures --skip-existing
//!
//! # List duplicates, keeping files under ~/Pictures/originals
//! dupindex list-duplicates --prefer-directory ~/Pictures/originals
//!
//! # Dry run of a delete with byte-for-byte verification
//! dupindex delete-duplicates --prefer-directory ~/Pictures/originals --simulate --verify
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::OutputOptions;

/// Persistent content-fingerprint index for finding duplicate files.
#[derive(Debug, Parser)]
#[command(name = "dupindex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Index database file
    #[arg(long, value_name = "PATH", global = true, env = "DUPINDEX_DATABASE")]
    pub database: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fingerprint every file under a directory and store the results
    Process(ProcessArgs),
    /// Re-hash every file that currently belongs to a duplicate group
    RescanDuplicates(RescanArgs),
    /// Remove records of files that no longer exist
    Cleanup(CleanupArgs),
    /// Print duplicates (originals excluded), one path per line
    ListDuplicates(ListArgs),
    /// Print every duplicate group as CSV
    ListDuplicatesCsv(ListArgs),
    /// Delete duplicates, keeping each group's original
    DeleteDuplicates(DeleteArgs),
}

/// Arguments for `process`.
#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Directory to index
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Number of hashing workers (default: number of CPUs)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Read size per hashing chunk (e.g., 64KiB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Skip files that are already in the index
    #[arg(long)]
    pub skip_existing: bool,

    /// Remove records of vanished files under DIR afterwards
    #[arg(long)]
    pub cleanup: bool,
}

/// Arguments for `rescan-duplicates`.
#[derive(Debug, Args)]
pub struct RescanArgs {
    /// Number of hashing workers (default: number of CPUs)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

/// Arguments for `cleanup`.
#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Only check records under this directory
    #[arg(long, value_name = "DIR")]
    pub under: Option<PathBuf>,
}

/// How duplicate groups are selected and resolved.
#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Keep files under this directory (repeat for priority order)
    #[arg(long = "prefer-directory", value_name = "DIR")]
    pub prefer_directories: Vec<PathBuf>,

    /// Only consider files under this directory
    #[arg(long, value_name = "DIR")]
    pub under: Option<PathBuf>,
}

/// Arguments for the list subcommands.
#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Append to the output file
    #[arg(long)]
    pub append: bool,

    /// Replace the output file
    #[arg(long)]
    pub overwrite: bool,
}

impl ListArgs {
    /// Output destination options.
    #[must_use]
    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            output: self.output.clone(),
            append: self.append,
            overwrite: self.overwrite,
        }
    }
}

/// Arguments for `delete-duplicates`.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub group: GroupArgs,

    /// Show what would be deleted without deleting
    #[arg(long)]
    pub simulate: bool,

    /// Compare each duplicate byte for byte with its original first
    #[arg(long)]
    pub verify: bool,

    /// Move files to the system trash instead of deleting them
    #[arg(long)]
    pub trash: bool,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupindex::cli::parse_size;
///
/// assert_eq!(parse_size("65536").unwrap(), 65_536);
/// assert_eq!(parse_size("64KiB").unwrap(), 65_536);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
