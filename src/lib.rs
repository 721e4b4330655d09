//! dupindex - persistent content-fingerprint index for duplicate files
//!
//! Walks directory trees, fingerprints every regular file with XXH64 on a
//! bounded worker pool, and keeps the results in a SQLite index that
//! survives interruption. Duplicate groups are read back from the index
//! and resolved to one deterministic original each.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod indexer;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;

use crate::actions::delete::{delete_duplicates, DeleteConfig, DeleteMode};
use crate::cli::{Cli, CleanupArgs, Commands, DeleteArgs, GroupArgs, ListArgs, ProcessArgs};
use crate::config::{validate_root, Config};
use crate::duplicates::{find_duplicate_groups, DuplicateGroup, GroupStats, PreferencePolicy};
use crate::error::ExitCode;
use crate::index::FileIndex;
use crate::indexer::{Indexer, IndexerConfig};
use crate::output::{CsvReport, TextReport};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::path_utils::normalize_path;
use crate::signal::ShutdownHandler;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid configuration (exit code 2) or when the
/// index cannot be opened or committed (exit code 1). Recovered per-file
/// errors yield [`ExitCode::PartialSuccess`] instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Commands::Process(args) => run_process(&args, config, cli.quiet),
        Commands::RescanDuplicates(args) => {
            if args.workers.is_some() {
                config.workers = args.workers;
            }
            run_rescan(&config, cli.quiet)
        }
        Commands::Cleanup(args) => run_cleanup(&args, &config, cli.quiet),
        Commands::ListDuplicates(args) => run_list(&args, &config, false),
        Commands::ListDuplicatesCsv(args) => run_list(&args, &config, true),
        Commands::DeleteDuplicates(args) => run_delete(&args, &config, cli.quiet),
    }
}

fn run_process(args: &ProcessArgs, mut config: Config, quiet: bool) -> Result<ExitCode> {
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if let Some(chunk) = args.chunk_size {
        config.chunk_size = usize::try_from(chunk).unwrap_or(usize::MAX);
    }
    config.skip_existing |= args.skip_existing;
    config.cleanup_missing |= args.cleanup;
    config.validate()?;
    validate_root(&args.path)?;

    let handler = signal::install_handler()?;
    let indexer = Indexer::new(open_index(&config)?, indexer_config(&config, &handler, quiet))?;

    let summary = indexer
        .index_tree(&args.path)
        .with_context(|| format!("Indexing {} failed", args.path.display()))?;
    if summary.interrupted {
        return Ok(ExitCode::Interrupted);
    }

    if config.cleanup_missing {
        indexer.cleanup_missing(Some(&args.path))?;
        if handler.is_shutdown_requested() {
            return Ok(ExitCode::Interrupted);
        }
    }

    Ok(if summary.has_recovered_errors() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_rescan(config: &Config, quiet: bool) -> Result<ExitCode> {
    config.validate()?;
    let handler = signal::install_handler()?;
    let indexer = Indexer::new(open_index(config)?, indexer_config(config, &handler, quiet))?;

    let summary = indexer.rescan_duplicates()?;
    Ok(if summary.interrupted {
        ExitCode::Interrupted
    } else if summary.has_recovered_errors() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_cleanup(args: &CleanupArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    config.validate()?;
    let handler = signal::install_handler()?;
    let indexer = Indexer::new(open_index(config)?, indexer_config(config, &handler, quiet))?;

    indexer.cleanup_missing(args.under.as_deref())?;
    Ok(if handler.is_shutdown_requested() {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    })
}

fn run_list(args: &ListArgs, config: &Config, csv: bool) -> Result<ExitCode> {
    let target = args.output_options().validate()?;
    let index = open_index(config)?;
    let groups = load_groups(&index, &args.group, config)?;

    let (writer, continuing) = target.open()?;
    if csv {
        CsvReport::new(&groups).write_to(writer, continuing)?;
    } else {
        let report = TextReport::new(&groups);
        report.log_originals();
        report.write_to(writer)?;
    }
    if let Some(path) = target.path() {
        log::info!("Report written to {}", path.display());
    }
    Ok(ExitCode::Success)
}

fn run_delete(args: &DeleteArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    let index = open_index(config)?;
    let groups = load_groups(&index, &args.group, config)?;
    let handler = signal::install_handler()?;

    let mode = if args.trash {
        DeleteMode::Trash
    } else {
        DeleteMode::Permanent
    };
    let delete_config = DeleteConfig::default()
        .with_mode(mode)
        .with_simulate(args.simulate)
        .with_verify(args.verify)
        .with_chunk_size(config.chunk_size)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress_reporter(quiet));

    let summary = delete_duplicates(&groups, &index, &delete_config)?;
    Ok(if summary.interrupted {
        ExitCode::Interrupted
    } else if !summary.failures.is_empty() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn open_index(config: &Config) -> Result<Arc<FileIndex>> {
    let index = FileIndex::open(&config.database)
        .with_context(|| format!("Failed to open index {}", config.database.display()))?;
    Ok(Arc::new(index))
}

fn indexer_config(config: &Config, handler: &ShutdownHandler, quiet: bool) -> IndexerConfig {
    IndexerConfig::default()
        .with_workers(config.effective_workers())
        .with_chunk_size(config.chunk_size)
        .with_skip_existing(config.skip_existing)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress_reporter(quiet))
}

fn progress_reporter(quiet: bool) -> Arc<dyn ProgressCallback> {
    Arc::new(Progress::new(quiet))
}

/// Duplicate groups with the CLI's preferences, falling back to the
/// configured preferred directories.
fn load_groups(
    index: &FileIndex,
    args: &GroupArgs,
    config: &Config,
) -> Result<Vec<DuplicateGroup>> {
    let directories = if args.prefer_directories.is_empty() {
        &config.preferred_directories
    } else {
        &args.prefer_directories
    };
    let preferred = directories
        .iter()
        .map(|dir| normalize_path(dir))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    let under = args.under.as_deref().map(normalize_path).transpose()?;

    let policy = PreferencePolicy::with_directories(preferred);
    let groups = find_duplicate_groups(index, under.as_deref(), &policy)?;

    let stats = GroupStats::from_groups(&groups);
    log::info!(
        "{} duplicate groups, {} duplicate files, {} reclaimable",
        stats.groups,
        stats.duplicate_files,
        ByteSize::b(stats.reclaimable_bytes)
    );
    if stats.unmatched_groups > 0 && !policy.is_empty() {
        log::warn!(
            "{} groups have no file in the preferred directories",
            stats.unmatched_groups
        );
    }
    Ok(groups)
}
