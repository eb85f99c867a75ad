//! Command-line interface for tidytree.
//!
//! This module handles:
//! - Argument parsing (clap derive)
//! - Layering command-line flags over the configuration file
//! - Running each operation on a worker thread while rendering its events
//! - Printing the final report, as a table or as JSON

use crate::config::TidyConfig;
use crate::duplicates::DuplicateStrategy;
use crate::events::Event;
use crate::organizer::{Mode, OperationStats, OrganizeOptions, Organizer, SkipReason};
use crate::output::{OutputFormatter, format_bytes};
use crate::scan::ScanSummary;
use crate::worker::{self, BackgroundTask};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};

const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Sort, deduplicate, clean up and rename files in a directory tree.
#[derive(Debug, Parser)]
#[command(name = "tidytree", version, about)]
pub struct Cli {
    /// Configuration file (default: .tidytreerc.toml, then ~/.config/tidytree/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Move files into folders by type, month or size
    Organize {
        dir: PathBuf,
        /// Root for the label folders (default: DIR itself)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Copy DIR to a backup_<timestamp> sibling first
        #[arg(long)]
        backup: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find duplicate files
    Duplicates {
        dir: PathBuf,
        #[arg(long, value_enum)]
        strategy: Option<DuplicateStrategy>,
        #[arg(long)]
        json: bool,
    },
    /// Remove empty directories
    Cleanup {
        dir: PathBuf,
        /// Only list the directories
        #[arg(long, conflicts_with = "delete")]
        preview: bool,
        /// Remove them even if the configuration says preview
        #[arg(long)]
        delete: bool,
    },
    /// Rename every file under a directory from a template
    Rename {
        dir: PathBuf,
        /// e.g. "file_{num:03d}{ext}" or "{name}_{num}{ext}"
        #[arg(long)]
        template: Option<String>,
        /// First counter value
        #[arg(long)]
        start: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Show file counts and sizes per category
    Stats {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use tidytree::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["tidytree", "organize", "/path/to/directory", "--dry-run"]);
/// match run(cli) {
///     Ok(()) => println!("Operation completed successfully"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(cli: Cli) -> Result<(), String> {
    let config = TidyConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let organizer = build_organizer(&config)?;

    match cli.command {
        Command::Organize {
            dir,
            dest,
            mode,
            dry_run,
            backup,
            json,
        } => {
            let options = OrganizeOptions {
                mode: mode.unwrap_or(config.organize.mode),
                dry_run: dry_run || config.organize.dry_run,
                backup: backup || config.organize.backup,
                destination: dest,
            };
            organize(organizer, &dir, options, json)
        }
        Command::Duplicates {
            dir,
            strategy,
            json,
        } => duplicates(
            organizer,
            &dir,
            strategy.unwrap_or(config.duplicates.strategy),
            json,
        ),
        Command::Cleanup {
            dir,
            preview,
            delete,
        } => {
            let preview_only = !delete && (preview || config.cleanup.preview_only);
            cleanup(organizer, &dir, preview_only)
        }
        Command::Rename {
            dir,
            template,
            start,
            dry_run,
        } => rename(
            organizer,
            &dir,
            template.unwrap_or(config.rename.template),
            start.unwrap_or(config.rename.start_number),
            dry_run,
        ),
        Command::Stats { dir, json } => stats(&organizer, &dir, json),
    }
}

fn build_organizer(config: &TidyConfig) -> Result<Organizer, String> {
    let table = config
        .categories
        .build_table()
        .map_err(|e| format!("Error in category configuration: {}", e))?;
    let filters = config
        .compile_filters()
        .map_err(|e| format!("Error compiling filters: {}", e))?;
    Ok(Organizer::new(table).with_filters(filters))
}

fn organize(
    organizer: Organizer,
    dir: &Path,
    options: OrganizeOptions,
    json: bool,
) -> Result<(), String> {
    if !json {
        if options.dry_run {
            OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", dir.display()));
        } else {
            OutputFormatter::info(&format!("Organizing contents of: {}", dir.display()));
        }
    }

    let source = dir.to_path_buf();
    let task = worker::spawn(EVENT_QUEUE_CAPACITY, move |sink, cancel| {
        organizer
            .with_events(sink)
            .with_cancel(cancel)
            .organize(&source, &options)
    });
    let stats = drive(task, !json, true)?.map_err(|e| e.to_string())?;

    if json {
        return print_json(&stats);
    }
    print_organize_summary(&stats);
    Ok(())
}

fn print_organize_summary(stats: &OperationStats) {
    OutputFormatter::summary_table(&stats.categories, stats.moved);

    let problems = stats
        .skipped_files
        .iter()
        .filter(|s| s.reason != SkipReason::AlreadyInPlace)
        .count();
    OutputFormatter::plain(&format!(
        "\n{} file(s) seen, {} {}, {} skipped",
        stats.total,
        stats.moved,
        if stats.dry_run { "would move" } else { "moved" },
        stats.skipped
    ));
    if let Some(backup) = &stats.backup {
        OutputFormatter::info(&format!("Backup saved to {}", backup.display()));
    }
    if !stats.scan_errors.is_empty() {
        OutputFormatter::warning(&format!(
            "{} entr(ies) could not be read",
            stats.scan_errors.len()
        ));
    }

    if stats.cancelled {
        OutputFormatter::warning("Cancelled before all files were processed.");
    } else if problems > 0 {
        OutputFormatter::warning(&format!(
            "{} file(s) could not be organized. Please review the messages above.",
            problems
        ));
    } else if stats.dry_run {
        OutputFormatter::success("Dry run complete. No files were modified.");
    } else {
        OutputFormatter::success("Organization complete!");
    }
}

fn duplicates(
    organizer: Organizer,
    dir: &Path,
    strategy: DuplicateStrategy,
    json: bool,
) -> Result<(), String> {
    let root = dir.to_path_buf();
    let task = worker::spawn(EVENT_QUEUE_CAPACITY, move |sink, cancel| {
        organizer
            .with_events(sink)
            .with_cancel(cancel)
            .find_duplicates_in(&root, strategy)
    });
    // Groups are printed from the report below rather than as they arrive
    let report = drive(task, false, false)?.map_err(|e| e.to_string())?;

    if json {
        return print_json(&report);
    }

    OutputFormatter::header(&format!("DUPLICATES ({:?})", strategy));
    if report.groups.is_empty() {
        OutputFormatter::success(&format!("No duplicates among {} file(s).", report.examined));
    }
    for group in &report.groups {
        OutputFormatter::info(&group.canonical.display().to_string());
        for duplicate in &group.duplicates {
            OutputFormatter::plain(&format!("  = {}", duplicate.display()));
        }
    }
    for (path, reason) in &report.failures {
        OutputFormatter::error(&format!("{}: {}", path.display(), reason));
    }
    if !report.groups.is_empty() {
        OutputFormatter::plain(&format!(
            "\n{} group(s), {} redundant file(s) among {} examined",
            report.groups.len(),
            report.redundant_files(),
            report.examined
        ));
    }
    Ok(())
}

fn cleanup(organizer: Organizer, dir: &Path, preview_only: bool) -> Result<(), String> {
    let root = dir.to_path_buf();
    let task = worker::spawn(EVENT_QUEUE_CAPACITY, move |sink, cancel| {
        organizer
            .with_events(sink)
            .with_cancel(cancel)
            .prune(&root, preview_only)
    });
    let report = drive(task, true, false)?.map_err(|e| e.to_string())?;

    if report.empty_dirs.is_empty() {
        OutputFormatter::success("No empty directories found.");
    } else if preview_only {
        OutputFormatter::dry_run_notice(&format!(
            "{} empty director(ies) would be removed. Run with --delete to remove them.",
            report.empty_dirs.len()
        ));
    } else {
        OutputFormatter::success(&format!(
            "Removed {} empty director(ies).",
            report.removed.len()
        ));
    }
    if !report.failures.is_empty() {
        OutputFormatter::warning(&format!(
            "{} director(ies) could not be processed.",
            report.failures.len()
        ));
    }
    Ok(())
}

fn rename(
    organizer: Organizer,
    dir: &Path,
    template: String,
    start_number: u64,
    dry_run: bool,
) -> Result<(), String> {
    let root = dir.to_path_buf();
    let task = worker::spawn(EVENT_QUEUE_CAPACITY, move |sink, cancel| {
        organizer
            .with_events(sink)
            .with_cancel(cancel)
            .rename_in(&root, &template, start_number, dry_run)
    });
    let report = drive(task, true, true)?.map_err(|e| e.to_string())?;

    let verb = if dry_run { "would be renamed" } else { "renamed" };
    OutputFormatter::plain(&format!(
        "\n{} of {} file(s) {}, {} unchanged, {} failed",
        report.renamed.len(),
        report.attempted(),
        verb,
        report.unchanged.len(),
        report.failures.len()
    ));
    if report.failures.is_empty() {
        OutputFormatter::success("Rename complete.");
    } else {
        OutputFormatter::warning("Some files could not be renamed. Please review the messages above.");
    }
    Ok(())
}

fn stats(organizer: &Organizer, dir: &Path, json: bool) -> Result<(), String> {
    let summary = organizer.summarize(dir).map_err(|e| e.to_string())?;
    if json {
        return print_json(&summary);
    }

    OutputFormatter::header(&format!("STATISTICS for {}", dir.display()));
    for line in stats_lines(&summary) {
        OutputFormatter::plain(&line);
    }
    Ok(())
}

/// One row per category, most files first, then the totals.
fn stats_lines(summary: &ScanSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .by_count()
        .into_iter()
        .map(|(category, tally)| {
            format!(
                "{:<12} {:>6} file(s) {:>10} {:>5.1}%",
                category,
                tally.files,
                format_bytes(tally.bytes),
                summary.percentage(category)
            )
        })
        .collect();
    lines.push(format!(
        "{:<12} {:>6} file(s) {:>10}",
        "total",
        summary.total_files,
        format_bytes(summary.total_bytes)
    ));
    lines
}

/// Renders events until the job finishes, then returns its result.
fn drive<T>(task: BackgroundTask<T>, show_events: bool, progress: bool) -> Result<T, String> {
    let pb = if progress && show_events {
        OutputFormatter::create_progress_bar(0)
    } else {
        ProgressBar::hidden()
    };

    for event in task.events() {
        match &event {
            Event::RunStarted { total, .. } => pb.set_length(*total as u64),
            Event::Moved { .. }
            | Event::Planned { .. }
            | Event::Skipped { .. }
            | Event::Renamed { .. }
            | Event::RenameFailed { .. } => pb.inc(1),
            _ => {}
        }
        if !show_events {
            continue;
        }
        if let Some(line) = OutputFormatter::event_line(&event) {
            if pb.is_hidden() {
                OutputFormatter::plain(&line);
            } else {
                pb.println(line);
            }
        }
    }
    pb.finish_and_clear();

    task.join()
        .map_err(|_| "The worker thread stopped unexpectedly".to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error serializing report: {}", e))?;
    OutputFormatter::plain(&text);
    Ok(())
}
