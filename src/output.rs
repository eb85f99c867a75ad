//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables.

use crate::events::Event;
use crate::scan::CategoryTally;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for operations
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidytree::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` items.
    ///
    /// ```no_run
    /// use tidytree::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// One styled line for an event, or `None` for events that only drive
    /// the progress bar.
    pub fn event_line(event: &Event) -> Option<String> {
        let line = match event {
            Event::RunStarted { .. } => return None,
            Event::Moved { .. } | Event::DirRemoved { .. } => {
                format!("{} {}", "✓".green(), event)
            }
            Event::Renamed { dry_run: false, .. } => format!("{} {}", "✓".green(), event),
            Event::Planned { .. }
            | Event::Backup { dry_run: true, .. }
            | Event::Renamed { dry_run: true, .. } => {
                format!("[DRY RUN] {}", event).yellow().to_string()
            }
            Event::Skipped { .. } | Event::Cancelled { .. } => {
                format!("{} {}", "⚠".yellow(), event)
            }
            Event::ScanError { .. }
            | Event::HashFailed { .. }
            | Event::DirRemoveFailed { .. }
            | Event::RenameFailed { .. } => format!("{} {}", "✗".red(), event),
            Event::Backup { .. } | Event::DuplicateGroup { .. } | Event::EmptyDir { .. } => {
                event.to_string().cyan().to_string()
            }
        };
        Some(line)
    }

    /// Prints a summary table of file counts and sizes per label.
    ///
    /// ```no_run
    /// use std::collections::BTreeMap;
    /// use tidytree::output::OutputFormatter;
    /// use tidytree::scan::CategoryTally;
    ///
    /// let mut rows = BTreeMap::new();
    /// rows.insert("documents".to_string(), CategoryTally { files: 15, bytes: 40_960 });
    /// rows.insert("images".to_string(), CategoryTally { files: 8, bytes: 2_000_000 });
    /// OutputFormatter::summary_table(&rows, 23);
    /// ```
    pub fn summary_table(rows: &BTreeMap<String, CategoryTally>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = rows
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {:>7} | {}",
            "Category".bold(),
            "Files".bold(),
            "Size".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 24));

        for (category, tally) in rows {
            println!(
                "{:<width$} | {:>7} | {}",
                category,
                tally.files.to_string().green(),
                format_bytes(tally.bytes),
                width = max_category_len
            );
        }

        let total_bytes: u64 = rows.values().map(|t| t.bytes).sum();
        println!("{}", "-".repeat(max_category_len + 24));
        println!(
            "{:<width$} | {:>7} | {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            format_bytes(total_bytes),
            width = max_category_len
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

/// Human-readable byte count using binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
