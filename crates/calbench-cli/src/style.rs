//! Visual styling utilities for the CLI.
//!
//! Spinners and progress bars for long-running operations, status markers
//! and table styling.

use std::time::Duration;

use calbench_core::Severity;
use calbench_types::DuplicationOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

// ============================================================================
// Progress Indicators
// ============================================================================

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

/// Standard progress bar characters
const PROGRESS_CHARS: &str = "=> ";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .expect("valid template")
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Progress bar style counting files.
pub fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
        .expect("valid template")
        .progress_chars(PROGRESS_CHARS)
}

/// Create a spinner for generic operations.
pub fn operation_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Create a progress bar for a batch of `total` files.
pub fn sync_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(progress_bar_style());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Print a message while suspending a progress bar to prevent visual glitches.
pub fn print_suspended(pb: &ProgressBar, message: &str) {
    pb.suspend(|| {
        eprintln!("{}", message);
    });
}

// ============================================================================
// Status Markers
// ============================================================================

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format an info message.
pub fn format_info(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[--] {}", message)
    } else {
        format!("{} {}", "[--]".cyan(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format an error message.
pub fn format_error(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[XX] {}", message)
    } else {
        format!("{} {}", "[XX]".red(), message)
    }
}

/// Marker for an ingest event severity.
pub fn format_event(severity: Severity, message: &str, no_color: bool) -> String {
    match severity {
        Severity::Info => format_info(message, no_color),
        Severity::Warning => format_warning(message, no_color),
        Severity::Error | Severity::Reject => format_error(message, no_color),
    }
}

/// Colored label for a duplication outcome.
pub fn format_outcome(outcome: DuplicationOutcome, no_color: bool) -> String {
    let label = outcome.to_string();
    if no_color {
        return label;
    }
    match outcome {
        DuplicationOutcome::Clean => format!("{}", label.green()),
        DuplicationOutcome::PartialDuplicate => format!("{}", label.yellow()),
        DuplicationOutcome::FullDuplicate => format!("{}", label.dimmed()),
    }
}

/// Format a section title.
pub fn format_title(title: &str, no_color: bool) -> String {
    if no_color {
        title.to_string()
    } else {
        format!("{}", title.bold())
    }
}

/// Apply the standard table style.
pub fn apply_table_style(table: &mut tabled::Table) {
    use tabled::settings::Style;
    table.with(Style::rounded());
}
