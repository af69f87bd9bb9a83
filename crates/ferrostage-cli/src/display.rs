//! Terminal output helpers for the ferrostage CLI

use console::style;
use ferrostage_engine::RunSummary;
use ferrostage_types::{ChangesetSummary, Snapshot};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Print what a snapshot captured
pub fn display_snapshot(snapshot: &Snapshot, output: &Path) {
    println!();
    println!("{}", style("Snapshot:").bold().underlined());
    println!("  Root: {}", style(&snapshot.root).cyan());
    println!("  Files: {}", style(snapshot.len()).green());
    println!(
        "  Total size: {}",
        style(format_bytes(snapshot.total_size())).green()
    );
    if !snapshot.error_paths.is_empty() {
        println!(
            "  Unreadable paths: {}",
            style(snapshot.error_paths.len()).yellow()
        );
    }
    println!("  Saved to: {}", style(output.display()).cyan());
}

/// Print per-status counts of a changeset
pub fn display_changeset(summary: &ChangesetSummary, output: &Path) {
    println!();
    println!("{}", style("Changes:").bold().underlined());
    println!("  Added: {}", style(summary.added).green());
    println!("  Modified: {}", style(summary.modified).yellow());
    println!("  Deleted: {}", style(summary.deleted).red());
    let delta = if summary.net_size_delta < 0 {
        format!("-{}", format_bytes(summary.net_size_delta.unsigned_abs()))
    } else {
        format!("+{}", format_bytes(summary.net_size_delta.unsigned_abs()))
    };
    println!("  Net size change: {}", style(delta).blue());
    println!("  Saved to: {}", style(output.display()).cyan());
}

/// Print the totals of a transfer run
pub fn display_run_summary(summary: &RunSummary) {
    println!();
    println!(
        "{}",
        style(format!("{} summary:", capitalize(&summary.mode.to_string())))
            .bold()
            .underlined()
    );
    println!("  Operations: {}", summary.total_input);
    println!("  Succeeded: {}", style(summary.succeeded).green());
    println!(
        "  Failed: {}",
        if summary.failed > 0 {
            style(summary.failed).red()
        } else {
            style(summary.failed).green()
        }
    );
    if summary.partial_failures > 0 {
        println!(
            "  Partial failures: {}",
            style(summary.partial_failures).yellow()
        );
    }
    println!("  Skipped: {}", style(summary.skipped).yellow());
    println!(
        "  Transferred: {} of {}",
        style(format_bytes(summary.transferred_bytes)).green(),
        format_bytes(summary.planned_bytes)
    );

    let duration = Duration::from_millis(summary.duration_ms);
    println!("  Duration: {}", style(format_duration(duration)).blue());
    println!(
        "  Transfer rate: {}",
        style(format!(
            "{:.2} MB/s",
            transfer_rate(summary.transferred_bytes, duration) / 1024.0 / 1024.0
        ))
        .blue()
    );
}

/// Bytes per second, zero for an empty duration
#[allow(clippy::cast_precision_loss)]
pub fn transfer_rate(bytes: u64, duration: Duration) -> f64 {
    if duration.as_secs_f64() > 0.0 {
        bytes as f64 / duration.as_secs_f64()
    } else {
        0.0
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Format bytes in human-readable format
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message
pub fn display_warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Create a spinner for a phase without a known length
pub fn create_spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        pb.set_style(spinner);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}
