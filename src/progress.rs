//! Progress reporting for labelling and compaction runs
//!
//! Provides a determinate indicatif bar while files are processed and a
//! styled summary once the run is over.

use crate::content::CompactStats;
use crate::pool::{LabelProgress, LabelRunResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar sized to the number of input files
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a bar for `total` files
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        let bar_style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(bar_style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the display from a run snapshot
    pub fn update(&self, progress: &LabelProgress) {
        if self.bar.length() != Some(progress.total) {
            self.bar.set_length(progress.total);
        }
        self.bar.set_position(progress.completed);
        self.bar.set_message(format!(
            "Labeled: {} | Errors: {} | Rate: {:.0}/s",
            format_number(progress.labeled),
            format_number(progress.errors),
            progress.files_per_second(),
        ));
    }

    /// Advance by one file
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Print a header at the start of a labelling run
pub fn print_header(input: &str, workers: usize, classifier: &str, output: &str) {
    println!();
    println!(
        "{} {}",
        style("av-labeler").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Classifier:").bold(), classifier);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

/// Print a summary of a labelling run
pub fn print_summary(result: &LabelRunResult) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.total_files as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Labelling Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} ({})",
        style("Reports:").bold(),
        format_number(result.total_files),
        format_size(result.input_bytes, BINARY)
    );
    println!(
        "  {} {} ({} families)",
        style("Labeled:").bold(),
        format_number(result.labeled),
        format_number(result.families as u64)
    );
    if result.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(result.errors)
        );
    }
    if result.discovery.errors > 0 {
        println!(
            "  {} {}",
            style("Unreadable entries:").yellow().bold(),
            format_number(result.discovery.errors)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {}",
        style("Report:").bold(),
        result.output_path.display()
    );
    println!();
}

/// Print a summary of a compaction run
pub fn print_compact_summary(stats: &CompactStats, duration: Duration) {
    println!();
    println!("{}", style("Compaction Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Rewritten:").bold(),
        format_number(stats.rewritten)
    );
    println!(
        "  {} {}",
        style("Unchanged:").bold(),
        format_number(stats.unchanged)
    );
    if stats.failed > 0 {
        println!(
            "  {} {}",
            style("Failed:").yellow().bold(),
            format_number(stats.failed)
        );
    }
    println!(
        "  {} {:.1}s",
        style("Duration:").bold(),
        duration.as_secs_f64()
    );
    println!();
}
