//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status
//! messages, the progress bar shown while classifying files, and the
//! per-sample summary table printed at the end of a run.

use crate::sample_group::SampleGroups;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for classification
/// - Summary tables of sample groups
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use multisheet::output::OutputFormatter;
    /// OutputFormatter::success("Program completed successfully");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use multisheet::output::OutputFormatter;
    /// OutputFormatter::warning("Library type not detected for sample: pbmc_HTO");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar over `total` discovered files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints one row per sample: file count, table rows after lane collapse,
    /// and detected library types.
    pub fn summary_table(groups: &SampleGroups) {
        Self::header("SUMMARY");

        let name_width = groups
            .iter()
            .map(|group| group.name.len())
            .max()
            .unwrap_or(0)
            .max(6); // At least "Sample" width

        println!(
            "{:<width$} | {:>5} | {:>4} | {}",
            "Sample".bold(),
            "Files".bold(),
            "Rows".bold(),
            "Libraries".bold(),
            width = name_width
        );
        println!("{}", "-".repeat(name_width + 40));

        for group in groups {
            let libraries: Vec<String> = group
                .library_types
                .iter()
                .map(|library| library.to_string())
                .collect();
            println!(
                "{:<width$} | {:>5} | {:>4} | {}",
                group.name,
                group.files.len().to_string().green(),
                group.unique_files().len(),
                libraries.join(", "),
                width = name_width
            );
        }

        let total_files: usize = groups.iter().map(|group| group.files.len()).sum();
        println!("{}", "-".repeat(name_width + 40));
        println!(
            "{:<width$} | {:>5} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            groups.len(),
            if groups.len() == 1 { "sample" } else { "samples" },
            width = name_width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
