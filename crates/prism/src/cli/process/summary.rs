//! Progress display and the end-of-run summary.

use prism_core::{BatchReport, RecordReport};

/// Create a progress bar for batch processing.
pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => tracing::debug!("Using default progress style: {e}"),
    }
    pb.set_message("starting...");
    pb
}

/// Records with a rejected operation or an effect that did not apply.
fn records_with_issues(records: &[RecordReport]) -> usize {
    records.iter().filter(|r| !r.is_clean()).count()
}

/// Print a formatted summary table to stderr.
pub fn print_summary(report: &BatchReport, backend: &str, dry_run: bool) {
    let stats = &report.stats;
    let with_issues = records_with_issues(&report.records);
    eprintln!();
    eprintln!("  ====================================");
    if dry_run {
        eprintln!("           Summary (dry run)");
    } else {
        eprintln!("               Summary");
    }
    eprintln!("  ====================================");
    eprintln!("    Records:      {:>8}", stats.records);
    if with_issues > 0 {
        eprintln!("    With issues:  {:>8}", with_issues);
    }
    if stats.rejected_entries > 0 {
        eprintln!("    Rejected:     {:>8}", stats.rejected_entries);
    }
    if stats.rejected_operations > 0 {
        eprintln!("    Bad ops:      {:>8}", stats.rejected_operations);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Applied:      {:>8}", stats.effects_applied);
    if stats.effects_failed > 0 {
        eprintln!("    Not applied:  {:>8}", stats.effects_failed);
    }
    eprintln!("    Backend:      {:>8}", backend);
    eprintln!("    Duration:     {:>7.1}s", stats.total_seconds);
    eprintln!("  ====================================");
}
