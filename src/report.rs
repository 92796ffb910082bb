//! Output formatting for batch results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full batch report for programmatic consumption

use colored::*;

use crate::batch::{BatchReport, FileOutcome, FileStatus, SkipReason};
use crate::error::Severity;
use crate::resilience::HealthStatus;

/// Write the batch report as JSON.
pub fn write_json(report: &BatchReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

/// Write the batch report in pretty (human-readable) format.
pub fn write_pretty(scanned: &str, report: &BatchReport) {
    // Header
    println!();
    print!("  ");
    print!("{}", "docscan".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", scanned);
    println!();

    write_files(&report.outcomes);
    write_summary(report);
    println!();
    write_health(report);
    println!();
}

fn write_files(outcomes: &[FileOutcome]) {
    println!("  {} ({}):", "Files".bold(), outcomes.len());
    println!();

    for file in outcomes {
        write_status_tag(file.status);
        print!("  {}", file.path.display().to_string().blue());

        if let Some(outcome) = &file.outcome {
            let result = &outcome.result;
            let declarations = result.functions.len()
                + result.classes.len()
                + result.interfaces.len();
            print!(
                "  {}",
                format!(
                    "{} · {} declarations · {} routes · {:.0}%",
                    result.language,
                    declarations,
                    result.api_endpoints.len(),
                    outcome.completeness * 100.0
                )
                .dimmed()
            );
            if !outcome.fallbacks_used.is_empty() {
                print!(
                    "  {}",
                    format!("via {}", outcome.fallbacks_used.join(" → ")).yellow()
                );
            }
            println!();

            for error in &outcome.errors {
                print!("            ");
                write_severity(error.severity);
                println!(" {}", error.message);
            }
        } else {
            println!();
        }
    }
    println!();
}

fn write_status_tag(status: FileStatus) {
    match status {
        FileStatus::Successful => print!("    {}", "OK     ".green()),
        FileStatus::Partial => print!("    {}", "PARTIAL".yellow()),
        FileStatus::Failed => print!("    {}", "FAILED ".red()),
        FileStatus::Skipped(reason) => {
            let tag = match reason {
                SkipReason::Excluded => "EXCLUDE",
                SkipReason::Binary => "BINARY ",
                SkipReason::Oversized => "TOO BIG",
                SkipReason::Cancelled => "CANCEL ",
            };
            print!("    {}", tag.dimmed())
        }
    }
}

fn write_severity(severity: Severity) {
    match severity {
        Severity::Critical => print!("{}", "critical".red().bold()),
        Severity::High => print!("{}", "high".red()),
        Severity::Medium => print!("{}", "medium".yellow()),
        Severity::Low => print!("{}", "low".dimmed()),
    }
}

fn write_summary(report: &BatchReport) {
    let summary = &report.summary;
    println!("  {}", "Summary:".bold());
    println!("    {:<12} {:>5}", "total", summary.total);
    println!("    {:<12} {:>5}", "successful", summary.successful.to_string().green());
    println!("    {:<12} {:>5}", "partial", summary.partial.to_string().yellow());
    println!("    {:<12} {:>5}", "failed", summary.failed.to_string().red());
    println!("    {:<12} {:>5}", "skipped", summary.skipped.to_string().dimmed());
}

fn write_health(report: &BatchReport) {
    let health = &report.health;
    print!("  {} ", "Health:".bold());
    match health.status {
        HealthStatus::Healthy => println!("{}", "healthy".green()),
        HealthStatus::Degraded => println!("{}", "degraded".yellow()),
        HealthStatus::Critical => println!("{}", "critical".red().bold()),
    }
    for recommendation in &health.recommendations {
        println!("    {}", recommendation.dimmed());
    }
}
