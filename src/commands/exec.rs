use anyhow::Result;

use crate::config::Config;
use crate::fs::FileSystem;
use crate::logging;
use crate::pipeline::{self, ExecOptions, FileOutcome, RunReport};

pub fn run(fs: &dyn FileSystem, config: &Config, options: &ExecOptions) -> Result<RunReport> {
    logging::info("=== i18n-autokey exec ===\n");

    logging::info("Configuration:");
    logging::info(&format!("  Resource document: {}", options.resource.display()));
    logging::info(&format!("  Target: {}", options.target.display()));
    logging::info(&format!(
        "  Functions: markup {}, program {}",
        config.markup_function, config.program_function
    ));
    if !options.only.is_empty() {
        logging::info(&format!("  Only: {:?}", options.only));
    }
    if options.dry_run {
        logging::info("  Mode: Dry run (no files will be modified)");
    }
    logging::info("");

    let report = pipeline::run(fs, config, options)?;
    print_summary(config, &report);
    Ok(report)
}

fn print_summary(config: &Config, report: &RunReport) {
    let skipped: Vec<_> = report
        .files
        .iter()
        .filter_map(|file| match &file.outcome {
            FileOutcome::Skipped { reason } => Some(reason),
            _ => None,
        })
        .collect();
    if !skipped.is_empty() {
        logging::warn("Skipped files:");
        for reason in skipped {
            logging::warn(&format!("  {}", reason));
        }
    }

    logging::info(&format!("\n{}", "-".repeat(60)));
    logging::info("Summary:");
    logging::info(&format!("  Files scanned: {}", report.scanned()));
    logging::info(&format!("  Files transformed: {}", report.transformed()));
    logging::info(&format!("  Files unchanged: {}", report.unchanged()));
    logging::info(&format!("  Files skipped: {}", report.skipped()));

    if report.keys_by_namespace.is_empty() && report.common_added == 0 {
        logging::info("  No new keys added.");
    } else {
        for (namespace, count) in &report.keys_by_namespace {
            logging::info(&format!("  {} - added {} new key(s)", namespace, count));
        }
        if report.common_added > 0 {
            logging::info(&format!(
                "  {} - added {} new key(s)",
                config.common_namespace, report.common_added
            ));
        }
    }

    if report.dry_run {
        logging::info("\nDry run complete, nothing written.");
    } else {
        logging::info("\nDone!");
    }
}
