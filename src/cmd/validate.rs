//! Validate command - surface data quality issues without a full report

use crate::cmd::{as_of_or_today, load_report};
use crate::warnings::Warning;
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Brokerage CSV export files, merged before calculation
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Instrument cache JSON file
    #[arg(long, default_value = "data/instruments.json")]
    cache: PathBuf,

    /// Evaluation date for deemed disposals (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ValidationOutput<'a> {
    issue_count: usize,
    issues: &'a [Warning],
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let as_of = as_of_or_today(self.as_of);
        let (report, _) = load_report(&self.files, &self.cache, as_of, Default::default())?;

        if self.json {
            let output = ValidationOutput {
                issue_count: report.warnings.len(),
                issues: &report.warnings,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&report.warnings);
        }

        // Exit code 1 signals issues to scripts
        if !report.warnings.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(warnings: &[Warning]) {
    println!();
    println!("VALIDATION RESULTS");
    println!();
    if warnings.is_empty() {
        println!("No issues found.");
    } else {
        for warning in warnings {
            println!("  {}", warning.message());
        }
        println!();
        println!("{} issue(s) found", warnings.len());
    }
    println!();
}
