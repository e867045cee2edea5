//! Report command - per-year tax summary across both regimes

use crate::cmd::{as_of_or_today, format_eur, load_report, MarginRateArg};
use crate::engine::{TaxReport, YearAssessment};
use crate::tax::ie::{CGT_RATE, EXIT_TAX_RATE};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReportCommand {
    /// Brokerage CSV export files, merged before calculation
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Instrument cache JSON file
    #[arg(long, default_value = "data/instruments.json")]
    cache: PathBuf,

    /// Marginal income tax rate for dividend income
    #[arg(short, long, value_enum, default_value_t = MarginRateArg::Higher)]
    margin_rate: MarginRateArg,

    /// Evaluation date for deemed disposals (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let as_of = as_of_or_today(self.as_of);
        let (report, _) = load_report(&self.files, &self.cache, as_of, self.margin_rate.into())?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, as_of);
        }
        Ok(())
    }
}

fn print_report(report: &TaxReport, as_of: NaiveDate) {
    println!();
    println!("IRISH TAX REPORT (evaluated {as_of})");

    for year in &report.years {
        println!();
        println!("=== {} ===", year.year);
        print_year(year);
    }

    if !report.deemed_disposals.is_empty() {
        println!();
        println!("DEEMED DISPOSALS (8-year rule, as of {as_of})");
        for dd in &report.deemed_disposals {
            println!(
                "  {}: acquired {} ({} years), cost {}, value {}, gain {} -> {}",
                dd.ticker,
                dd.acquired,
                dd.years_held,
                format_eur(dd.cost_eur),
                format_eur(dd.value_eur),
                format_eur(dd.gain_eur),
                format_eur(dd.liability())
            );
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("WARNINGS ({})", report.warnings.len());
        for warning in &report.warnings {
            println!("  {}", warning.message());
        }
    }
    println!();
}

fn print_year(year: &YearAssessment) {
    let cgt = &year.cgt;
    println!("STOCKS (CGT @ {:.0}%)", CGT_RATE * dec!(100));
    println!(
        "  Net gains: {} | Exemption: {} | Loss relief: {}",
        format_eur(cgt.gross_gains),
        format_eur(cgt.exemption_applied),
        format_eur(cgt.loss_relief_used)
    );
    println!(
        "  Taxable: {} | CGT due: {} | Losses carried forward: {}",
        format_eur(cgt.taxable),
        format_eur(cgt.liability),
        format_eur(cgt.losses_carried_forward)
    );

    let exit = &year.exit_tax;
    if exit.taxable > Decimal::ZERO || year.funds.realized_gains != Decimal::ZERO {
        println!(
            "FUNDS (exit tax @ {:.0}%, no exemption, no loss carry-forward)",
            EXIT_TAX_RATE * dec!(100)
        );
        println!(
            "  Gains: {} | Distributions: {} | Deemed gains: {}",
            format_eur(exit.realized_gains),
            format_eur(exit.distributions),
            format_eur(exit.deemed_gains)
        );
        println!("  Exit tax due: {}", format_eur(exit.liability));
    }

    if let Some(div) = &year.dividends {
        println!("DIVIDEND INCOME (marginal rate {:.0}%)", div.marginal_rate.percent());
        println!(
            "  Gross: {} (domestic {}, foreign {})",
            format_eur(div.gross),
            format_eur(div.domestic),
            format_eur(div.foreign)
        );
        println!(
            "  Income tax: {} | Credits: {} (DWT {}, foreign {})",
            format_eur(div.income_tax),
            format_eur(div.total_credits),
            format_eur(div.dwt_credit),
            format_eur(div.foreign_credit)
        );
        if div.refund_due > Decimal::ZERO {
            println!("  Refund due: {}", format_eur(div.refund_due));
        } else {
            println!("  Net due: {}", format_eur(div.net_due));
        }
    }

    println!("TOTAL TAX DUE: {}", format_eur(year.total_due()));
    if year.refund_due() > Decimal::ZERO {
        println!("REFUND DUE: {}", format_eur(year.refund_due()));
    }
}
