//! Export command - CSV files suitable for a tax return working paper

use crate::cmd::{as_of_or_today, load_report, MarginRateArg};
use crate::engine::TaxReport;
use crate::tax::ie::{CGT_RATE, EXIT_TAX_RATE};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportCommand {
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

    /// Output file name prefix
    #[arg(long, default_value = "irish_tax_report")]
    prefix: String,
}

#[derive(Debug, Serialize)]
struct TaxSummaryRecord {
    year: i32,
    category: &'static str,
    gross: String,
    exemption: String,
    loss_relief: String,
    credits: String,
    taxable: String,
    rate_percent: String,
    liability: String,
    carried_forward: String,
}

#[derive(Debug, Serialize)]
struct ByTickerRecord {
    ticker: String,
    asset_class: String,
    year: i32,
    realized_gains_eur: String,
    dividends_eur: String,
    holdings: String,
    average_cost: String,
    cost_currency: String,
}

#[derive(Debug, Serialize)]
struct DeemedDisposalRecord {
    ticker: String,
    acquired: String,
    years_held: String,
    cost_eur: String,
    value_eur: String,
    gain_eur: String,
    liability_eur: String,
}

impl ExportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let as_of = as_of_or_today(self.as_of);
        let (report, _) = load_report(&self.files, &self.cache, as_of, self.margin_rate.into())?;

        let summary_path = format!("{}_tax_summary.csv", self.prefix);
        write_csv(&summary_path, summary_records(&report))?;
        println!("wrote {summary_path}");

        let by_ticker_path = format!("{}_by_ticker.csv", self.prefix);
        write_csv(&by_ticker_path, by_ticker_records(&report))?;
        println!("wrote {by_ticker_path}");

        if !report.deemed_disposals.is_empty() {
            let deemed_path = format!("{}_deemed_disposal.csv", self.prefix);
            write_csv(&deemed_path, deemed_records(&report))?;
            println!("wrote {deemed_path}");
        }
        Ok(())
    }
}

fn write_csv<R: Serialize>(path: &str, records: Vec<R>) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("failed to create {path}"))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn eur(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn summary_records(report: &TaxReport) -> Vec<TaxSummaryRecord> {
    let mut records = Vec::new();
    for year in &report.years {
        records.push(TaxSummaryRecord {
            year: year.year,
            category: "stocks_cgt",
            gross: eur(year.cgt.gross_gains),
            exemption: eur(year.cgt.exemption_applied),
            loss_relief: eur(year.cgt.loss_relief_used),
            credits: String::new(),
            taxable: eur(year.cgt.taxable),
            rate_percent: format!("{:.0}", CGT_RATE * dec!(100)),
            liability: eur(year.cgt.liability),
            carried_forward: eur(year.cgt.losses_carried_forward),
        });
        records.push(TaxSummaryRecord {
            year: year.year,
            category: "funds_exit_tax",
            gross: eur(year.exit_tax.realized_gains
                + year.exit_tax.distributions
                + year.exit_tax.deemed_gains),
            exemption: eur(Decimal::ZERO),
            loss_relief: eur(Decimal::ZERO),
            credits: String::new(),
            taxable: eur(year.exit_tax.taxable),
            rate_percent: format!("{:.0}", EXIT_TAX_RATE * dec!(100)),
            liability: eur(year.exit_tax.liability),
            carried_forward: String::new(),
        });
        if let Some(div) = &year.dividends {
            records.push(TaxSummaryRecord {
                year: year.year,
                category: "dividend_income",
                gross: eur(div.gross),
                exemption: String::new(),
                loss_relief: String::new(),
                credits: eur(div.total_credits),
                taxable: eur(div.gross),
                rate_percent: format!("{:.0}", div.marginal_rate.percent()),
                liability: eur(div.net_due),
                carried_forward: String::new(),
            });
        }
    }
    records
}

fn by_ticker_records(report: &TaxReport) -> Vec<ByTickerRecord> {
    let mut records = Vec::new();
    for detail in report.instruments.values() {
        let years: BTreeSet<i32> = detail
            .realized_gains
            .keys()
            .chain(detail.dividends.keys())
            .copied()
            .collect();
        for year in years {
            records.push(ByTickerRecord {
                ticker: detail.ticker.clone(),
                asset_class: detail.asset_class.to_string(),
                year,
                realized_gains_eur: eur(detail
                    .realized_gains
                    .get(&year)
                    .copied()
                    .unwrap_or_default()),
                dividends_eur: eur(detail.dividends.get(&year).copied().unwrap_or_default()),
                holdings: detail.holdings.normalize().to_string(),
                average_cost: detail
                    .average_cost
                    .map(|c| format!("{:.2}", c.round_dp(2)))
                    .unwrap_or_default(),
                cost_currency: detail.cost_currency.clone(),
            });
        }
    }
    records
}

fn deemed_records(report: &TaxReport) -> Vec<DeemedDisposalRecord> {
    report
        .deemed_disposals
        .iter()
        .map(|dd| DeemedDisposalRecord {
            ticker: dd.ticker.clone(),
            acquired: dd.acquired.to_string(),
            years_held: dd.years_held.to_string(),
            cost_eur: eur(dd.cost_eur),
            value_eur: eur(dd.value_eur),
            gain_eur: eur(dd.gain_eur),
            liability_eur: eur(dd.liability()),
        })
        .collect()
}
