//! Instrument command - transaction-level view of a single holding

use crate::cmd::{as_of_or_today, format_eur, format_quantity, load_report};
use crate::engine::InstrumentDetail;
use crate::transaction::NormalizedTransaction;
use anyhow::bail;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct InstrumentCommand {
    /// Ticker to inspect (pre- or post-merger symbol)
    ticker: String,

    /// Brokerage CSV export files, merged before calculation
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Instrument cache JSON file
    #[arg(long, default_value = "data/instruments.json")]
    cache: PathBuf,

    /// Evaluation date for deemed disposals (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Tabled)]
struct TransactionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Price EUR")]
    price: String,
    #[tabled(rename = "Fees EUR")]
    fees: String,
    #[tabled(rename = "Total EUR")]
    total: String,
}

impl InstrumentCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let as_of = as_of_or_today(self.as_of);
        let (report, transactions) =
            load_report(&self.files, &self.cache, as_of, Default::default())?;

        let ticker = self.ticker.trim().to_uppercase();
        // Accept a pre-merger symbol too; the detail lives under the target.
        let detail = report.instruments.get(&ticker).or_else(|| {
            transactions
                .iter()
                .find(|tx| tx.ticker == ticker)
                .and_then(|tx| report.instruments.get(&tx.resolved))
        });
        let Some(detail) = detail else {
            bail!("no transactions found for ticker '{ticker}'");
        };

        print_detail(detail);

        let rows: Vec<TransactionRow> = transactions
            .iter()
            .filter(|tx| tx.resolved == detail.ticker)
            .map(transaction_row)
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
        println!();
        Ok(())
    }
}

fn transaction_row(tx: &NormalizedTransaction) -> TransactionRow {
    let ticker = if tx.ticker == tx.resolved {
        tx.ticker.clone()
    } else {
        format!("{} -> {}", tx.ticker, tx.resolved)
    };
    TransactionRow {
        date: tx.date.to_string(),
        ticker,
        kind: tx.kind.display(),
        quantity: format_quantity(tx.quantity),
        price: format!("{:.2}", tx.price_eur),
        fees: format!("{:.2}", tx.fees_eur),
        total: format!("{:.2}", tx.total_eur),
    }
}

fn print_detail(detail: &InstrumentDetail) {
    println!();
    println!("{} ({})", detail.ticker, detail.asset_class);
    println!(
        "  Holdings: {} | Avg cost: {}",
        format_quantity(detail.holdings),
        match detail.average_cost {
            Some(cost) => format!("{:.2} {}", cost, detail.cost_currency),
            None => "-".to_string(),
        }
    );
    if detail.withholding_deducted {
        println!("  Withholding tax deducted at source");
    }
    if detail.deemed_disposal_liability > Decimal::ZERO {
        println!(
            "  Deemed disposal liability: {}",
            format_eur(detail.deemed_disposal_liability)
        );
    }
    for (year, gain) in &detail.realized_gains {
        println!("  {year} realized: {}", format_eur(*gain));
    }
    for (year, dividends) in &detail.dividends {
        println!("  {year} dividends: {}", format_eur(*dividends));
    }
    println!();
}
