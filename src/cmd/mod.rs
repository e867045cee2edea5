pub mod cache;
pub mod export;
pub mod instrument;
pub mod report;
pub mod validate;

use crate::engine::{self, EngineOptions, TaxReport};
use crate::instruments::InstrumentCache;
use crate::ledger::AssumedGrowth;
use crate::tax::MarginalRate;
use crate::transaction::{normalize, NormalizedTransaction, RawTransaction};
use anyhow::Context;
use chrono::NaiveDate;
use clap::ValueEnum;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

/// Columns every input CSV must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "Date",
    "Ticker",
    "Type",
    "Quantity",
    "Price per share",
    "Total Amount",
    "Currency",
    "FX Rate",
];

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum MarginRateArg {
    /// 20% band
    Standard,
    /// 40% band
    #[default]
    Higher,
    /// 45% band
    Top,
}

impl From<MarginRateArg> for MarginalRate {
    fn from(arg: MarginRateArg) -> Self {
        match arg {
            MarginRateArg::Standard => MarginalRate::Standard,
            MarginRateArg::Higher => MarginalRate::Higher,
            MarginRateArg::Top => MarginalRate::Top,
        }
    }
}

/// Read and merge brokerage CSV exports, validating headers up front so a
/// malformed file fails before any calculation starts.
pub fn read_raw_transactions(paths: &[PathBuf]) -> anyhow::Result<Vec<RawTransaction>> {
    let mut records = Vec::new();
    for path in paths {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let headers = reader.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "{}: missing required columns: {}",
                path.display(),
                missing.join(", ")
            );
        }
        let before = records.len();
        for result in reader.deserialize() {
            let record: RawTransaction =
                result.with_context(|| format!("failed to parse record in {}", path.display()))?;
            records.push(record);
        }
        log::debug!("read {} records from {}", records.len() - before, path.display());
    }
    Ok(records)
}

/// Shared pipeline: read the input files, normalize against the instrument
/// cache and run the calculation. Returns the transaction stream too for
/// commands that show per-record detail.
pub fn load_report(
    files: &[PathBuf],
    cache_path: &Path,
    as_of: NaiveDate,
    marginal_rate: MarginalRate,
) -> anyhow::Result<(TaxReport, Vec<NormalizedTransaction>)> {
    let cache = InstrumentCache::load(cache_path)
        .with_context(|| format!("failed to load instrument cache {}", cache_path.display()))?;
    let records = read_raw_transactions(files)?;
    let transactions = normalize(&records, &cache)?;
    log::debug!(
        "normalized {} of {} records",
        transactions.len(),
        records.len()
    );
    let options = EngineOptions {
        as_of,
        marginal_rate,
    };
    let report = engine::calculate(&transactions, &cache, &AssumedGrowth::default(), &options)?;
    Ok((report, transactions))
}

pub fn as_of_or_today(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| chrono::Local::now().date_naive())
}

pub fn format_eur(value: Decimal) -> String {
    if value < Decimal::ZERO {
        format!("-€{:.2}", -value)
    } else {
        format!("€{:.2}", value)
    }
}

pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}
