//! Cache command - maintain the instrument metadata cache

use crate::instruments::{AssetClass, InstrumentCache, InstrumentInfo};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CacheCommand {
    /// Ticker to add or update
    ticker: String,

    /// Instrument cache JSON file
    #[arg(long, default_value = "data/instruments.json")]
    cache: PathBuf,

    /// Asset class
    #[arg(long, value_enum)]
    class: AssetClassArg,

    /// Trading currency
    #[arg(long, default_value = "EUR")]
    currency: String,

    /// Domicile country code (IE for domestic dividend treatment)
    #[arg(long, default_value = "IE")]
    domicile: String,

    /// Mark the instrument delisted; residual holdings get written off
    #[arg(long)]
    inactive: bool,

    /// Ticker this instrument was merged into
    #[arg(long)]
    merged_into: Option<String>,

    /// Share conversion ratio for the merger
    #[arg(long, default_value = "1")]
    ratio: Decimal,

    /// Dividend withholding tax is deducted at source
    #[arg(long)]
    withholding_deducted: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AssetClassArg {
    Stock,
    Fund,
}

impl From<AssetClassArg> for AssetClass {
    fn from(arg: AssetClassArg) -> Self {
        match arg {
            AssetClassArg::Stock => AssetClass::Stock,
            AssetClassArg::Fund => AssetClass::Fund,
        }
    }
}

impl CacheCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut cache = InstrumentCache::load(&self.cache)?;
        let ratio = if self.ratio > Decimal::ZERO {
            self.ratio
        } else {
            dec!(1)
        };
        let info = InstrumentInfo {
            asset_class: self.class.into(),
            currency: self.currency.trim().to_uppercase(),
            domicile: self.domicile.trim().to_uppercase(),
            active: !self.inactive,
            merged_into: self
                .merged_into
                .as_ref()
                .map(|t| t.trim().to_uppercase()),
            conversion_ratio: ratio,
            withholding_deducted: self.withholding_deducted,
        };
        cache.put(&self.ticker, info);
        cache.persist()?;
        println!(
            "cached {} ({} instruments in {})",
            self.ticker.trim().to_uppercase(),
            cache.len(),
            self.cache.display()
        );
        Ok(())
    }
}
