use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("ticker '{0}' not found in instrument cache")]
    TickerNotFound(String),
}

/// Asset class driving the tax treatment: stocks fall under CGT,
/// funds (ETFs and similar) under the flat exit-tax regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Fund,
}

impl AssetClass {
    pub fn display(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Fund => "fund",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Instrument metadata needed for tax classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentInfo {
    #[serde(rename = "type")]
    pub asset_class: AssetClass,
    pub currency: String,
    pub domicile: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub merged_into: Option<String>,
    #[serde(default = "default_conversion_ratio")]
    pub conversion_ratio: Decimal,
    #[serde(default)]
    pub withholding_deducted: bool,
}

fn default_active() -> bool {
    true
}

fn default_conversion_ratio() -> Decimal {
    dec!(1)
}

/// Lookup service for instrument metadata. Implementations must be
/// idempotent: repeated lookups for the same ticker return the same info.
pub trait InstrumentResolver {
    fn resolve(&self, ticker: &str) -> Result<&InstrumentInfo, ResolveError>;

    /// The ledger key for a ticker: the merger target if the instrument
    /// was merged into another, otherwise the ticker itself.
    fn resolved_ticker(&self, ticker: &str) -> Result<String, ResolveError> {
        let info = self.resolve(ticker)?;
        Ok(info
            .merged_into
            .clone()
            .unwrap_or_else(|| ticker.to_uppercase()))
    }
}

/// JSON-file-backed instrument cache. Loaded once per run, mutated only via
/// `put`, persisted explicitly with `persist` - the core never touches the
/// file directly.
#[derive(Debug)]
pub struct InstrumentCache {
    path: PathBuf,
    entries: BTreeMap<String, InstrumentInfo>,
}

impl InstrumentCache {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let entries = if path.exists() {
            let file = File::open(path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            BTreeMap::new()
        };
        Ok(InstrumentCache {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, ticker: &str) -> Option<&InstrumentInfo> {
        self.entries.get(&ticker.to_uppercase())
    }

    pub fn put(&mut self, ticker: &str, info: InstrumentInfo) {
        self.entries.insert(ticker.to_uppercase(), info);
    }

    pub fn persist(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        log::debug!(
            "persisted {} instruments to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl InstrumentResolver for InstrumentCache {
    fn resolve(&self, ticker: &str) -> Result<&InstrumentInfo, ResolveError> {
        self.get(ticker)
            .ok_or_else(|| ResolveError::TickerNotFound(ticker.to_uppercase()))
    }
}

/// Blank tickers and spreadsheet sentinels carry no instrument at all and
/// are dropped by the normalizer rather than treated as lookup failures.
pub fn is_sentinel(ticker: &str) -> bool {
    let t = ticker.trim().to_uppercase();
    t.is_empty() || t == "NONE" || t == "NAN"
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory resolver for unit tests.
    pub struct MapResolver(pub BTreeMap<String, InstrumentInfo>);

    impl MapResolver {
        pub fn new(entries: Vec<(&str, InstrumentInfo)>) -> Self {
            MapResolver(
                entries
                    .into_iter()
                    .map(|(t, i)| (t.to_string(), i))
                    .collect(),
            )
        }
    }

    impl InstrumentResolver for MapResolver {
        fn resolve(&self, ticker: &str) -> Result<&InstrumentInfo, ResolveError> {
            self.0
                .get(&ticker.to_uppercase())
                .ok_or_else(|| ResolveError::TickerNotFound(ticker.to_uppercase()))
        }
    }

    pub fn stock(currency: &str, domicile: &str) -> InstrumentInfo {
        InstrumentInfo {
            asset_class: AssetClass::Stock,
            currency: currency.to_string(),
            domicile: domicile.to_string(),
            active: true,
            merged_into: None,
            conversion_ratio: dec!(1),
            withholding_deducted: false,
        }
    }

    pub fn fund(currency: &str, domicile: &str) -> InstrumentInfo {
        InstrumentInfo {
            asset_class: AssetClass::Fund,
            ..stock(currency, domicile)
        }
    }
}
