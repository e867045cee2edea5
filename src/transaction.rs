use crate::instruments::{is_sentinel, AssetClass, InstrumentResolver, ResolveError};
use crate::tax::ie::SETTLEMENT_CURRENCY;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("missing or invalid FX rate for {ticker} amount in {currency}")]
    MissingFxRate { ticker: String, currency: String },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// One row of a brokerage export, as found in the wild. Amount columns are
/// free text because exports carry currency symbols and encoding noise.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Ticker", default)]
    pub ticker: String,
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Quantity", default)]
    pub quantity: Option<Decimal>,
    #[serde(rename = "Price per share", default)]
    pub price_per_share: String,
    #[serde(rename = "Total Amount", default)]
    pub total_amount: String,
    #[serde(rename = "Currency", default)]
    pub currency: String,
    #[serde(rename = "FX Rate", default)]
    pub fx_rate: Option<Decimal>,
}

/// Tax-relevant transaction kinds. Anything else in an export (cash
/// movements, custody fees, plain transfers) is dropped during
/// normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    Buy,
    Sell,
    Dividend,
    MergerStock,
    MergerCash,
    MergerGeneric,
    TransferFromMerger,
}

impl TransactionKind {
    pub fn display(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Dividend => "DIVIDEND",
            TransactionKind::MergerStock
            | TransactionKind::MergerCash
            | TransactionKind::MergerGeneric => "MERGER",
            TransactionKind::TransferFromMerger => "TRANSFER",
        }
    }
}

/// First-pass keyword classification, before broker transfers are resolved
/// against the merger-ticker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Buy,
    Sell,
    Dividend,
    MergerStock,
    MergerCash,
    MergerGeneric,
    BrokerTransfer,
    Ignored,
}

impl RawKind {
    fn is_merger(&self) -> bool {
        matches!(
            self,
            RawKind::MergerStock | RawKind::MergerCash | RawKind::MergerGeneric
        )
    }
}

/// The inter-broker migration phrase. Transfers carrying it are share
/// deliveries from a corporate action, not ordinary cash movements.
const BROKER_TRANSFER_PHRASE: &str = "REVOLUT TRADING LTD TO REVOLUT SECURITIES EUROPE UAB";

struct ClassificationRule {
    applies: fn(&str) -> bool,
    kind: RawKind,
}

/// Ordered classification rules over the upper-cased type string. Evaluated
/// top to bottom; the first match wins.
const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        applies: |s| s.contains("BUY"),
        kind: RawKind::Buy,
    },
    ClassificationRule {
        applies: |s| s.contains("SELL"),
        kind: RawKind::Sell,
    },
    ClassificationRule {
        applies: |s| s.contains("DIVIDEND"),
        kind: RawKind::Dividend,
    },
    ClassificationRule {
        applies: |s| s.contains("MERGER") && s.contains("STOCK"),
        kind: RawKind::MergerStock,
    },
    ClassificationRule {
        applies: |s| s.contains("MERGER") && s.contains("CASH"),
        kind: RawKind::MergerCash,
    },
    ClassificationRule {
        applies: |s| s.contains("MERGER"),
        kind: RawKind::MergerGeneric,
    },
    ClassificationRule {
        applies: |s| s.contains("TRANSFER") && s.contains(BROKER_TRANSFER_PHRASE),
        kind: RawKind::BrokerTransfer,
    },
    ClassificationRule {
        applies: |s| {
            ["TRANSFER", "CASH TOP-UP", "CASH WITHDRAWAL", "CUSTODY FEE"]
                .iter()
                .any(|kw| s.contains(kw))
        },
        kind: RawKind::Ignored,
    },
];

fn classify_type(type_str: &str) -> RawKind {
    let upper = type_str.to_uppercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.applies)(&upper))
        .map(|rule| rule.kind)
        .unwrap_or(RawKind::Ignored)
}

/// A raw record after classification, merger redirection and conversion to
/// the settlement currency. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub year: i32,
    /// Original ticker symbol, retained for display.
    pub ticker: String,
    /// Post-merger ledger key.
    pub resolved: String,
    pub kind: TransactionKind,
    pub quantity: Decimal,
    pub price_eur: Decimal,
    pub total_eur: Decimal,
    pub fees_eur: Decimal,
    /// Settlement currency of the raw record, kept for FX-rate weighting.
    pub currency: String,
    pub fx_rate: Option<Decimal>,
    pub asset_class: AssetClass,
}

fn noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Currency symbols, mangled Euro-sign encodings, and spreadsheet hex
    // escapes like _x20AC_.
    RE.get_or_init(|| Regex::new(r"[€$£¥₹]|â[^\d]*¬|_x[0-9A-Fa-f]+_").unwrap())
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap())
}

/// Lenient amount parsing for noisy spreadsheet exports: strip currency
/// noise, take the first signed decimal number, degrade to zero on garbage.
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned = noise_regex().replace_all(raw, "");
    number_regex()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(Decimal::ZERO)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

pub fn parse_date(s: &str) -> Result<NaiveDate, NormalizeError> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(NormalizeError::InvalidDate(s.to_string()))
}

/// Convert an amount in the record's currency to EUR via the record's FX
/// rate (units of `currency` per EUR). No implicit 1:1 fallback: a non-EUR
/// amount without a valid rate is a hard error.
fn convert_to_eur(
    amount: Decimal,
    currency: &str,
    fx_rate: Option<Decimal>,
    ticker: &str,
) -> Result<Decimal, NormalizeError> {
    if currency == SETTLEMENT_CURRENCY || currency.is_empty() {
        return Ok(amount);
    }
    match fx_rate {
        Some(rate) if rate > Decimal::ZERO => Ok(amount / rate),
        _ => Err(NormalizeError::MissingFxRate {
            ticker: ticker.to_string(),
            currency: currency.to_string(),
        }),
    }
}

/// Sentinel tickers resolve to nothing; real tickers go through the
/// resolver and follow merger redirection.
fn resolve_ticker(
    resolver: &dyn InstrumentResolver,
    raw: &str,
) -> Result<Option<String>, ResolveError> {
    if is_sentinel(raw) {
        return Ok(None);
    }
    let ticker = raw.trim().to_uppercase();
    resolver.resolved_ticker(&ticker).map(Some)
}

/// Normalize raw records into the tax-relevant transaction stream.
///
/// Two explicit passes over the same immutable input: the first discovers
/// which resolved tickers had at least one merger event, the second
/// classifies every record (reclassifying broker transfers against the
/// merger set), redirects merged tickers, converts amounts to EUR and
/// derives fees. The output is filtered to tax-relevant kinds and sorted by
/// date; same-date records keep their input order.
pub fn normalize(
    records: &[RawTransaction],
    resolver: &dyn InstrumentResolver,
) -> Result<Vec<NormalizedTransaction>, NormalizeError> {
    let mut merger_tickers: HashSet<String> = HashSet::new();
    for record in records {
        if classify_type(&record.kind).is_merger() {
            if let Some(resolved) = resolve_ticker(resolver, &record.ticker)? {
                merger_tickers.insert(resolved);
            }
        }
    }

    let mut out = Vec::new();
    for record in records {
        let raw_kind = classify_type(&record.kind);
        if raw_kind == RawKind::Ignored {
            continue;
        }
        let Some(resolved) = resolve_ticker(resolver, &record.ticker)? else {
            log::debug!(
                "dropping '{}' record with unusable ticker '{}'",
                record.kind,
                record.ticker
            );
            continue;
        };
        let kind = match raw_kind {
            RawKind::Buy => TransactionKind::Buy,
            RawKind::Sell => TransactionKind::Sell,
            RawKind::Dividend => TransactionKind::Dividend,
            RawKind::MergerStock => TransactionKind::MergerStock,
            RawKind::MergerCash => TransactionKind::MergerCash,
            RawKind::MergerGeneric => TransactionKind::MergerGeneric,
            RawKind::BrokerTransfer => {
                if merger_tickers.contains(&resolved) {
                    TransactionKind::TransferFromMerger
                } else {
                    continue;
                }
            }
            RawKind::Ignored => continue,
        };

        let ticker = record.ticker.trim().to_uppercase();
        let asset_class = resolver.resolve(&resolved)?.asset_class;
        let date = parse_date(&record.date)?;
        let currency = record.currency.trim().to_uppercase();
        let quantity = record.quantity.unwrap_or(Decimal::ZERO);

        let total = parse_amount(&record.total_amount);
        let price = parse_amount(&record.price_per_share);
        let total_eur = convert_to_eur(total, &currency, record.fx_rate, &ticker)?;
        let price_eur = convert_to_eur(price, &currency, record.fx_rate, &ticker)?;

        let fees_eur = match kind {
            TransactionKind::Buy | TransactionKind::Sell if quantity > Decimal::ZERO => {
                total_eur - price_eur * quantity
            }
            _ => Decimal::ZERO,
        };

        out.push(NormalizedTransaction {
            date,
            year: date.year(),
            ticker,
            resolved,
            kind,
            quantity,
            price_eur,
            total_eur,
            fees_eur,
            currency,
            fx_rate: record.fx_rate,
            asset_class,
        });
    }

    // Stable sort: FIFO correctness needs strict date order across mixed
    // sources, with input order as the same-date tie-break.
    out.sort_by_key(|tx| tx.date);
    Ok(out)
}
