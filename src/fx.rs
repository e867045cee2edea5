use crate::tax::ie::SETTLEMENT_CURRENCY;
use crate::transaction::{NormalizedTransaction, TransactionKind};
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FxError {
    #[error("no usable FX history in buy/sell transactions")]
    NoFxHistory,
}

/// Average FX rate weighted by traded EUR value, derived from the buy and
/// sell legs that carried an explicit rate. Used to express residual
/// holding costs back in an instrument's native currency without an
/// external market-data source.
pub fn weighted_fx_rate<'a, I>(transactions: I) -> Result<Decimal, FxError>
where
    I: IntoIterator<Item = &'a NormalizedTransaction>,
{
    let mut total_eur = Decimal::ZERO;
    let mut total_native = Decimal::ZERO;
    for tx in transactions {
        if !matches!(tx.kind, TransactionKind::Buy | TransactionKind::Sell) {
            continue;
        }
        if tx.currency == SETTLEMENT_CURRENCY {
            continue;
        }
        match tx.fx_rate {
            Some(rate) if rate > Decimal::ZERO => {
                total_eur += tx.total_eur;
                total_native += tx.total_eur * rate;
            }
            _ => {}
        }
    }
    if total_eur > Decimal::ZERO {
        Ok(total_native / total_eur)
    } else {
        Err(FxError::NoFxHistory)
    }
}
