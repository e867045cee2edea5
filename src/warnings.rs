use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Data-quality findings emitted during ledger replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// A disposal or merger removal exceeded the recorded lots. The unmatched
    /// quantity has no cost basis, so the realized gain for the disposal is
    /// overstated. Usually means missing buy records in the input.
    Oversold {
        ticker: String,
        date: NaiveDate,
        requested: Decimal,
        unmatched: Decimal,
    },
    /// Residual holding in a delisted instrument was written off as a
    /// realized loss in the evaluation year.
    InactiveHolding {
        ticker: String,
        quantity: Decimal,
        cost_eur: Decimal,
    },
}

impl Warning {
    pub fn ticker(&self) -> &str {
        match self {
            Warning::Oversold { ticker, .. } => ticker,
            Warning::InactiveHolding { ticker, .. } => ticker,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Warning::Oversold {
                ticker,
                date,
                requested,
                unmatched,
            } => format!(
                "{ticker}: disposal of {requested} on {date} exceeds recorded lots by {unmatched}"
            ),
            Warning::InactiveHolding {
                ticker,
                quantity,
                cost_eur,
            } => format!(
                "{ticker}: {quantity} residual shares in inactive instrument written off (EUR {cost_eur})"
            ),
        }
    }
}
