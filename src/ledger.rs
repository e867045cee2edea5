use crate::instruments::AssetClass;
use crate::tax::ie::{DEEMED_DISPOSAL_YEARS, EXIT_TAX_RATE};
use crate::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::VecDeque;

/// A parcel of shares acquired together, consumed first-in first-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub acquired: NaiveDate,
}

/// An acquisition retained past disposal, for deemed-disposal anniversary
/// tracking on funds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub date: NaiveDate,
    pub cost_eur: Decimal,
}

/// Values a holding at some later date. The engine only needs a point
/// estimate for deemed disposals, so implementations can be as simple as a
/// fixed growth assumption or as rich as a market-data client.
pub trait ValuationSource {
    fn value_at(
        &self,
        ticker: &str,
        acquired: NaiveDate,
        cost_eur: Decimal,
        as_of: NaiveDate,
    ) -> Decimal;
}

/// Placeholder valuation: cost times a fixed growth factor. Stands in until
/// a market-data source is wired up.
#[derive(Debug, Clone)]
pub struct AssumedGrowth {
    pub factor: Decimal,
}

impl Default for AssumedGrowth {
    fn default() -> Self {
        AssumedGrowth { factor: dec!(1.2) }
    }
}

impl ValuationSource for AssumedGrowth {
    fn value_at(
        &self,
        _ticker: &str,
        _acquired: NaiveDate,
        cost_eur: Decimal,
        _as_of: NaiveDate,
    ) -> Decimal {
        cost_eur * self.factor
    }
}

/// A fund acquisition past its eight-year anniversary, taxable as if sold.
#[derive(Debug, Clone, Serialize)]
pub struct DeemedDisposal {
    pub ticker: String,
    pub acquired: NaiveDate,
    pub years_held: Decimal,
    pub cost_eur: Decimal,
    pub value_eur: Decimal,
    pub gain_eur: Decimal,
}

impl DeemedDisposal {
    pub fn liability(&self) -> Decimal {
        (self.gain_eur * EXIT_TAX_RATE).round_dp(2)
    }
}

/// FIFO cost ledger for one resolved ticker. All amounts are EUR.
#[derive(Debug)]
pub struct InstrumentLedger {
    ticker: String,
    asset_class: AssetClass,
    lots: VecDeque<Lot>,
    total_quantity: Decimal,
    total_cost: Decimal,
    // Retained even after lots are consumed; deemed disposal follows the
    // acquisition anniversary, not the current holding.
    acquisitions: Vec<Acquisition>,
    warnings: Vec<Warning>,
}

impl InstrumentLedger {
    pub fn new(ticker: &str, asset_class: AssetClass) -> Self {
        InstrumentLedger {
            ticker: ticker.to_string(),
            asset_class,
            lots: VecDeque::new(),
            total_quantity: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            acquisitions: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    pub fn total_quantity(&self) -> Decimal {
        self.total_quantity
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn average_cost(&self) -> Option<Decimal> {
        if self.total_quantity > Decimal::ZERO {
            Some(self.total_cost / self.total_quantity)
        } else {
            None
        }
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Record an acquisition. A merger conversion ratio scales the position
    /// into post-merger units: quantity times ratio, unit cost divided by
    /// ratio, total cost unchanged.
    pub fn buy(&mut self, date: NaiveDate, quantity: Decimal, unit_cost: Decimal, ratio: Decimal) {
        let (quantity, unit_cost) = if ratio > Decimal::ZERO && ratio != Decimal::ONE {
            (quantity * ratio, unit_cost / ratio)
        } else {
            (quantity, unit_cost)
        };
        let cost = quantity * unit_cost;
        log::debug!(
            "{}: buy {} @ {} on {}",
            self.ticker,
            quantity,
            unit_cost,
            date
        );
        self.lots.push_back(Lot {
            quantity,
            unit_cost,
            acquired: date,
        });
        self.total_quantity += quantity;
        self.total_cost += cost;
        self.acquisitions.push(Acquisition {
            date,
            cost_eur: cost,
        });
    }

    /// Dispose of shares FIFO and return the realized gain in EUR: full
    /// sale proceeds (pre-conversion price times quantity) less the matched
    /// cost basis from post-conversion lots. Overselling is not clamped:
    /// the unmatched portion simply has no basis to deduct and is reported
    /// as a warning.
    pub fn sell(
        &mut self,
        date: NaiveDate,
        quantity: Decimal,
        unit_price: Decimal,
        ratio: Decimal,
    ) -> Decimal {
        let proceeds = unit_price * quantity;
        let converted = if ratio > Decimal::ZERO && ratio != Decimal::ONE {
            quantity * ratio
        } else {
            quantity
        };
        let (cost_basis, unmatched) = self.consume(converted);
        log::debug!(
            "{}: sell {} @ {} on {}, cost basis {}",
            self.ticker,
            quantity,
            unit_price,
            date,
            cost_basis
        );
        if unmatched > Decimal::ZERO {
            log::warn!(
                "{}: sold {} more shares than held on {}",
                self.ticker,
                unmatched,
                date
            );
            self.warnings.push(Warning::Oversold {
                ticker: self.ticker.clone(),
                date,
                requested: converted,
                unmatched,
            });
        }
        proceeds - cost_basis
    }

    /// Remove shares consumed by a merger. No gain arises; the cost basis
    /// leaves the ledger and reappears via the transfer on the other side.
    pub fn remove_for_merger(&mut self, date: NaiveDate, quantity: Decimal) {
        let (_, unmatched) = self.consume(quantity);
        log::debug!("{}: merger removed {} on {}", self.ticker, quantity, date);
        if unmatched > Decimal::ZERO {
            self.warnings.push(Warning::Oversold {
                ticker: self.ticker.clone(),
                date,
                requested: quantity,
                unmatched,
            });
        }
    }

    /// Receive shares from a broker migration at zero cost. The original
    /// cost basis was already booked when the shares were first bought.
    /// The transfer still counts as an acquisition for deemed-disposal
    /// anniversary tracking.
    pub fn transfer_in(&mut self, date: NaiveDate, quantity: Decimal) {
        log::debug!("{}: transfer in {} on {}", self.ticker, quantity, date);
        self.lots.push_back(Lot {
            quantity,
            unit_cost: Decimal::ZERO,
            acquired: date,
        });
        self.total_quantity += quantity;
        self.acquisitions.push(Acquisition {
            date,
            cost_eur: Decimal::ZERO,
        });
    }

    /// Write off the full residual position of a delisted instrument and
    /// return the loss (the remaining cost basis).
    pub fn write_off(&mut self) -> Decimal {
        let loss = self.total_cost;
        self.warnings.push(Warning::InactiveHolding {
            ticker: self.ticker.clone(),
            quantity: self.total_quantity,
            cost_eur: self.total_cost,
        });
        self.lots.clear();
        self.total_quantity = Decimal::ZERO;
        self.total_cost = Decimal::ZERO;
        loss
    }

    /// Deemed disposals for fund acquisitions held eight years or more as
    /// of `as_of`. Stocks never produce any.
    pub fn deemed_disposals(
        &self,
        as_of: NaiveDate,
        valuation: &dyn ValuationSource,
    ) -> Vec<DeemedDisposal> {
        if self.asset_class != AssetClass::Fund {
            return Vec::new();
        }
        let mut out = Vec::new();
        for acq in &self.acquisitions {
            let days = (as_of - acq.date).num_days();
            if days <= 0 {
                continue;
            }
            let years_held = Decimal::from(days) / dec!(365.25);
            if years_held < DEEMED_DISPOSAL_YEARS {
                continue;
            }
            let value_eur = valuation.value_at(&self.ticker, acq.date, acq.cost_eur, as_of);
            out.push(DeemedDisposal {
                ticker: self.ticker.clone(),
                acquired: acq.date,
                years_held: years_held.round_dp(1),
                cost_eur: acq.cost_eur,
                value_eur,
                gain_eur: value_eur - acq.cost_eur,
            });
        }
        out
    }

    /// Pop lots FIFO until `requested` shares are matched. Returns the
    /// matched cost basis and the unmatched remainder.
    fn consume(&mut self, requested: Decimal) -> (Decimal, Decimal) {
        let mut remaining = requested;
        let mut cost_basis = Decimal::ZERO;
        while remaining > Decimal::ZERO {
            let consumed_all = match self.lots.front_mut() {
                None => break,
                Some(lot) => {
                    if lot.quantity <= remaining {
                        cost_basis += lot.quantity * lot.unit_cost;
                        self.total_quantity -= lot.quantity;
                        self.total_cost -= lot.quantity * lot.unit_cost;
                        remaining -= lot.quantity;
                        true
                    } else {
                        cost_basis += remaining * lot.unit_cost;
                        self.total_quantity -= remaining;
                        self.total_cost -= remaining * lot.unit_cost;
                        lot.quantity -= remaining;
                        remaining = Decimal::ZERO;
                        false
                    }
                }
            };
            if consumed_all {
                self.lots.pop_front();
            }
        }
        (cost_basis, remaining)
    }
}
