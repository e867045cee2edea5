//! Irish tax constants and rates.
//!
//! The Irish tax year is the calendar year, so years are plain `i32`
//! throughout. Rates are the ones currently in force; they have been stable
//! for several years.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// All monetary figures are settled in EUR.
pub const SETTLEMENT_CURRENCY: &str = "EUR";

/// Dividends from instruments domiciled here count as domestic.
pub const HOME_DOMICILE: &str = "IE";

/// Capital Gains Tax rate on stock disposals.
pub const CGT_RATE: Decimal = dec!(0.33);

/// Annual CGT exemption for individuals (section 601 TCA).
pub const CGT_ANNUAL_EXEMPTION: Decimal = dec!(1270);

/// Exit tax rate on fund gains, dividends and deemed disposals.
pub const EXIT_TAX_RATE: Decimal = dec!(0.41);

/// Dividend withholding tax credit rate on domestic dividends.
pub const DWT_CREDIT_RATE: Decimal = dec!(0.25);

/// Treaty withholding credit rate on foreign dividends.
pub const FOREIGN_WITHHOLDING_CREDIT_RATE: Decimal = dec!(0.15);

/// Fund holdings are taxed as if sold after this many years (deemed disposal).
pub const DEEMED_DISPOSAL_YEARS: Decimal = dec!(8);

/// Marginal income tax rate applied to gross dividend income.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MarginalRate {
    /// 20% standard rate band
    Standard,
    /// 40% higher rate band
    #[default]
    Higher,
    /// 45% (higher rate plus USC/PRSI approximation)
    Top,
}

impl MarginalRate {
    pub fn rate(&self) -> Decimal {
        match self {
            MarginalRate::Standard => dec!(0.20),
            MarginalRate::Higher => dec!(0.40),
            MarginalRate::Top => dec!(0.45),
        }
    }

    pub fn percent(&self) -> Decimal {
        self.rate() * dec!(100)
    }
}
