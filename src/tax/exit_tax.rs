//! Exit tax on fund and ETF proceeds: one flat rate on the sum of realized
//! gains, distributions and deemed-disposal gains, with no personal
//! exemption and no loss carry-forward across years.

use crate::tax::ie::EXIT_TAX_RATE;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ExitTaxAssessment {
    pub realized_gains: Decimal,
    pub distributions: Decimal,
    pub deemed_gains: Decimal,
    pub taxable: Decimal,
    pub liability: Decimal,
}

pub fn assess(
    realized_gains: Decimal,
    distributions: Decimal,
    deemed_gains: Decimal,
) -> ExitTaxAssessment {
    // Fund losses net against same-year gains and distributions, but a net
    // loss year owes nothing and carries nothing forward.
    let taxable = realized_gains + distributions + deemed_gains;
    ExitTaxAssessment {
        realized_gains,
        distributions,
        deemed_gains,
        taxable,
        liability: (taxable.max(Decimal::ZERO) * EXIT_TAX_RATE).round_dp(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_rate_with_no_exemption() {
        let a = assess(dec!(100), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(a.taxable, dec!(100));
        assert_eq!(a.liability, dec!(41.00));
    }

    #[test]
    fn losses_net_within_the_year() {
        let a = assess(dec!(-100), dec!(40), dec!(200));
        assert_eq!(a.taxable, dec!(140));
        assert_eq!(a.liability, dec!(57.40));
    }

    #[test]
    fn net_loss_year_owes_nothing() {
        let a = assess(dec!(-250), dec!(40), dec!(200));
        assert_eq!(a.taxable, dec!(-10));
        assert_eq!(a.liability, Decimal::ZERO);
    }
}
