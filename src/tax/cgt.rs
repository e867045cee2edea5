//! Capital gains tax on stock disposals: flat rate with an annual personal
//! exemption and indefinite carry-forward of net losses.

use crate::tax::ie::{CGT_ANNUAL_EXEMPTION, CGT_RATE};
use rust_decimal::Decimal;
use serde::Serialize;

/// Running balance of unrelieved losses, carried across tax years in
/// ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LossCarryForward(Decimal);

impl LossCarryForward {
    pub fn balance(&self) -> Decimal {
        self.0
    }
}

/// One year's CGT position after exemption and loss relief.
#[derive(Debug, Clone, Serialize)]
pub struct CgtAssessment {
    pub gross_gains: Decimal,
    pub exemption_applied: Decimal,
    pub loss_relief_used: Decimal,
    pub taxable: Decimal,
    pub liability: Decimal,
    pub losses_carried_forward: Decimal,
}

/// Assess one year's net stock gains. The annual exemption is applied
/// before carried losses so losses are not wasted on gains the exemption
/// already covers; a net loss year adds to the carry-forward and owes
/// nothing.
pub fn assess(gross_gains: Decimal, carry: &mut LossCarryForward) -> CgtAssessment {
    let exemption_applied = if gross_gains > Decimal::ZERO {
        gross_gains.min(CGT_ANNUAL_EXEMPTION)
    } else {
        Decimal::ZERO
    };
    let mut after = gross_gains - exemption_applied;

    let mut loss_relief_used = Decimal::ZERO;
    if after > Decimal::ZERO && carry.0 > Decimal::ZERO {
        loss_relief_used = after.min(carry.0);
        carry.0 -= loss_relief_used;
        after -= loss_relief_used;
    }

    let taxable = after.max(Decimal::ZERO);
    if after < Decimal::ZERO {
        carry.0 += -after;
    }

    CgtAssessment {
        gross_gains,
        exemption_applied,
        loss_relief_used,
        taxable,
        liability: (taxable * CGT_RATE).round_dp(2),
        losses_carried_forward: carry.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gains_inside_exemption_owe_nothing() {
        let mut carry = LossCarryForward::default();
        let a = assess(dec!(1000), &mut carry);
        assert_eq!(a.exemption_applied, dec!(1000));
        assert_eq!(a.taxable, Decimal::ZERO);
        assert_eq!(a.liability, Decimal::ZERO);
        assert_eq!(carry.balance(), Decimal::ZERO);
    }

    #[test]
    fn loss_year_then_gain_year() {
        let mut carry = LossCarryForward::default();
        let first = assess(dec!(-500), &mut carry);
        assert_eq!(first.liability, Decimal::ZERO);
        assert_eq!(first.losses_carried_forward, dec!(500));

        // 2000 - 1270 exemption - 500 carried loss = 230 taxable.
        let second = assess(dec!(2000), &mut carry);
        assert_eq!(second.exemption_applied, dec!(1270));
        assert_eq!(second.loss_relief_used, dec!(500));
        assert_eq!(second.taxable, dec!(230));
        assert_eq!(second.liability, dec!(75.90));
        assert_eq!(carry.balance(), Decimal::ZERO);
    }

    #[test]
    fn losses_accumulate_across_years() {
        let mut carry = LossCarryForward::default();
        assess(dec!(-300), &mut carry);
        assess(dec!(-200), &mut carry);
        assert_eq!(carry.balance(), dec!(500));

        // A small gain inside the exemption leaves the carry untouched.
        let a = assess(dec!(1000), &mut carry);
        assert_eq!(a.loss_relief_used, Decimal::ZERO);
        assert_eq!(carry.balance(), dec!(500));
    }

    #[test]
    fn partial_loss_relief_leaves_remainder() {
        let mut carry = LossCarryForward::default();
        assess(dec!(-5000), &mut carry);
        let a = assess(dec!(2270), &mut carry);
        assert_eq!(a.loss_relief_used, dec!(1000));
        assert_eq!(a.liability, Decimal::ZERO);
        assert_eq!(carry.balance(), dec!(4000));
    }
}
