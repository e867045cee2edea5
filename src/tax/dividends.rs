//! Income tax on stock dividends at the taxpayer's marginal rate, with
//! credits for dividend withholding tax already deducted at source.

use crate::tax::ie::{
    DWT_CREDIT_RATE, FOREIGN_WITHHOLDING_CREDIT_RATE, MarginalRate,
};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DividendAssessment {
    pub gross: Decimal,
    pub domestic: Decimal,
    pub foreign: Decimal,
    pub income_tax: Decimal,
    pub dwt_credit: Decimal,
    pub foreign_credit: Decimal,
    pub total_credits: Decimal,
    pub net_due: Decimal,
    pub refund_due: Decimal,
    pub marginal_rate: MarginalRate,
}

/// Assess one year's dividend income. Returns `None` when there is nothing
/// to assess. Credits in excess of the liability become a refund claim,
/// never a negative liability.
pub fn assess(
    domestic: Decimal,
    foreign: Decimal,
    marginal_rate: MarginalRate,
) -> Option<DividendAssessment> {
    let gross = domestic + foreign;
    if gross <= Decimal::ZERO {
        return None;
    }
    let income_tax = (gross * marginal_rate.rate()).round_dp(2);
    let dwt_credit = (domestic * DWT_CREDIT_RATE).round_dp(2);
    let foreign_credit = (foreign * FOREIGN_WITHHOLDING_CREDIT_RATE).round_dp(2);
    let total_credits = dwt_credit + foreign_credit;
    Some(DividendAssessment {
        gross,
        domestic,
        foreign,
        income_tax,
        dwt_credit,
        foreign_credit,
        total_credits,
        net_due: (income_tax - total_credits).max(Decimal::ZERO),
        refund_due: (total_credits - income_tax).max(Decimal::ZERO),
        marginal_rate,
    })
}
