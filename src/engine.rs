use crate::fx::weighted_fx_rate;
use crate::instruments::{AssetClass, InstrumentResolver, ResolveError};
use crate::ledger::{DeemedDisposal, InstrumentLedger, ValuationSource};
use crate::tax::ie::{HOME_DOMICILE, SETTLEMENT_CURRENCY, MarginalRate};
use crate::tax::{cgt, dividends, exit_tax};
use crate::tax::{CgtAssessment, DividendAssessment, ExitTaxAssessment, LossCarryForward};
use crate::transaction::{NormalizedTransaction, TransactionKind};
use crate::warnings::Warning;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Evaluation date for deemed disposals and residual write-offs.
    pub as_of: NaiveDate,
    pub marginal_rate: MarginalRate,
}

/// Per-year totals for one asset class, accumulated during replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct YearlyTotals {
    pub realized_gains: Decimal,
    pub dividends: Decimal,
    pub dividends_domestic: Decimal,
    pub dividends_foreign: Decimal,
    pub deemed_gains: Decimal,
}

/// Per-instrument breakdown for the detail view and CSV export.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentDetail {
    pub ticker: String,
    pub asset_class: AssetClass,
    pub realized_gains: BTreeMap<i32, Decimal>,
    pub dividends: BTreeMap<i32, Decimal>,
    pub holdings: Decimal,
    pub average_cost: Option<Decimal>,
    /// Currency the average cost is expressed in. EUR unless FX history
    /// allows converting back to the instrument's native currency.
    pub cost_currency: String,
    pub deemed_disposal_liability: Decimal,
    pub withholding_deducted: bool,
}

/// One tax year's assessments across both regimes.
#[derive(Debug, Clone, Serialize)]
pub struct YearAssessment {
    pub year: i32,
    pub stocks: YearlyTotals,
    pub funds: YearlyTotals,
    pub cgt: CgtAssessment,
    pub exit_tax: ExitTaxAssessment,
    pub dividends: Option<DividendAssessment>,
}

impl YearAssessment {
    pub fn total_due(&self) -> Decimal {
        self.cgt.liability
            + self.exit_tax.liability
            + self
                .dividends
                .as_ref()
                .map(|d| d.net_due)
                .unwrap_or(Decimal::ZERO)
    }

    pub fn refund_due(&self) -> Decimal {
        self.dividends
            .as_ref()
            .map(|d| d.refund_due)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Serialize)]
pub struct TaxReport {
    pub years: Vec<YearAssessment>,
    pub instruments: BTreeMap<String, InstrumentDetail>,
    pub deemed_disposals: Vec<DeemedDisposal>,
    pub warnings: Vec<Warning>,
}

fn class_totals<'a>(
    stocks: &'a mut BTreeMap<i32, YearlyTotals>,
    funds: &'a mut BTreeMap<i32, YearlyTotals>,
    class: AssetClass,
    year: i32,
) -> &'a mut YearlyTotals {
    let map = match class {
        AssetClass::Stock => stocks,
        AssetClass::Fund => funds,
    };
    map.entry(year).or_default()
}

/// Replay the normalized transaction stream through per-instrument FIFO
/// ledgers and assess each tax year.
///
/// The input must already be date-sorted; replay is a single pass and
/// produces identical output for identical input. Tax years are assessed
/// in ascending order so CGT losses carry forward correctly.
pub fn calculate(
    transactions: &[NormalizedTransaction],
    resolver: &dyn InstrumentResolver,
    valuation: &dyn ValuationSource,
    options: &EngineOptions,
) -> Result<TaxReport, ResolveError> {
    let mut ledgers: BTreeMap<String, InstrumentLedger> = BTreeMap::new();
    let mut details: BTreeMap<String, InstrumentDetail> = BTreeMap::new();
    let mut stock_years: BTreeMap<i32, YearlyTotals> = BTreeMap::new();
    let mut fund_years: BTreeMap<i32, YearlyTotals> = BTreeMap::new();

    for tx in transactions {
        let ledger = ledgers
            .entry(tx.resolved.clone())
            .or_insert_with(|| InstrumentLedger::new(&tx.resolved, tx.asset_class));
        let detail = details
            .entry(tx.resolved.clone())
            .or_insert_with(|| InstrumentDetail {
                ticker: tx.resolved.clone(),
                asset_class: tx.asset_class,
                realized_gains: BTreeMap::new(),
                dividends: BTreeMap::new(),
                holdings: Decimal::ZERO,
                average_cost: None,
                cost_currency: SETTLEMENT_CURRENCY.to_string(),
                deemed_disposal_liability: Decimal::ZERO,
                withholding_deducted: false,
            });
        // The conversion ratio lives on the pre-merger ticker's entry.
        let ratio = resolver.resolve(&tx.ticker)?.conversion_ratio;

        match tx.kind {
            TransactionKind::Buy if tx.quantity > Decimal::ZERO => {
                ledger.buy(tx.date, tx.quantity, tx.price_eur, ratio);
            }
            TransactionKind::Sell if tx.quantity > Decimal::ZERO => {
                let gain = ledger.sell(tx.date, tx.quantity, tx.price_eur, ratio);
                class_totals(&mut stock_years, &mut fund_years, tx.asset_class, tx.year)
                    .realized_gains += gain;
                *detail.realized_gains.entry(tx.year).or_default() += gain;
            }
            TransactionKind::Dividend => {
                let amount = tx.total_eur;
                let totals =
                    class_totals(&mut stock_years, &mut fund_years, tx.asset_class, tx.year);
                totals.dividends += amount;
                if resolver.resolve(&tx.resolved)?.domicile == HOME_DOMICILE {
                    totals.dividends_domestic += amount;
                } else {
                    totals.dividends_foreign += amount;
                }
                *detail.dividends.entry(tx.year).or_default() += amount;
            }
            TransactionKind::MergerStock | TransactionKind::MergerGeneric
                if tx.quantity < Decimal::ZERO =>
            {
                // Merger records are in pre-merger units; the ledger holds
                // converted shares.
                let mut quantity = -tx.quantity;
                if ratio > Decimal::ZERO {
                    quantity *= ratio;
                }
                ledger.remove_for_merger(tx.date, quantity);
            }
            TransactionKind::MergerCash if tx.total_eur > Decimal::ZERO => {
                // Cash consideration from a merger is taxed like a foreign
                // dividend: no DWT was deducted at source.
                let totals =
                    class_totals(&mut stock_years, &mut fund_years, tx.asset_class, tx.year);
                totals.dividends += tx.total_eur;
                totals.dividends_foreign += tx.total_eur;
                *detail.dividends.entry(tx.year).or_default() += tx.total_eur;
            }
            TransactionKind::TransferFromMerger if tx.quantity > Decimal::ZERO => {
                ledger.transfer_in(tx.date, tx.quantity);
            }
            other => {
                log::debug!(
                    "{}: skipping {:?} with no effect (qty {}, total {})",
                    tx.resolved,
                    other,
                    tx.quantity,
                    tx.total_eur
                );
            }
        }
    }

    let mut deemed_disposals = Vec::new();
    let mut warnings = Vec::new();
    let as_of_year = options.as_of.year();

    for (ticker, ledger) in ledgers.iter_mut() {
        let info = resolver.resolve(ticker)?;
        let detail = match details.get_mut(ticker) {
            Some(d) => d,
            None => continue,
        };
        detail.withholding_deducted = info.withholding_deducted;

        // Residual holdings in a delisted instrument are worthless; write
        // the remaining cost basis off as a loss in the evaluation year.
        if !info.active && ledger.total_quantity() > Decimal::ZERO {
            let loss = ledger.write_off();
            class_totals(
                &mut stock_years,
                &mut fund_years,
                ledger.asset_class(),
                as_of_year,
            )
            .realized_gains -= loss;
            *detail.realized_gains.entry(as_of_year).or_default() -= loss;
        }

        for dd in ledger.deemed_disposals(options.as_of, valuation) {
            fund_years.entry(as_of_year).or_default().deemed_gains += dd.gain_eur;
            detail.deemed_disposal_liability += dd.liability();
            deemed_disposals.push(dd);
        }

        detail.holdings = ledger.total_quantity();
        if let Some(avg_eur) = ledger.average_cost() {
            if info.currency == SETTLEMENT_CURRENCY {
                detail.average_cost = Some(avg_eur);
            } else {
                let own_txs = transactions.iter().filter(|tx| &tx.resolved == ticker);
                match weighted_fx_rate(own_txs) {
                    Ok(rate) => {
                        detail.average_cost = Some(avg_eur * rate);
                        detail.cost_currency = info.currency.clone();
                    }
                    Err(_) => {
                        detail.average_cost = Some(avg_eur);
                    }
                }
            }
        }

        warnings.extend(ledger.take_warnings());
    }

    let mut years = Vec::new();
    let mut carry = LossCarryForward::default();
    let all_years: std::collections::BTreeSet<i32> = stock_years
        .keys()
        .chain(fund_years.keys())
        .copied()
        .collect();
    for year in all_years {
        let stocks = stock_years.get(&year).cloned().unwrap_or_default();
        let funds = fund_years.get(&year).cloned().unwrap_or_default();
        let cgt = cgt::assess(stocks.realized_gains, &mut carry);
        let exit_tax =
            exit_tax::assess(funds.realized_gains, funds.dividends, funds.deemed_gains);
        let dividends = dividends::assess(
            stocks.dividends_domestic,
            stocks.dividends_foreign,
            options.marginal_rate,
        );
        years.push(YearAssessment {
            year,
            stocks,
            funds,
            cgt,
            exit_tax,
            dividends,
        });
    }

    Ok(TaxReport {
        years,
        instruments: details,
        deemed_disposals,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::testing::{fund, stock, MapResolver};
    use crate::ledger::AssumedGrowth;
    use crate::transaction::{normalize, RawTransaction};
    use rust_decimal_macros::dec;

    fn raw(date: &str, ticker: &str, kind: &str, qty: &str, price: &str, total: &str) -> RawTransaction {
        RawTransaction {
            date: date.to_string(),
            ticker: ticker.to_string(),
            kind: kind.to_string(),
            quantity: if qty.is_empty() {
                None
            } else {
                Some(qty.parse().unwrap())
            },
            price_per_share: price.to_string(),
            total_amount: total.to_string(),
            currency: "EUR".to_string(),
            fx_rate: None,
        }
    }

    fn options(as_of: &str) -> EngineOptions {
        EngineOptions {
            as_of: as_of.parse().unwrap(),
            marginal_rate: MarginalRate::Higher,
        }
    }

    fn run(
        records: &[RawTransaction],
        resolver: &MapResolver,
        opts: &EngineOptions,
    ) -> TaxReport {
        let txs = normalize(records, resolver).unwrap();
        calculate(&txs, resolver, &AssumedGrowth::default(), opts).unwrap()
    }

    #[test]
    fn loss_carries_forward_across_years() {
        let resolver = MapResolver::new(vec![("CRH", stock("EUR", "IE"))]);
        let records = vec![
            raw("2021-01-10", "CRH", "BUY", "100", "€10", "€1000"),
            raw("2021-06-10", "CRH", "SELL", "100", "€5", "€500"),
            raw("2022-01-10", "CRH", "BUY", "100", "€10", "€1000"),
            raw("2022-06-10", "CRH", "SELL", "100", "€30", "€3000"),
        ];
        let report = run(&records, &resolver, &options("2023-06-01"));
        assert_eq!(report.years.len(), 2);

        let y2021 = &report.years[0];
        assert_eq!(y2021.cgt.liability, Decimal::ZERO);
        assert_eq!(y2021.cgt.losses_carried_forward, dec!(500));

        // 2000 gain - 1270 exemption - 500 carried loss = 230 at 33%.
        let y2022 = &report.years[1];
        assert_eq!(y2022.cgt.loss_relief_used, dec!(500));
        assert_eq!(y2022.cgt.liability, dec!(75.90));
    }

    #[test]
    fn funds_and_stocks_assessed_separately() {
        let resolver = MapResolver::new(vec![
            ("CRH", stock("EUR", "IE")),
            ("VWCE", fund("EUR", "IE")),
        ]);
        let records = vec![
            raw("2022-01-10", "CRH", "BUY", "10", "€100", "€1000"),
            raw("2022-01-10", "VWCE", "BUY", "10", "€100", "€1000"),
            raw("2022-06-10", "CRH", "SELL", "10", "€110", "€1100"),
            raw("2022-06-10", "VWCE", "SELL", "10", "€110", "€1100"),
        ];
        let report = run(&records, &resolver, &options("2023-06-01"));
        let year = &report.years[0];
        // The stock gain sits inside the CGT exemption; the identical fund
        // gain is fully taxable at 41%.
        assert_eq!(year.cgt.liability, Decimal::ZERO);
        assert_eq!(year.exit_tax.liability, dec!(41.00));
        assert_eq!(year.total_due(), dec!(41.00));
    }

    #[test]
    fn dividend_domicile_split_and_credits() {
        let resolver = MapResolver::new(vec![
            ("CRH", stock("EUR", "IE")),
            ("AAPL", stock("EUR", "US")),
        ]);
        let records = vec![
            raw("2022-03-10", "CRH", "DIVIDEND", "", "", "€400"),
            raw("2022-04-10", "AAPL", "DIVIDEND", "", "", "€600"),
        ];
        let report = run(&records, &resolver, &options("2023-06-01"));
        let d = report.years[0].dividends.as_ref().unwrap();
        assert_eq!(d.domestic, dec!(400));
        assert_eq!(d.foreign, dec!(600));
        // 40% of 1000 minus 25% of 400 minus 15% of 600.
        assert_eq!(d.net_due, dec!(210.00));
    }

    #[test]
    fn merger_chain_preserves_position() {
        let mut oldco = stock("EUR", "IE");
        oldco.merged_into = Some("NEWCO".to_string());
        oldco.conversion_ratio = dec!(0.5);
        let resolver =
            MapResolver::new(vec![("OLDCO", oldco), ("NEWCO", stock("EUR", "IE"))]);
        let transfer_type =
            "TRANSFER FROM REVOLUT TRADING LTD TO REVOLUT SECURITIES EUROPE UAB";
        let records = vec![
            // 10 old shares at 6 become 5 new shares at 12.
            raw("2022-01-10", "OLDCO", "BUY", "10", "€6", "€60"),
            raw("2022-03-10", "OLDCO", "MERGER - STOCK", "-10", "", ""),
            raw("2022-03-11", "OLDCO", transfer_type, "5", "", ""),
            raw("2022-06-10", "NEWCO", "SELL", "5", "€20", "€100"),
        ];
        let report = run(&records, &resolver, &options("2023-06-01"));
        let detail = &report.instruments["NEWCO"];
        assert_eq!(detail.holdings, Decimal::ZERO);
        // Transferred shares carry zero cost, so the full 100 is gain. The
        // original 60 cost basis left the ledger with the merger removal.
        assert_eq!(detail.realized_gains[&2022], dec!(100));
        assert!(report.warnings.is_empty());
        assert!(!report.instruments.contains_key("OLDCO"));
    }

    #[test]
    fn inactive_residual_written_off_in_evaluation_year() {
        let mut dead = stock("EUR", "IE");
        dead.active = false;
        let resolver = MapResolver::new(vec![("DEAD", dead)]);
        let records = vec![raw("2020-01-10", "DEAD", "BUY", "10", "€25", "€250")];
        let report = run(&records, &resolver, &options("2023-06-01"));
        let y2023 = report.years.iter().find(|y| y.year == 2023).unwrap();
        assert_eq!(y2023.stocks.realized_gains, dec!(-250));
        assert_eq!(y2023.cgt.losses_carried_forward, dec!(250));
        assert!(matches!(
            report.warnings[0],
            Warning::InactiveHolding { .. }
        ));
        assert_eq!(report.instruments["DEAD"].holdings, Decimal::ZERO);
    }

    #[test]
    fn deemed_disposal_feeds_exit_tax() {
        let resolver = MapResolver::new(vec![("VWCE", fund("EUR", "IE"))]);
        let records = vec![raw("2014-01-10", "VWCE", "BUY", "100", "€10", "€1000")];
        let report = run(&records, &resolver, &options("2023-06-01"));
        assert_eq!(report.deemed_disposals.len(), 1);
        assert_eq!(report.deemed_disposals[0].gain_eur, dec!(200));
        let y2023 = report.years.iter().find(|y| y.year == 2023).unwrap();
        assert_eq!(y2023.funds.deemed_gains, dec!(200));
        assert_eq!(y2023.exit_tax.liability, dec!(82.00));
        assert_eq!(
            report.instruments["VWCE"].deemed_disposal_liability,
            dec!(82.00)
        );
    }

    #[test]
    fn oversell_surfaces_as_warning() {
        let resolver = MapResolver::new(vec![("CRH", stock("EUR", "IE"))]);
        let records = vec![
            raw("2022-01-10", "CRH", "BUY", "5", "€10", "€50"),
            raw("2022-06-10", "CRH", "SELL", "8", "€12", "€96"),
        ];
        let report = run(&records, &resolver, &options("2023-06-01"));
        assert_eq!(report.warnings.len(), 1);
        match &report.warnings[0] {
            Warning::Oversold { unmatched, .. } => assert_eq!(*unmatched, dec!(3)),
            other => panic!("unexpected warning {other:?}"),
        }
        // Full proceeds less the matched basis: 8*12 - 5*10.
        assert_eq!(report.instruments["CRH"].realized_gains[&2022], dec!(46));
    }

    #[test]
    fn average_cost_in_native_currency_via_weighted_fx() {
        let resolver = MapResolver::new(vec![("AAPL", stock("USD", "US"))]);
        let mut buy = raw("2022-01-10", "AAPL", "BUY", "10", "100", "1000");
        buy.currency = "USD".to_string();
        buy.fx_rate = Some(dec!(1.25));
        let report = run(&[buy], &resolver, &options("2023-06-01"));
        let detail = &report.instruments["AAPL"];
        // 1000 USD at 1.25 is 800 EUR cost; back out at the weighted rate.
        assert_eq!(detail.average_cost, Some(dec!(100)));
        assert_eq!(detail.cost_currency, "USD");
    }

    #[test]
    fn average_cost_falls_back_to_eur_without_fx_history() {
        // USD-denominated instrument bought through a EUR settlement leg:
        // there is no rate to back the cost out to USD.
        let resolver = MapResolver::new(vec![("AAPL", stock("USD", "US"))]);
        let records = vec![raw("2022-01-10", "AAPL", "BUY", "10", "€80", "€800")];
        let report = run(&records, &resolver, &options("2023-06-01"));
        let detail = &report.instruments["AAPL"];
        assert_eq!(detail.average_cost, Some(dec!(80)));
        assert_eq!(detail.cost_currency, "EUR");
    }

    #[test]
    fn identical_input_gives_identical_report() {
        let resolver = MapResolver::new(vec![
            ("CRH", stock("EUR", "IE")),
            ("VWCE", fund("EUR", "IE")),
        ]);
        let records = vec![
            raw("2021-01-10", "CRH", "BUY", "100", "€10", "€1000"),
            raw("2021-06-10", "CRH", "SELL", "50", "€5", "€250"),
            raw("2022-03-10", "VWCE", "DIVIDEND", "", "", "€40"),
        ];
        let opts = options("2023-06-01");
        let a = run(&records, &resolver, &opts);
        let b = run(&records, &resolver, &opts);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
