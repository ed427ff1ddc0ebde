use chrono::NaiveDate;
use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fund::{CapitalFlowKind, FundSnapshot};
use crate::time_value::xirr;
use crate::types::*;
use crate::waterfall::calculation::IrrAnalysis;

const IRR_GUESS: Decimal = dec!(0.10);

/// LP net cash flows as seen by the fund's investors: contributions out,
/// prior LP distributions and this calculation's LP amount in.
fn lp_cash_flows(
    snapshot: &FundSnapshot,
    distribution_date: NaiveDate,
    lp_amount: Money,
) -> Vec<(NaiveDate, Money)> {
    let mut flows: Vec<(NaiveDate, Money)> = snapshot
        .capital_flows
        .iter()
        .filter(|f| f.kind == CapitalFlowKind::Contribution)
        .map(|f| (f.date, -f.amount))
        .collect();
    if flows.is_empty() && snapshot.total_contributions > Decimal::ZERO {
        flows.push((
            snapshot.first_contribution_date,
            -snapshot.total_contributions,
        ));
    }
    flows.extend(
        snapshot
            .prior_lp_distributions
            .iter()
            .map(|cf| (cf.date, cf.amount)),
    );
    if lp_amount > Decimal::ZERO {
        flows.push((distribution_date, lp_amount));
    }
    flows
}

/// LP net IRR (percent) and multiple including this distribution.
///
/// Failures do not abort the calculation; they come back as warnings and a
/// `None` field.
pub fn analyze_lp_returns(
    snapshot: &FundSnapshot,
    distribution_date: NaiveDate,
    lp_amount: Money,
    warnings: &mut Vec<String>,
) -> IrrAnalysis {
    let flows = lp_cash_flows(snapshot, distribution_date, lp_amount);
    let total_contributed: Money = flows
        .iter()
        .filter(|(_, a)| *a < Decimal::ZERO)
        .map(|(_, a)| -*a)
        .sum();
    let total_lp_distributions: Money = flows
        .iter()
        .filter(|(_, a)| *a > Decimal::ZERO)
        .map(|(_, a)| *a)
        .sum();

    let lp_multiple = if total_contributed > Decimal::ZERO {
        Some((total_lp_distributions / total_contributed).round_dp(4))
    } else {
        warnings.push("LP multiple unavailable: no contributed capital".into());
        None
    };

    let lp_net_irr = match xirr(&flows, IRR_GUESS) {
        Ok(rate) => Some((rate * dec!(100)).round_dp(4)),
        Err(e) => {
            warn!("LP IRR for fund {} unavailable: {e}", snapshot.fund_id);
            warnings.push(format!("IRR unavailable: {e}"));
            None
        }
    };

    IrrAnalysis {
        lp_net_irr,
        lp_multiple,
        total_contributed,
        total_lp_distributions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::preferred_return::AccrualPeriod;
    use crate::fund::{CapitalFlow, CarryMethod, FundTerms};

    fn snapshot(flows: Vec<CapitalFlow>, total_contributions: Money) -> FundSnapshot {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let terms = FundTerms {
            fund_id: "F1".into(),
            name: "Fund I".into(),
            preferred_return_rate: dec!(8),
            carried_interest_rate: dec!(20),
            catch_up_pct: dec!(100),
            hurdle_tiers: vec![],
            carry_method: CarryMethod::Standard,
            currency: Currency::USD,
            gp_investor_id: "GP".into(),
            inception_date: start,
        };
        FundSnapshot {
            fund_id: "F1".into(),
            as_of: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            preferred_return_rate: terms.preferred_return_rate,
            carried_interest_rate: terms.carried_interest_rate,
            terms,
            total_commitments: total_contributions,
            total_contributions,
            cumulative_distributions: Decimal::ZERO,
            remaining_capital: total_contributions,
            first_contribution_date: start,
            days_since_first_contribution: 365,
            previous_preferred_paid: Decimal::ZERO,
            previous_gp_distributions: Decimal::ZERO,
            accrual_periods: vec![AccrualPeriod {
                capital_base: total_contributions,
                days: 365,
            }],
            capital_flows: flows,
            prior_lp_distributions: vec![],
            prior_capital_returns: vec![],
            commitments: vec![],
        }
    }

    #[test]
    fn test_one_year_ten_percent() {
        let snap = snapshot(vec![], dec!(1000000));
        let mut warnings = Vec::new();
        let analysis = analyze_lp_returns(
            &snap,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            dec!(1100000),
            &mut warnings,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(analysis.lp_multiple, Some(dec!(1.1)));
        let irr = analysis.lp_net_irr.unwrap();
        assert!((irr - dec!(10)).abs() < dec!(0.001), "irr = {irr}");
    }

    #[test]
    fn test_missing_distribution_becomes_warning() {
        let snap = snapshot(vec![], dec!(1000000));
        let mut warnings = Vec::new();
        let analysis = analyze_lp_returns(
            &snap,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            Decimal::ZERO,
            &mut warnings,
        );
        assert_eq!(analysis.lp_net_irr, None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("IRR unavailable"));
    }
}
