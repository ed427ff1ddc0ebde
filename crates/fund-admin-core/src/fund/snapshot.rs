use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculators::preferred_return::AccrualPeriod;
use crate::error::FundAdminError;
use crate::fund::terms::{CapitalFlow, CapitalFlowKind, Commitment, FundTerms};
use crate::store::FundRepository;
use crate::time_value::days_between;
use crate::types::*;
use crate::waterfall::calculation::Recipient;
use crate::waterfall::tiers::TierType;
use crate::FundAdminResult;

/// Immutable, point-in-time view of everything a waterfall run reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    pub fund_id: String,
    pub as_of: NaiveDate,
    pub terms: FundTerms,
    pub total_commitments: Money,
    pub total_contributions: Money,
    pub cumulative_distributions: Money,
    pub remaining_capital: Money,
    pub preferred_return_rate: Percent,
    pub carried_interest_rate: Percent,
    pub first_contribution_date: NaiveDate,
    pub days_since_first_contribution: i64,
    pub previous_preferred_paid: Money,
    pub previous_gp_distributions: Money,
    pub accrual_periods: Vec<AccrualPeriod>,
    pub capital_flows: Vec<CapitalFlow>,
    /// LP-facing totals of prior approved distributions, dated
    pub prior_lp_distributions: Vec<CashFlow>,
    /// Return-of-capital tier totals of prior approved distributions, dated
    #[serde(default)]
    pub prior_capital_returns: Vec<CashFlow>,
    pub commitments: Vec<Commitment>,
}

/// Read terms, commitments, capital flows and prior calculations for
/// `fund_id` as of `as_of`.
///
/// Capital handed back by prior return-of-capital tiers is taken off
/// `remaining_capital`, posted to each commitment's `capital_returned` and
/// stops the preferred return accruing from its distribution date.
/// `capital_returned` and `CapitalReturn` flows in the repository record
/// returns made outside the waterfall.
///
/// The caller is expected to hold the store's per-fund serialization
/// (`CalculationStore::atomically`) so that all reads observe one state.
pub fn load_snapshot<R: FundRepository + ?Sized>(
    repo: &R,
    fund_id: &str,
    as_of: NaiveDate,
) -> FundAdminResult<FundSnapshot> {
    let terms = repo.get_fund_terms(fund_id)?;
    terms.validate()?;

    let mut commitments: Vec<Commitment> = repo
        .list_active_commitments(fund_id, as_of)?
        .into_iter()
        .filter(|c| c.is_active_on(as_of))
        .collect();
    for commitment in &commitments {
        commitment.validate()?;
    }

    let mut capital_flows: Vec<CapitalFlow> = repo
        .list_capital_flows(fund_id, as_of)?
        .into_iter()
        .filter(|f| f.date <= as_of)
        .collect();
    capital_flows.sort_by_key(|f| f.date);
    for flow in &capital_flows {
        ensure_non_negative("capital_flows.amount", flow.amount)?;
    }

    let priors = repo.get_prior_calculations(fund_id, as_of)?;

    let mut cumulative_distributions = Decimal::ZERO;
    let mut previous_preferred_paid = Decimal::ZERO;
    let mut previous_gp_distributions = Decimal::ZERO;
    let mut prior_lp_distributions = Vec::new();
    let mut prior_capital_returns = Vec::new();
    let mut returned_by_commitment: BTreeMap<&str, Money> = BTreeMap::new();
    for calc in priors.iter().filter(|c| c.counts_toward_cumulative()) {
        let mut lp_total = Decimal::ZERO;
        let mut capital_returned = Decimal::ZERO;
        for tier in &calc.tiers {
            cumulative_distributions += tier.distributed_amount;
            previous_gp_distributions += tier.gp_amount;
            lp_total += tier.lp_amount;
            match tier.tier_type {
                TierType::ReturnOfCapital => capital_returned += tier.distributed_amount,
                TierType::PreferredReturn => previous_preferred_paid += tier.distributed_amount,
                TierType::CatchUp | TierType::CarriedInterest => {}
            }
        }

        let capital_levels: Vec<u32> = calc
            .tiers
            .iter()
            .filter(|t| t.tier_type == TierType::ReturnOfCapital)
            .map(|t| t.level)
            .collect();
        for event in calc
            .events
            .iter()
            .filter(|e| e.recipient == Recipient::Lp && capital_levels.contains(&e.tier_level))
        {
            if let Some(id) = &event.commitment_id {
                *returned_by_commitment.entry(id.as_str()).or_default() += event.amount;
            }
        }

        let label = Some(format!("calculation {}", calc.id));
        if !capital_returned.is_zero() {
            prior_capital_returns.push(CashFlow {
                date: calc.distribution_date,
                amount: capital_returned,
                label: label.clone(),
            });
        }
        if !lp_total.is_zero() {
            prior_lp_distributions.push(CashFlow {
                date: calc.distribution_date,
                amount: lp_total,
                label,
            });
        }
    }

    let total_commitments: Money = commitments.iter().map(|c| c.commitment_amount).sum();
    let total_contributions: Money = commitments.iter().map(|c| c.capital_called).sum();
    let recorded_unreturned: Money = commitments.iter().map(|c| c.unreturned_capital()).sum();
    let prior_returned: Money = prior_capital_returns.iter().map(|r| r.amount).sum();
    let remaining_capital = (recorded_unreturned - prior_returned).max(Decimal::ZERO);
    for commitment in &mut commitments {
        if let Some(returned) = returned_by_commitment.get(commitment.commitment_id.as_str()) {
            commitment.capital_returned += *returned;
        }
    }

    let first_contribution_date = capital_flows
        .iter()
        .find(|f| f.kind == CapitalFlowKind::Contribution)
        .map(|f| f.date)
        .unwrap_or(terms.inception_date);

    let mut snapshot = FundSnapshot {
        fund_id: fund_id.to_string(),
        as_of,
        preferred_return_rate: terms.preferred_return_rate,
        carried_interest_rate: terms.carried_interest_rate,
        terms,
        total_commitments,
        total_contributions,
        cumulative_distributions,
        remaining_capital,
        first_contribution_date,
        days_since_first_contribution: 0,
        previous_preferred_paid,
        previous_gp_distributions,
        accrual_periods: Vec::new(),
        capital_flows,
        prior_lp_distributions,
        prior_capital_returns,
        commitments,
    };
    snapshot.cut_accrual(as_of)?;

    debug!(
        "snapshot {} as of {}: contributions={} remaining={} cumulative={} days={}",
        snapshot.fund_id,
        as_of,
        snapshot.total_contributions,
        snapshot.remaining_capital,
        snapshot.cumulative_distributions,
        snapshot.days_since_first_contribution
    );
    Ok(snapshot)
}

impl FundSnapshot {
    fn cut_accrual(&mut self, as_of: NaiveDate) -> FundAdminResult<()> {
        let days = days_between(self.first_contribution_date, as_of);
        if days < 0 {
            return Err(FundAdminError::invalid(
                "as_of",
                format!(
                    "Date {as_of} is before the first contribution on {}",
                    self.first_contribution_date
                ),
            ));
        }
        self.as_of = as_of;
        self.days_since_first_contribution = days;
        if self.capital_flows.is_empty() && self.prior_capital_returns.is_empty() {
            self.accrual_periods = vec![AccrualPeriod {
                capital_base: self.total_contributions,
                days,
            }];
            return Ok(());
        }

        let mut flows = if self.capital_flows.is_empty() {
            vec![CapitalFlow {
                date: self.first_contribution_date,
                kind: CapitalFlowKind::Contribution,
                amount: self.total_contributions,
            }]
        } else {
            self.capital_flows.clone()
        };
        flows.extend(self.prior_capital_returns.iter().map(|r| CapitalFlow {
            date: r.date,
            kind: CapitalFlowKind::CapitalReturn,
            amount: r.amount,
        }));
        flows.sort_by_key(|f| f.date);
        self.accrual_periods = accrual_periods_from_flows(&flows, as_of);
        Ok(())
    }
}

/// Split the accrual window at every flow date; each period accrues on the
/// net contributed capital outstanding during it.
fn accrual_periods_from_flows(flows: &[CapitalFlow], as_of: NaiveDate) -> Vec<AccrualPeriod> {
    let mut periods = Vec::new();
    let mut balance = Decimal::ZERO;
    let mut idx = 0;

    while idx < flows.len() {
        let date = flows[idx].date;
        while idx < flows.len() && flows[idx].date == date {
            balance += flows[idx].signed_amount();
            idx += 1;
        }
        let end = flows.get(idx).map(|f| f.date).unwrap_or(as_of);
        let days = days_between(date, end);
        let base = balance.max(Decimal::ZERO);
        if days > 0 && !base.is_zero() {
            periods.push(AccrualPeriod {
                capital_base: base,
                days,
            });
        }
    }
    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow(date: NaiveDate, kind: CapitalFlowKind, amount: Money) -> CapitalFlow {
        CapitalFlow { date, kind, amount }
    }

    #[test]
    fn test_periods_follow_capital_balance() {
        let flows = vec![
            flow(d(2022, 1, 1), CapitalFlowKind::Contribution, dec!(100)),
            flow(d(2022, 7, 1), CapitalFlowKind::Contribution, dec!(50)),
            flow(d(2023, 1, 1), CapitalFlowKind::CapitalReturn, dec!(30)),
        ];
        let periods = accrual_periods_from_flows(&flows, d(2023, 7, 1));
        assert_eq!(
            periods,
            vec![
                AccrualPeriod {
                    capital_base: dec!(100),
                    days: 181
                },
                AccrualPeriod {
                    capital_base: dec!(150),
                    days: 184
                },
                AccrualPeriod {
                    capital_base: dec!(120),
                    days: 181
                },
            ]
        );
    }

    #[test]
    fn test_same_day_flows_collapse_into_one_period() {
        let flows = vec![
            flow(d(2022, 1, 1), CapitalFlowKind::Contribution, dec!(100)),
            flow(d(2022, 1, 1), CapitalFlowKind::Contribution, dec!(25)),
        ];
        let periods = accrual_periods_from_flows(&flows, d(2022, 1, 11));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].capital_base, dec!(125));
        assert_eq!(periods[0].days, 10);
    }

    #[test]
    fn test_fully_returned_capital_stops_accruing() {
        let flows = vec![
            flow(d(2022, 1, 1), CapitalFlowKind::Contribution, dec!(100)),
            flow(d(2022, 1, 31), CapitalFlowKind::CapitalReturn, dec!(100)),
        ];
        let periods = accrual_periods_from_flows(&flows, d(2022, 12, 31));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].days, 30);
    }
}
