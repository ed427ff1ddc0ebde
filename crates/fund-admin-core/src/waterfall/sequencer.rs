use log::debug;
use rust_decimal::Decimal;

use crate::calculators::capital::calculate_return_of_capital;
use crate::calculators::carried_interest::{
    calculate_american_carry, calculate_hurdle_carry, calculate_multi_hurdle_carry,
    calculate_standard_carry, calculate_whole_fund_carry_for_distribution, CarryCalc,
};
use crate::calculators::catch_up::{calculate_tier_catch_up, gp_allocation_pct};
use crate::calculators::preferred_return::{
    calculate_compound_preferred_return, calculate_multi_period_preferred_return,
    calculate_preferred_return, CompoundingFrequency, PreferredReturnCalc,
};
use crate::error::FundAdminError;
use crate::fund::{CarryMethod, FundSnapshot};
use crate::types::*;
use crate::waterfall::audit::{AuditTrail, CalculationTrace};
use crate::waterfall::tiers::{check_tier_definitions, TierDefinition, TierResult, TierType};
use crate::FundAdminResult;

/// Running state threaded through the tiers of one calculation.
struct TierContext<'a> {
    snapshot: &'a FundSnapshot,
    compounding: Option<CompoundingFrequency>,
    money_scale: u32,
    /// Prior distributions plus the tiers already executed here
    cumulative_distributed: Money,
    cumulative_gp: Money,
    unreturned_capital: Money,
    preferred_paid: Money,
}

/// What one tier hands out.
struct TierOutcome {
    distributed: Money,
    lp: Money,
    gp: Money,
    trace: CalculationTrace,
}

/// Execute `tiers` in order over `total_distribution`.
///
/// Each tier receives what the previous one left over. Once nothing is left
/// the remaining tiers are recorded untouched. Every tier, executed or not,
/// leaves one entry in `audit`.
pub fn run_tiers(
    snapshot: &FundSnapshot,
    tiers: &[TierDefinition],
    total_distribution: Money,
    compounding: Option<CompoundingFrequency>,
    money_scale: u32,
    audit: &mut AuditTrail,
) -> FundAdminResult<Vec<TierResult>> {
    check_tier_definitions(tiers)?;
    ensure_non_negative("total_distribution", total_distribution)?;
    if total_distribution > MAX_DISTRIBUTION {
        return Err(FundAdminError::invalid(
            "total_distribution",
            format!("Amount {total_distribution} exceeds the {MAX_DISTRIBUTION} ceiling"),
        ));
    }
    if total_distribution.normalize().scale() > money_scale {
        return Err(FundAdminError::invalid(
            "total_distribution",
            format!("Amount {total_distribution} has more than {money_scale} decimal places"),
        ));
    }

    let mut ctx = TierContext {
        snapshot,
        compounding,
        money_scale,
        cumulative_distributed: snapshot.cumulative_distributions,
        cumulative_gp: snapshot.previous_gp_distributions,
        unreturned_capital: snapshot.remaining_capital,
        preferred_paid: snapshot.previous_preferred_paid,
    };

    let mut available = total_distribution;
    let mut results = Vec::with_capacity(tiers.len());

    for def in tiers {
        if available <= Decimal::ZERO {
            debug!("tier {} ({}) skipped: waterfall exhausted", def.level, def.name);
            audit.record(Some(def), CalculationTrace::TierSkipped { available });
            results.push(TierResult::untouched(def, available));
            continue;
        }

        let outcome = execute_tier(def, &ctx, available)?;
        let remaining = available - outcome.distributed;

        ctx.cumulative_distributed += outcome.distributed;
        ctx.cumulative_gp += outcome.gp;
        match def.tier_type {
            TierType::ReturnOfCapital => ctx.unreturned_capital -= outcome.distributed,
            TierType::PreferredReturn => ctx.preferred_paid += outcome.distributed,
            TierType::CatchUp | TierType::CarriedInterest => {}
        }

        debug!(
            "tier {} ({}): available={} distributed={} lp={} gp={} remaining={}",
            def.level, def.name, available, outcome.distributed, outcome.lp, outcome.gp, remaining
        );
        audit.record(Some(def), outcome.trace);
        results.push(TierResult {
            level: def.level,
            name: def.name.clone(),
            tier_type: def.tier_type,
            lp_allocation_pct: def.lp_allocation_pct,
            gp_allocation_pct: def.gp_allocation_pct,
            available_amount: available,
            distributed_amount: outcome.distributed,
            remaining_amount: remaining,
            lp_amount: outcome.lp,
            gp_amount: outcome.gp,
            executed: true,
        });
        available = remaining;
    }

    Ok(results)
}

fn execute_tier(
    def: &TierDefinition,
    ctx: &TierContext<'_>,
    available: Money,
) -> FundAdminResult<TierOutcome> {
    match def.tier_type {
        TierType::ReturnOfCapital => {
            let calc = calculate_return_of_capital(ctx.unreturned_capital.max(Decimal::ZERO), available)?;
            let distributed = settle(calc.to_distribute, available, ctx.money_scale);
            let (lp, gp) = split_by_tier(distributed, def, ctx.money_scale)?;
            Ok(TierOutcome {
                distributed,
                lp,
                gp,
                trace: CalculationTrace::ReturnOfCapital(calc),
            })
        }
        TierType::PreferredReturn => {
            let calc = preferred_return(ctx, available)?;
            let distributed = settle(calc.to_distribute, available, ctx.money_scale);
            let (lp, gp) = split_by_tier(distributed, def, ctx.money_scale)?;
            Ok(TierOutcome {
                distributed,
                lp,
                gp,
                trace: CalculationTrace::PreferredReturn(calc),
            })
        }
        TierType::CatchUp => {
            let calc = calculate_tier_catch_up(
                available,
                ctx.cumulative_distributed,
                ctx.snapshot.carried_interest_rate,
                gp_allocation_pct(ctx.cumulative_gp, ctx.cumulative_distributed),
                def.gp_allocation_pct,
            )?;
            let distributed = settle(calc.to_distribute, available, ctx.money_scale);
            let (lp, gp) = split_by_tier(distributed, def, ctx.money_scale)?;
            Ok(TierOutcome {
                distributed,
                lp,
                gp,
                trace: CalculationTrace::CatchUp(calc),
            })
        }
        TierType::CarriedInterest => {
            let calc = carried_interest(def, ctx, available)?;
            let gp = round_money(calc.gp_amount(), ctx.money_scale).min(available);
            Ok(TierOutcome {
                distributed: available,
                lp: available - gp,
                gp,
                trace: CalculationTrace::CarriedInterest(calc),
            })
        }
    }
}

/// Compound accrual when requested, otherwise simple accrual over the
/// snapshot's accrual periods.
fn preferred_return(ctx: &TierContext<'_>, available: Money) -> FundAdminResult<PreferredReturnCalc> {
    let snapshot = ctx.snapshot;
    let rate = snapshot.preferred_return_rate;
    match (ctx.compounding, snapshot.accrual_periods.as_slice()) {
        (Some(frequency), _) => calculate_compound_preferred_return(
            snapshot.total_contributions,
            rate,
            snapshot.days_since_first_contribution,
            frequency,
            ctx.preferred_paid,
            available,
        ),
        (None, [single]) => calculate_preferred_return(
            single.capital_base,
            rate,
            single.days,
            ctx.preferred_paid,
            available,
        ),
        (None, periods) => {
            calculate_multi_period_preferred_return(periods, rate, ctx.preferred_paid, available)
        }
    }
}

/// The carry tier takes everything left; the fund's carry method decides
/// the GP share of it.
fn carried_interest(
    def: &TierDefinition,
    ctx: &TierContext<'_>,
    available: Money,
) -> FundAdminResult<CarryCalc> {
    let snapshot = ctx.snapshot;
    let rate = def.gp_allocation_pct;
    let calc = match &snapshot.terms.carry_method {
        CarryMethod::Standard => CarryCalc::Standard(calculate_standard_carry(available, rate)?),
        CarryMethod::HurdleGated { hurdle_rate } => CarryCalc::HurdleGated(calculate_hurdle_carry(
            available,
            rate,
            snapshot.total_contributions,
            ctx.cumulative_distributed,
            *hurdle_rate,
        )?),
        CarryMethod::WholeFund { hurdle_rate } => {
            CarryCalc::WholeFund(calculate_whole_fund_carry_for_distribution(
                available,
                ctx.cumulative_distributed + available,
                snapshot.total_contributions,
                rate,
                *hurdle_rate,
                ctx.cumulative_gp,
            )?)
        }
        CarryMethod::MultiHurdle => CarryCalc::MultiHurdle(calculate_multi_hurdle_carry(
            available,
            snapshot.total_contributions,
            ctx.cumulative_distributed,
            &snapshot.terms.hurdle_tiers,
        )?),
        CarryMethod::AmericanWithCatchUp => {
            CarryCalc::AmericanWithCatchUp(calculate_american_carry(
                available,
                ctx.cumulative_distributed,
                rate,
                gp_allocation_pct(ctx.cumulative_gp, ctx.cumulative_distributed),
            )?)
        }
    };
    Ok(calc)
}

/// Round a calculator target to the money scale, never above what is left.
fn settle(target: Money, available: Money, scale: u32) -> Money {
    round_money(target, scale).min(available)
}

fn split_by_tier(
    distributed: Money,
    def: &TierDefinition,
    scale: u32,
) -> FundAdminResult<(Money, Money)> {
    let gp = round_money(pct_of(distributed, def.gp_allocation_pct)?, scale).min(distributed);
    Ok((distributed - gp, gp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::preferred_return::AccrualPeriod;
    use crate::fund::FundTerms;
    use crate::waterfall::tiers::default_tiers;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn snapshot(method: CarryMethod) -> FundSnapshot {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let terms = FundTerms {
            fund_id: "F1".into(),
            name: "Fund I".into(),
            preferred_return_rate: dec!(10),
            carried_interest_rate: dec!(20),
            catch_up_pct: dec!(100),
            hurdle_tiers: vec![],
            carry_method: method,
            currency: Currency::USD,
            gp_investor_id: "GP".into(),
            inception_date: start,
        };
        FundSnapshot {
            fund_id: "F1".into(),
            as_of: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            preferred_return_rate: terms.preferred_return_rate,
            carried_interest_rate: terms.carried_interest_rate,
            terms,
            total_commitments: dec!(300000),
            total_contributions: dec!(300000),
            cumulative_distributions: dec!(150000),
            remaining_capital: dec!(300000),
            first_contribution_date: start,
            days_since_first_contribution: 730,
            previous_preferred_paid: dec!(10000),
            previous_gp_distributions: dec!(80000),
            accrual_periods: vec![AccrualPeriod {
                capital_base: dec!(300000),
                days: 730,
            }],
            capital_flows: vec![],
            prior_lp_distributions: vec![],
            prior_capital_returns: vec![],
            commitments: vec![],
        }
    }

    #[test]
    fn test_four_tier_waterfall_amounts() {
        let snap = snapshot(CarryMethod::Standard);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, dec!(500000), None, 2, &mut audit).unwrap();

        let distributed: Vec<Money> = results.iter().map(|t| t.distributed_amount).collect();
        assert_eq!(
            distributed,
            vec![dec!(300000), dec!(50000), dec!(20000), dec!(130000)]
        );
        let remaining: Vec<Money> = results.iter().map(|t| t.remaining_amount).collect();
        assert_eq!(
            remaining,
            vec![dec!(200000), dec!(150000), dec!(130000), dec!(0)]
        );
        assert_eq!(results[2].gp_amount, dec!(20000));
        assert_eq!(results[3].lp_amount, dec!(104000));
        assert_eq!(results[3].gp_amount, dec!(26000));
        assert_eq!(audit.len(), 4);
    }

    #[test]
    fn test_partial_catch_up_still_reaches_gp_target() {
        let mut snap = snapshot(CarryMethod::Standard);
        snap.terms.catch_up_pct = dec!(80);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, dec!(500000), None, 2, &mut audit).unwrap();

        // GP needs 20k; at 80% of the tier that is a 25k catch-up
        let catch_up = &results[2];
        assert_eq!(catch_up.distributed_amount, dec!(25000));
        assert_eq!(catch_up.gp_amount, dec!(20000));
        assert_eq!(catch_up.lp_amount, dec!(5000));
        assert_eq!(results[3].distributed_amount, dec!(125000));
        assert_eq!(results[3].gp_amount, dec!(25000));
    }

    #[test]
    fn test_exhausted_waterfall_skips_later_tiers() {
        let snap = snapshot(CarryMethod::Standard);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, dec!(120000), None, 2, &mut audit).unwrap();

        assert!(results[0].executed);
        assert_eq!(results[0].distributed_amount, dec!(120000));
        assert!(results[1..].iter().all(|t| !t.executed));
        assert!(results[1..].iter().all(|t| t.distributed_amount.is_zero()));
        assert_eq!(audit.len(), 4);
    }

    #[test]
    fn test_zero_distribution_touches_nothing() {
        let snap = snapshot(CarryMethod::Standard);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, Decimal::ZERO, None, 2, &mut audit).unwrap();
        assert!(results.iter().all(|t| !t.executed));
        assert!(results.iter().all(|t| t.distributed_amount.is_zero()));
    }

    #[test]
    fn test_hurdle_gated_carry_uses_cumulative_to_date() {
        // 150k prior + 300k ROC + 50k pref + 20k catch-up = 520k returned on
        // 300k contributed; a 200% hurdle (600k) is not met.
        let snap = snapshot(CarryMethod::HurdleGated {
            hurdle_rate: dec!(200),
        });
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, dec!(500000), None, 2, &mut audit).unwrap();
        assert_eq!(results[3].gp_amount, Decimal::ZERO);
        assert_eq!(results[3].lp_amount, dec!(130000));
    }

    #[test]
    fn test_rejects_sub_cent_totals_and_negative_totals() {
        let snap = snapshot(CarryMethod::Standard);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        assert!(run_tiers(&snap, &tiers, dec!(100.005), None, 2, &mut audit).is_err());
        assert!(run_tiers(&snap, &tiers, dec!(-1), None, 2, &mut audit).is_err());
        assert!(run_tiers(&snap, &[], dec!(1), None, 2, &mut audit).is_err());
    }

    #[test]
    fn test_american_carry_folds_catch_up_into_carry_tier() {
        let snap = snapshot(CarryMethod::AmericanWithCatchUp);
        let tiers = default_tiers(&snap.terms);
        let mut audit = AuditTrail::new();
        let results = run_tiers(&snap, &tiers, dec!(500000), None, 2, &mut audit).unwrap();
        // Carry tier sees 150k; cumulative 500k, GP at 16% → 20k catch-up,
        // then 130k split 80/20.
        let carry = &results[2];
        assert_eq!(carry.tier_type, TierType::CarriedInterest);
        assert_eq!(carry.distributed_amount, dec!(150000));
        assert_eq!(carry.gp_amount, dec!(46000));
        assert_eq!(carry.lp_amount, dec!(104000));
    }
}
