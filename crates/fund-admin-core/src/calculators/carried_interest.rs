use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculators::catch_up::{calculate_catch_up, CatchUpCalc};
use crate::error::FundAdminError;
use crate::fund::terms::HurdleTier;
use crate::types::*;
use crate::FundAdminResult;

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

/// Flat carry split of one distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrySplit {
    pub distribution: Money,
    pub carry_rate: Percent,
    pub carry: Money,
    pub lp: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HurdleCarryCalc {
    pub distribution: Money,
    pub carry_rate: Percent,
    pub hurdle_rate: Percent,
    pub total_contributions: Money,
    pub total_returned: Money,
    pub hurdle_amount: Money,
    pub hurdle_met: bool,
    pub carry: Money,
    pub lp: Money,
}

/// European carry over the life of the fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WholeFundCarryCalc {
    pub total_proceeds: Money,
    pub total_contributions: Money,
    pub carry_rate: Percent,
    pub hurdle_rate: Option<Percent>,
    pub hurdle_amount: Option<Money>,
    pub total_profit: Money,
    pub carry_base: Money,
    pub carry: Money,
}

/// Whole-fund carry applied to a single distribution: the GP receives the
/// carry earned to date less what it has already been paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WholeFundDistributionCalc {
    pub whole_fund: WholeFundCarryCalc,
    pub distribution: Money,
    pub carry_already_paid: Money,
    pub carry: Money,
    pub lp: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmericanCarryCalc {
    pub distribution: Money,
    pub catch_up: CatchUpCalc,
    pub split: CarrySplit,
    pub gp_total: Money,
    pub lp_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiHurdleCarryCalc {
    pub distribution: Money,
    pub hurdle_tiers: Vec<HurdleTier>,
    pub total_contributions: Money,
    pub total_returned: Money,
    pub current_multiple: Multiple,
    pub applied_threshold: Option<Multiple>,
    pub applied_rate: Percent,
    pub carry: Money,
    pub lp: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClawbackCalc {
    pub final_profit: Money,
    pub carry_rate: Percent,
    pub total_carry_paid: Money,
    pub correct_carry: Money,
    pub overdistribution: Money,
    pub net_carry: Money,
}

/// Carry computed for a carried-interest tier, one shape per method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum CarryCalc {
    Standard(CarrySplit),
    HurdleGated(HurdleCarryCalc),
    WholeFund(WholeFundDistributionCalc),
    AmericanWithCatchUp(AmericanCarryCalc),
    MultiHurdle(MultiHurdleCarryCalc),
}

impl CarryCalc {
    /// Amount of the distribution going to the GP.
    pub fn gp_amount(&self) -> Money {
        match self {
            CarryCalc::Standard(c) => c.carry,
            CarryCalc::HurdleGated(c) => c.carry,
            CarryCalc::WholeFund(c) => c.carry,
            CarryCalc::AmericanWithCatchUp(c) => c.gp_total,
            CarryCalc::MultiHurdle(c) => c.carry,
        }
    }

    /// Amount of the distribution going to LPs.
    pub fn lp_amount(&self) -> Money {
        match self {
            CarryCalc::Standard(c) => c.lp,
            CarryCalc::HurdleGated(c) => c.lp,
            CarryCalc::WholeFund(c) => c.lp,
            CarryCalc::AmericanWithCatchUp(c) => c.lp_total,
            CarryCalc::MultiHurdle(c) => c.lp,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculations
// ---------------------------------------------------------------------------

/// `carry = distribution × rate/100`, `lp = distribution − carry`.
pub fn calculate_standard_carry(distribution: Money, carry_rate: Percent) -> FundAdminResult<CarrySplit> {
    ensure_non_negative("distribution", distribution)?;
    ensure_percent("carry_rate", carry_rate)?;
    let carry = pct_of(distribution, carry_rate)?;
    Ok(CarrySplit {
        distribution,
        carry_rate,
        carry,
        lp: distribution - carry,
    })
}

/// Carry gated on `total_returned ≥ total_contributions × hurdle_rate/100`.
/// Below the hurdle the whole distribution goes to LPs.
pub fn calculate_hurdle_carry(
    distribution: Money,
    carry_rate: Percent,
    total_contributions: Money,
    total_returned: Money,
    hurdle_rate: Percent,
) -> FundAdminResult<HurdleCarryCalc> {
    ensure_non_negative("total_contributions", total_contributions)?;
    ensure_non_negative("total_returned", total_returned)?;
    if hurdle_rate < Decimal::ZERO {
        return Err(FundAdminError::invalid(
            "hurdle_rate",
            "Hurdle rate cannot be negative",
        ));
    }
    let split = calculate_standard_carry(distribution, carry_rate)?;

    let hurdle_amount = pct_of(total_contributions, hurdle_rate)?;
    let hurdle_met = total_returned >= hurdle_amount;
    let (carry, lp) = if hurdle_met {
        (split.carry, split.lp)
    } else {
        (Decimal::ZERO, distribution)
    };

    Ok(HurdleCarryCalc {
        distribution,
        carry_rate,
        hurdle_rate,
        total_contributions,
        total_returned,
        hurdle_amount,
        hurdle_met,
        carry,
        lp,
    })
}

/// European carry on `total_profit = total_proceeds − total_contributions`.
/// With a hurdle, the carry base is `max(0, total_proceeds − hurdle_amount)`.
pub fn calculate_whole_fund_carry(
    total_proceeds: Money,
    total_contributions: Money,
    carry_rate: Percent,
    hurdle_rate: Option<Percent>,
) -> FundAdminResult<WholeFundCarryCalc> {
    ensure_non_negative("total_proceeds", total_proceeds)?;
    ensure_non_negative("total_contributions", total_contributions)?;
    ensure_percent("carry_rate", carry_rate)?;
    if let Some(rate) = hurdle_rate {
        if rate < Decimal::ZERO {
            return Err(FundAdminError::invalid(
                "hurdle_rate",
                "Hurdle rate cannot be negative",
            ));
        }
    }

    let total_profit = total_proceeds - total_contributions;
    let hurdle_amount = hurdle_rate
        .map(|rate| pct_of(total_contributions, rate))
        .transpose()?;
    let carry_base = if total_profit <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        match hurdle_amount {
            Some(amount) => (total_proceeds - amount).max(Decimal::ZERO),
            None => total_profit,
        }
    };

    let carry = pct_of(carry_base, carry_rate)?;
    Ok(WholeFundCarryCalc {
        total_proceeds,
        total_contributions,
        carry_rate,
        hurdle_rate,
        hurdle_amount,
        total_profit,
        carry_base,
        carry,
    })
}

/// Whole-fund carry earned to date, net of carry already paid, bounded by
/// the distribution at hand.
pub fn calculate_whole_fund_carry_for_distribution(
    distribution: Money,
    total_proceeds: Money,
    total_contributions: Money,
    carry_rate: Percent,
    hurdle_rate: Option<Percent>,
    carry_already_paid: Money,
) -> FundAdminResult<WholeFundDistributionCalc> {
    ensure_non_negative("distribution", distribution)?;
    ensure_non_negative("carry_already_paid", carry_already_paid)?;
    let whole_fund =
        calculate_whole_fund_carry(total_proceeds, total_contributions, carry_rate, hurdle_rate)?;

    let carry = (whole_fund.carry - carry_already_paid)
        .max(Decimal::ZERO)
        .min(distribution);
    Ok(WholeFundDistributionCalc {
        whole_fund,
        distribution,
        carry_already_paid,
        carry,
        lp: distribution - carry,
    })
}

/// American carry with catch-up in one pass: the catch-up consumes the
/// distribution first, the remainder splits at `carry_rate`.
pub fn calculate_american_carry(
    distribution: Money,
    cumulative_distributed: Money,
    carry_rate: Percent,
    current_gp_allocation_pct: Percent,
) -> FundAdminResult<AmericanCarryCalc> {
    let catch_up = calculate_catch_up(
        distribution,
        cumulative_distributed,
        carry_rate,
        current_gp_allocation_pct,
    )?;
    let split = calculate_standard_carry(distribution - catch_up.to_distribute, carry_rate)?;
    let gp_total = catch_up.to_distribute + split.carry;

    Ok(AmericanCarryCalc {
        distribution,
        lp_total: split.lp,
        catch_up,
        split,
        gp_total,
    })
}

/// Carry rate stepped by multiple of money: the highest threshold not above
/// `total_returned / total_contributions` sets the rate. No threshold met
/// means no carry.
pub fn calculate_multi_hurdle_carry(
    distribution: Money,
    total_contributions: Money,
    total_returned: Money,
    hurdle_tiers: &[HurdleTier],
) -> FundAdminResult<MultiHurdleCarryCalc> {
    ensure_non_negative("distribution", distribution)?;
    ensure_non_negative("total_returned", total_returned)?;
    if total_contributions <= Decimal::ZERO {
        return Err(FundAdminError::DivisionByZero {
            context: "multiple of money requires positive total contributions".into(),
        });
    }
    if hurdle_tiers.is_empty() {
        return Err(FundAdminError::invalid(
            "hurdle_tiers",
            "At least one hurdle tier is required",
        ));
    }
    for (i, tier) in hurdle_tiers.iter().enumerate() {
        ensure_percent("hurdle_tiers.carry_rate", tier.carry_rate)?;
        if tier.multiple_threshold < Decimal::ZERO {
            return Err(FundAdminError::invalid(
                "hurdle_tiers.multiple_threshold",
                "Thresholds cannot be negative",
            ));
        }
        if i > 0 && tier.multiple_threshold <= hurdle_tiers[i - 1].multiple_threshold {
            return Err(FundAdminError::invalid(
                "hurdle_tiers",
                "Thresholds must be sorted strictly ascending",
            ));
        }
    }

    let current_multiple = total_returned / total_contributions;
    let applied = hurdle_tiers
        .iter()
        .rev()
        .find(|t| t.multiple_threshold <= current_multiple);
    let applied_rate = applied.map(|t| t.carry_rate).unwrap_or(Decimal::ZERO);
    let carry = pct_of(distribution, applied_rate)?;

    Ok(MultiHurdleCarryCalc {
        distribution,
        hurdle_tiers: hurdle_tiers.to_vec(),
        total_contributions,
        total_returned,
        current_multiple,
        applied_threshold: applied.map(|t| t.multiple_threshold),
        applied_rate,
        carry,
        lp: distribution - carry,
    })
}

/// Windup clawback:
/// `correct = max(0, final_profit × rate/100)`,
/// `overdistribution = max(0, paid − correct)`, `net = paid − overdistribution`.
pub fn calculate_clawback(
    final_profit: Money,
    carry_rate: Percent,
    total_carry_paid: Money,
) -> FundAdminResult<ClawbackCalc> {
    ensure_percent("carry_rate", carry_rate)?;
    ensure_non_negative("total_carry_paid", total_carry_paid)?;

    let correct_carry = pct_of(final_profit, carry_rate)?.max(Decimal::ZERO);
    let overdistribution = (total_carry_paid - correct_carry).max(Decimal::ZERO);
    Ok(ClawbackCalc {
        final_profit,
        carry_rate,
        total_carry_paid,
        correct_carry,
        overdistribution,
        net_carry: total_carry_paid - overdistribution,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn hurdles() -> Vec<HurdleTier> {
        vec![
            HurdleTier {
                multiple_threshold: dec!(1.0),
                carry_rate: dec!(10),
            },
            HurdleTier {
                multiple_threshold: dec!(2.0),
                carry_rate: dec!(20),
            },
            HurdleTier {
                multiple_threshold: dec!(3.0),
                carry_rate: dec!(30),
            },
        ]
    }

    #[test]
    fn test_standard_eighty_twenty() {
        let split = calculate_standard_carry(dec!(100000), dec!(20)).unwrap();
        assert_eq!(split.carry, dec!(20000));
        assert_eq!(split.lp, dec!(80000));
    }

    #[test]
    fn test_hurdle_unmet_sends_all_to_lp() {
        let calc = calculate_hurdle_carry(
            dec!(100000),
            dec!(20),
            dec!(1000000),
            dec!(1050000),
            dec!(110),
        )
        .unwrap();
        assert!(!calc.hurdle_met);
        assert_eq!(calc.hurdle_amount, dec!(1100000));
        assert_eq!(calc.carry, Decimal::ZERO);
        assert_eq!(calc.lp, dec!(100000));
    }

    #[test]
    fn test_hurdle_met_exactly() {
        let calc = calculate_hurdle_carry(
            dec!(100000),
            dec!(20),
            dec!(1000000),
            dec!(1100000),
            dec!(110),
        )
        .unwrap();
        assert!(calc.hurdle_met);
        assert_eq!(calc.carry, dec!(20000));
    }

    #[test]
    fn test_whole_fund_no_profit_no_carry() {
        let calc = calculate_whole_fund_carry(dec!(900), dec!(1000), dec!(20), None).unwrap();
        assert_eq!(calc.total_profit, dec!(-100));
        assert_eq!(calc.carry, Decimal::ZERO);
    }

    #[test]
    fn test_whole_fund_with_and_without_hurdle() {
        let plain = calculate_whole_fund_carry(dec!(1500), dec!(1000), dec!(20), None).unwrap();
        assert_eq!(plain.carry_base, dec!(500));
        assert_eq!(plain.carry, dec!(100));

        let hurdled =
            calculate_whole_fund_carry(dec!(1500), dec!(1000), dec!(20), Some(dec!(108))).unwrap();
        assert_eq!(hurdled.hurdle_amount, Some(dec!(1080)));
        assert_eq!(hurdled.carry_base, dec!(420));
        assert_eq!(hurdled.carry, dec!(84));
    }

    #[test]
    fn test_whole_fund_distribution_nets_prior_carry() {
        let calc = calculate_whole_fund_carry_for_distribution(
            dec!(200),
            dec!(1500),
            dec!(1000),
            dec!(20),
            None,
            dec!(60),
        )
        .unwrap();
        assert_eq!(calc.carry, dec!(40));
        assert_eq!(calc.lp, dec!(160));

        let capped = calculate_whole_fund_carry_for_distribution(
            dec!(10),
            dec!(1500),
            dec!(1000),
            dec!(20),
            None,
            dec!(0),
        )
        .unwrap();
        assert_eq!(capped.carry, dec!(10));
        assert_eq!(capped.lp, dec!(0));
    }

    #[test]
    fn test_american_catch_up_then_split() {
        // cumulative 500k, GP at 16% -> needs 20k, remaining 80k splits 80/20
        let calc = calculate_american_carry(dec!(100000), dec!(500000), dec!(20), dec!(16)).unwrap();
        assert_eq!(calc.catch_up.to_distribute, dec!(20000));
        assert_eq!(calc.split.distribution, dec!(80000));
        assert_eq!(calc.split.carry, dec!(16000));
        assert_eq!(calc.gp_total, dec!(36000));
        assert_eq!(calc.lp_total, dec!(64000));
        assert_eq!(calc.gp_total + calc.lp_total, dec!(100000));
    }

    #[test]
    fn test_multi_hurdle_selects_highest_met() {
        let calc =
            calculate_multi_hurdle_carry(dec!(1000), dec!(1000), dec!(2500), &hurdles()).unwrap();
        assert_eq!(calc.current_multiple, dec!(2.5));
        assert_eq!(calc.applied_threshold, Some(dec!(2.0)));
        assert_eq!(calc.applied_rate, dec!(20));
        assert_eq!(calc.carry, dec!(200));
        assert_eq!(calc.lp, dec!(800));
    }

    #[test]
    fn test_multi_hurdle_none_met() {
        let calc =
            calculate_multi_hurdle_carry(dec!(1000), dec!(1000), dec!(900), &hurdles()).unwrap();
        assert_eq!(calc.applied_threshold, None);
        assert_eq!(calc.carry, Decimal::ZERO);
        assert_eq!(calc.lp, dec!(1000));
    }

    #[test]
    fn test_multi_hurdle_rejects_unsorted_and_zero_contributions() {
        let mut unsorted = hurdles();
        unsorted.swap(0, 2);
        assert!(calculate_multi_hurdle_carry(dec!(1), dec!(1), dec!(1), &unsorted).is_err());
        assert!(matches!(
            calculate_multi_hurdle_carry(dec!(1), dec!(0), dec!(1), &hurdles()),
            Err(FundAdminError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_clawback_overdistribution() {
        let calc = calculate_clawback(dec!(1000000), dec!(20), dec!(260000)).unwrap();
        assert_eq!(calc.correct_carry, dec!(200000));
        assert_eq!(calc.overdistribution, dec!(60000));
        assert_eq!(calc.net_carry, dec!(200000));
    }

    #[test]
    fn test_clawback_loss_making_fund_returns_all_carry() {
        let calc = calculate_clawback(dec!(-50000), dec!(20), dec!(15000)).unwrap();
        assert_eq!(calc.correct_carry, Decimal::ZERO);
        assert_eq!(calc.overdistribution, dec!(15000));
        assert_eq!(calc.net_carry, Decimal::ZERO);
    }

    #[test]
    fn test_clawback_underpaid_gp() {
        let calc = calculate_clawback(dec!(1000000), dec!(20), dec!(150000)).unwrap();
        assert_eq!(calc.overdistribution, Decimal::ZERO);
        assert_eq!(calc.net_carry, dec!(150000));
    }

    #[test]
    fn test_carry_calc_accessors() {
        let calc = CarryCalc::Standard(calculate_standard_carry(dec!(500), dec!(20)).unwrap());
        assert_eq!(calc.gp_amount() + calc.lp_amount(), dec!(500));
    }
}
