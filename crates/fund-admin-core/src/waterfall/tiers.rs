use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::fund::terms::{CarryMethod, FundTerms};
use crate::types::*;
use crate::FundAdminResult;

/// Distribution mechanics of a waterfall tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierType {
    ReturnOfCapital,
    PreferredReturn,
    CatchUp,
    CarriedInterest,
}

/// A configured tier. Tiers run in ascending `level` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub level: u32,
    pub name: String,
    pub tier_type: TierType,
    pub lp_allocation_pct: Percent,
    pub gp_allocation_pct: Percent,
}

/// Outcome of one tier within a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    pub level: u32,
    pub name: String,
    pub tier_type: TierType,
    pub lp_allocation_pct: Percent,
    pub gp_allocation_pct: Percent,
    /// Amount handed to this tier by the previous one
    pub available_amount: Money,
    pub distributed_amount: Money,
    pub remaining_amount: Money,
    pub lp_amount: Money,
    pub gp_amount: Money,
    /// False when the waterfall was exhausted before reaching this tier
    pub executed: bool,
}

impl TierResult {
    pub fn untouched(def: &TierDefinition, available: Money) -> Self {
        TierResult {
            level: def.level,
            name: def.name.clone(),
            tier_type: def.tier_type,
            lp_allocation_pct: def.lp_allocation_pct,
            gp_allocation_pct: def.gp_allocation_pct,
            available_amount: available,
            distributed_amount: Decimal::ZERO,
            remaining_amount: available,
            lp_amount: Decimal::ZERO,
            gp_amount: Decimal::ZERO,
            executed: false,
        }
    }
}

/// Standard topology absent a custom configuration:
/// return of capital, preferred return, GP catch-up, carried interest split.
///
/// Funds on American carry fold the catch-up into the carry tier, so the
/// separate catch-up tier is omitted.
pub fn default_tiers(terms: &FundTerms) -> Vec<TierDefinition> {
    let carry = terms.carried_interest_rate;
    let mut tiers = vec![
        TierDefinition {
            level: 1,
            name: "Return of Capital".into(),
            tier_type: TierType::ReturnOfCapital,
            lp_allocation_pct: dec!(100),
            gp_allocation_pct: dec!(0),
        },
        TierDefinition {
            level: 2,
            name: "Preferred Return".into(),
            tier_type: TierType::PreferredReturn,
            lp_allocation_pct: dec!(100),
            gp_allocation_pct: dec!(0),
        },
    ];
    if terms.carry_method != CarryMethod::AmericanWithCatchUp {
        tiers.push(TierDefinition {
            level: 3,
            name: "GP Catch-Up".into(),
            tier_type: TierType::CatchUp,
            lp_allocation_pct: HUNDRED - terms.catch_up_pct,
            gp_allocation_pct: terms.catch_up_pct,
        });
    }
    tiers.push(TierDefinition {
        level: 4,
        name: "Carried Interest Split".into(),
        tier_type: TierType::CarriedInterest,
        lp_allocation_pct: HUNDRED - carry,
        gp_allocation_pct: carry,
    });
    tiers
}

/// Structural checks run before any tier executes: a non-empty list with
/// strictly increasing levels and percentages within range. The lp+gp=100
/// rule is left to the validator so it is reported rather than thrown.
pub fn check_tier_definitions(tiers: &[TierDefinition]) -> FundAdminResult<()> {
    if tiers.is_empty() {
        return Err(FundAdminError::invalid(
            "tiers",
            "At least one waterfall tier is required",
        ));
    }
    for (i, tier) in tiers.iter().enumerate() {
        ensure_percent("tiers.lp_allocation_pct", tier.lp_allocation_pct)?;
        ensure_percent("tiers.gp_allocation_pct", tier.gp_allocation_pct)?;
        if i > 0 && tier.level <= tiers[i - 1].level {
            return Err(FundAdminError::invalid(
                "tiers.level",
                format!(
                    "Tier levels must be strictly increasing ({} follows {})",
                    tier.level,
                    tiers[i - 1].level
                ),
            ));
        }
    }
    Ok(())
}
