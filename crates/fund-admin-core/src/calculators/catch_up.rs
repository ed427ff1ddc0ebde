use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::FundAdminResult;

/// Trace of a GP catch-up computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchUpCalc {
    pub available: Money,
    pub cumulative_distributed: Money,
    pub carry_rate: Percent,
    pub current_gp_allocation_pct: Percent,
    pub target_gp: Money,
    pub current_gp: Money,
    pub needed: Money,
    /// GP percentage of what the catch-up pays out
    #[serde(default = "full_share")]
    pub gp_share_pct: Percent,
    pub to_distribute: Money,
}

fn full_share() -> Percent {
    HUNDRED
}

/// GP catch-up toward its target share of cumulative distributions.
///
/// `target_gp = cumulative × carry_rate/100`,
/// `current_gp = cumulative × current_gp_allocation_pct/100`,
/// `needed = max(0, target_gp − current_gp)`,
/// `to_distribute = min(available, needed)`.
pub fn calculate_catch_up(
    available: Money,
    cumulative_distributed: Money,
    carry_rate: Percent,
    current_gp_allocation_pct: Percent,
) -> FundAdminResult<CatchUpCalc> {
    ensure_non_negative("available", available)?;
    ensure_non_negative("cumulative_distributed", cumulative_distributed)?;
    ensure_percent("carry_rate", carry_rate)?;
    ensure_percent("current_gp_allocation_pct", current_gp_allocation_pct)?;

    let target_gp = pct_of(cumulative_distributed, carry_rate)?;
    let current_gp = pct_of(cumulative_distributed, current_gp_allocation_pct)?;
    let needed = (target_gp - current_gp).max(Decimal::ZERO);

    Ok(CatchUpCalc {
        available,
        cumulative_distributed,
        carry_rate,
        current_gp_allocation_pct,
        target_gp,
        current_gp,
        needed,
        gp_share_pct: HUNDRED,
        to_distribute: available.min(needed),
    })
}

/// Catch-up paid through a tier that gives the GP only `gp_share_pct` of
/// what it distributes. The payout is grossed up to `needed × 100 /
/// gp_share_pct` so the GP's part of it covers `needed`. A tier that pays
/// the GP nothing is not grossed up.
pub fn calculate_tier_catch_up(
    available: Money,
    cumulative_distributed: Money,
    carry_rate: Percent,
    current_gp_allocation_pct: Percent,
    gp_share_pct: Percent,
) -> FundAdminResult<CatchUpCalc> {
    ensure_percent("gp_share_pct", gp_share_pct)?;
    let mut calc = calculate_catch_up(
        available,
        cumulative_distributed,
        carry_rate,
        current_gp_allocation_pct,
    )?;
    if gp_share_pct > Decimal::ZERO && gp_share_pct < HUNDRED {
        let gross = calc
            .needed
            .checked_mul(HUNDRED)
            .map(|scaled| scaled / gp_share_pct)
            .ok_or_else(|| overflow("cumulative_distributed"))?;
        calc.gp_share_pct = gp_share_pct;
        calc.to_distribute = available.min(gross);
    }
    Ok(calc)
}

/// GP share of cumulative distributions so far, as a percentage.
pub fn gp_allocation_pct(gp_received: Money, cumulative_distributed: Money) -> Percent {
    if cumulative_distributed <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    // Overflow only happens when the GP share dwarfs the total; cap at 100.
    gp_received
        .checked_mul(HUNDRED)
        .and_then(|scaled| scaled.checked_div(cumulative_distributed))
        .unwrap_or(HUNDRED)
        .max(Decimal::ZERO)
        .min(HUNDRED)
}
