use log::debug;
use rust_decimal::Decimal;

use crate::config::AllocationBasis;
use crate::error::FundAdminError;
use crate::fund::Commitment;
use crate::types::*;
use crate::waterfall::audit::{AllocationTrace, AuditTrail, CalculationTrace};
use crate::waterfall::calculation::{DistributionEvent, EventType, PaymentStatus, Recipient};
use crate::waterfall::tiers::{TierDefinition, TierResult};
use crate::FundAdminResult;

fn weight(commitment: &Commitment, basis: AllocationBasis) -> Money {
    match basis {
        AllocationBasis::Commitment => commitment.commitment_amount,
        AllocationBasis::CalledCapital => commitment.capital_called,
        AllocationBasis::UnreturnedCapital => commitment.unreturned_capital(),
    }
}

/// Index of the commitment that absorbs the rounding remainder: largest
/// weight, ties broken by lowest investor id then commitment id.
fn remainder_holder(commitments: &[Commitment], weights: &[Money]) -> Option<usize> {
    (0..commitments.len()).max_by(|&a, &b| {
        weights[a]
            .cmp(&weights[b])
            .then_with(|| commitments[b].investor_id.cmp(&commitments[a].investor_id))
            .then_with(|| commitments[b].commitment_id.cmp(&commitments[a].commitment_id))
    })
}

fn lp_event(
    tier: &TierResult,
    commitment: &Commitment,
    amount: Money,
    scale: u32,
) -> FundAdminResult<DistributionEvent> {
    let withholding_amount = match commitment.withholding_rate_pct {
        Some(rate) => round_money(pct_of(amount, rate)?, scale).min(amount),
        None => Decimal::ZERO,
    };
    Ok(DistributionEvent {
        investor_id: commitment.investor_id.clone(),
        commitment_id: Some(commitment.commitment_id.clone()),
        tier_level: tier.level,
        recipient: Recipient::Lp,
        event_type: EventType::for_tier(tier.tier_type, false),
        amount,
        withholding_amount,
        net_amount: amount - withholding_amount,
        payment_status: PaymentStatus::Pending,
    })
}

/// Spread one executed tier over the fund's commitments.
///
/// The LP amount is shared pro rata by `basis` weight, each share floored to
/// `scale`; whatever the floors leave goes to the largest holder so the
/// events always sum to the tier's LP amount. The GP amount becomes a single
/// event for `gp_investor_id`. Zero-amount events are not emitted.
pub fn allocate_tier(
    tier: &TierResult,
    commitments: &[Commitment],
    gp_investor_id: &str,
    basis: AllocationBasis,
    scale: u32,
) -> FundAdminResult<(Vec<DistributionEvent>, AllocationTrace)> {
    ensure_non_negative("tier.lp_amount", tier.lp_amount)?;
    ensure_non_negative("tier.gp_amount", tier.gp_amount)?;

    let weights: Vec<Money> = commitments
        .iter()
        .map(|c| weight(c, basis).max(Decimal::ZERO))
        .collect();
    let total_weight: Money = weights.iter().copied().sum();

    let mut events = Vec::new();
    let mut rounding_remainder = Decimal::ZERO;
    let mut remainder_investor_id = None;

    if tier.lp_amount > Decimal::ZERO {
        if total_weight <= Decimal::ZERO {
            return Err(FundAdminError::invalid(
                "commitments",
                format!(
                    "Tier {} has an LP amount of {} but no commitment carries {:?} weight",
                    tier.level, tier.lp_amount, basis
                ),
            ));
        }

        let mut shares = weights
            .iter()
            .map(|w| {
                tier.lp_amount
                    .checked_mul(*w)
                    .map(|product| floor_money(product / total_weight, scale))
                    .ok_or_else(|| overflow("tier.lp_amount"))
            })
            .collect::<FundAdminResult<Vec<Money>>>()?;
        rounding_remainder = tier.lp_amount - shares.iter().copied().sum::<Money>();
        if !rounding_remainder.is_zero() {
            if let Some(idx) = remainder_holder(commitments, &weights) {
                shares[idx] += rounding_remainder;
                remainder_investor_id = Some(commitments[idx].investor_id.clone());
            }
        }

        for (commitment, share) in commitments.iter().zip(shares) {
            if share > Decimal::ZERO {
                events.push(lp_event(tier, commitment, share, scale)?);
            }
        }
    }
    let lp_event_count = events.len();

    if tier.gp_amount > Decimal::ZERO {
        events.push(DistributionEvent {
            investor_id: gp_investor_id.to_string(),
            commitment_id: None,
            tier_level: tier.level,
            recipient: Recipient::Gp,
            event_type: EventType::for_tier(tier.tier_type, true),
            amount: tier.gp_amount,
            withholding_amount: Decimal::ZERO,
            net_amount: tier.gp_amount,
            payment_status: PaymentStatus::Pending,
        });
    }

    debug!(
        "tier {} allocated: {} LP events, remainder {} to {:?}",
        tier.level, lp_event_count, rounding_remainder, remainder_investor_id
    );

    Ok((
        events,
        AllocationTrace {
            basis,
            lp_amount: tier.lp_amount,
            gp_amount: tier.gp_amount,
            total_weight,
            lp_event_count,
            rounding_remainder,
            remainder_investor_id,
        },
    ))
}

/// Allocate every executed tier, recording one audit entry per tier.
pub fn allocate_tiers(
    tiers: &[TierResult],
    commitments: &[Commitment],
    gp_investor_id: &str,
    basis: AllocationBasis,
    scale: u32,
    audit: &mut AuditTrail,
) -> FundAdminResult<Vec<DistributionEvent>> {
    let mut events = Vec::new();
    for tier in tiers.iter().filter(|t| t.executed) {
        let (tier_events, trace) = allocate_tier(tier, commitments, gp_investor_id, basis, scale)?;
        let def = TierDefinition {
            level: tier.level,
            name: tier.name.clone(),
            tier_type: tier.tier_type,
            lp_allocation_pct: tier.lp_allocation_pct,
            gp_allocation_pct: tier.gp_allocation_pct,
        };
        audit.record(Some(&def), CalculationTrace::Allocation(trace));
        events.extend(tier_events);
    }
    Ok(events)
}
