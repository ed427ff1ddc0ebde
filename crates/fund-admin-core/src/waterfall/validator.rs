use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::waterfall::audit::AuditEntry;
use crate::waterfall::calculation::{DistributionEvent, Recipient, WaterfallCalculation};
use crate::waterfall::tiers::{TierResult, TierType};

/// Which invariant an issue was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    TotalDistributed,
    AllocationPercentages,
    TierOrdering,
    TierArithmetic,
    EventReconciliation,
    NegativeAmount,
    AuditSequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub check: ValidationCheck,
    pub tier_level: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}

/// Collects issues in check order so two runs over the same input produce
/// identical reports.
struct Checker {
    errors: Vec<ValidationIssue>,
    warnings: Vec<String>,
}

impl Checker {
    fn fail(&mut self, check: ValidationCheck, tier_level: Option<u32>, message: String) {
        self.errors.push(ValidationIssue {
            check,
            tier_level,
            message,
        });
    }

    fn non_negative(&mut self, tier_level: Option<u32>, what: &str, value: Money) {
        if value < Decimal::ZERO {
            self.fail(
                ValidationCheck::NegativeAmount,
                tier_level,
                format!("{what} is negative ({value})"),
            );
        }
    }
}

/// Run every post-calculation invariant check over a calculation's parts.
///
/// - tier distributions sum to at most the total, and exactly to it when a
///   carried-interest tier makes the waterfall exhaustive;
/// - each tier's LP and GP percentages sum to 100 within `pct_tolerance`;
/// - each tier's events sum to its distributed amount, by recipient;
/// - no amount anywhere is negative.
///
/// Also checks tier arithmetic, level ordering and audit step numbering.
pub fn validate_parts(
    total_distribution: Money,
    tiers: &[TierResult],
    events: &[DistributionEvent],
    audit_log: &[AuditEntry],
    pct_tolerance: Percent,
) -> ValidationReport {
    let mut c = Checker {
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    c.non_negative(None, "Total distribution", total_distribution);

    // (a) total distributed
    let distributed: Money = tiers.iter().map(|t| t.distributed_amount).sum();
    let exhaustive = tiers
        .iter()
        .any(|t| t.tier_type == TierType::CarriedInterest);
    if distributed > total_distribution {
        c.fail(
            ValidationCheck::TotalDistributed,
            None,
            format!(
                "Tiers distribute {distributed}, more than the total distribution of {total_distribution}"
            ),
        );
    } else if exhaustive && distributed != total_distribution {
        c.fail(
            ValidationCheck::TotalDistributed,
            None,
            format!(
                "Tiers distribute {distributed} of {total_distribution} although the carried interest tier should exhaust the waterfall"
            ),
        );
    } else if distributed < total_distribution {
        c.warnings.push(format!(
            "{} of the distribution is not allocated by any tier",
            total_distribution - distributed
        ));
    }

    for (i, tier) in tiers.iter().enumerate() {
        let level = Some(tier.level);

        // (b) allocation percentages
        let pct_sum = tier.lp_allocation_pct + tier.gp_allocation_pct;
        if (pct_sum - HUNDRED).abs() > pct_tolerance {
            c.fail(
                ValidationCheck::AllocationPercentages,
                level,
                format!(
                    "Tier {} ({}): LP {}% + GP {}% = {}%, expected 100%",
                    tier.level, tier.name, tier.lp_allocation_pct, tier.gp_allocation_pct, pct_sum
                ),
            );
        }

        if i > 0 && tier.level <= tiers[i - 1].level {
            c.fail(
                ValidationCheck::TierOrdering,
                level,
                format!(
                    "Tier level {} does not follow {} in ascending order",
                    tier.level,
                    tiers[i - 1].level
                ),
            );
        }

        if tier.distributed_amount > tier.available_amount {
            c.fail(
                ValidationCheck::TierArithmetic,
                level,
                format!(
                    "Tier {} distributes {} but only {} was available",
                    tier.level, tier.distributed_amount, tier.available_amount
                ),
            );
        }
        if tier.available_amount - tier.distributed_amount != tier.remaining_amount {
            c.fail(
                ValidationCheck::TierArithmetic,
                level,
                format!(
                    "Tier {} remaining {} does not equal available {} less distributed {}",
                    tier.level, tier.remaining_amount, tier.available_amount, tier.distributed_amount
                ),
            );
        }
        if tier.lp_amount + tier.gp_amount != tier.distributed_amount {
            c.fail(
                ValidationCheck::TierArithmetic,
                level,
                format!(
                    "Tier {} LP {} + GP {} does not equal distributed {}",
                    tier.level, tier.lp_amount, tier.gp_amount, tier.distributed_amount
                ),
            );
        }

        // (d) negatives on the tier
        c.non_negative(level, "Available amount", tier.available_amount);
        c.non_negative(level, "Distributed amount", tier.distributed_amount);
        c.non_negative(level, "Remaining amount", tier.remaining_amount);
        c.non_negative(level, "LP amount", tier.lp_amount);
        c.non_negative(level, "GP amount", tier.gp_amount);
    }

    // (c) event reconciliation
    let mut by_tier: BTreeMap<u32, (Money, Money)> = BTreeMap::new();
    for event in events {
        let level = Some(event.tier_level);
        c.non_negative(level, "Event amount", event.amount);
        c.non_negative(level, "Withholding amount", event.withholding_amount);
        c.non_negative(level, "Net amount", event.net_amount);
        if event.amount - event.withholding_amount != event.net_amount {
            c.fail(
                ValidationCheck::EventReconciliation,
                level,
                format!(
                    "Event for {} nets to {} but gross {} less withholding {} is {}",
                    event.investor_id,
                    event.net_amount,
                    event.amount,
                    event.withholding_amount,
                    event.amount - event.withholding_amount
                ),
            );
        }
        let sums = by_tier.entry(event.tier_level).or_default();
        match event.recipient {
            Recipient::Lp => sums.0 += event.amount,
            Recipient::Gp => sums.1 += event.amount,
        }
    }
    for tier in tiers {
        let (lp, gp) = by_tier.remove(&tier.level).unwrap_or_default();
        if lp + gp != tier.distributed_amount {
            c.fail(
                ValidationCheck::EventReconciliation,
                Some(tier.level),
                format!(
                    "Tier {} events sum to {} but the tier distributed {}",
                    tier.level,
                    lp + gp,
                    tier.distributed_amount
                ),
            );
        } else if lp != tier.lp_amount || gp != tier.gp_amount {
            c.fail(
                ValidationCheck::EventReconciliation,
                Some(tier.level),
                format!(
                    "Tier {} events split LP {} / GP {} but the tier split LP {} / GP {}",
                    tier.level, lp, gp, tier.lp_amount, tier.gp_amount
                ),
            );
        }
    }
    for level in by_tier.keys() {
        c.fail(
            ValidationCheck::EventReconciliation,
            Some(*level),
            format!("Events reference tier {level}, which is not part of the calculation"),
        );
    }

    for (i, entry) in audit_log.iter().enumerate() {
        let expected = i as u32 + 1;
        if entry.step_number != expected {
            c.fail(
                ValidationCheck::AuditSequence,
                entry.tier_level,
                format!(
                    "Audit step {} found where step {} was expected",
                    entry.step_number, expected
                ),
            );
            break;
        }
    }

    ValidationReport {
        is_valid: c.errors.is_empty(),
        errors: c.errors,
        warnings: c.warnings,
    }
}

pub fn validate_calculation(calc: &WaterfallCalculation, pct_tolerance: Percent) -> ValidationReport {
    validate_parts(
        calc.total_distribution,
        &calc.tiers,
        &calc.events,
        &calc.audit_log,
        pct_tolerance,
    )
}
