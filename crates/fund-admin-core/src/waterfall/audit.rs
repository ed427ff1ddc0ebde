use serde::{Deserialize, Serialize};

use crate::calculators::capital::ReturnOfCapitalCalc;
use crate::calculators::carried_interest::{CarryCalc, ClawbackCalc};
use crate::calculators::catch_up::CatchUpCalc;
use crate::calculators::preferred_return::{AccrualMethod, PreferredReturnCalc};
use crate::config::AllocationBasis;
use crate::types::Money;
use crate::waterfall::tiers::TierDefinition;

/// Identifier of the formula a trace was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaId {
    ReturnOfCapital,
    PreferredReturnSimple,
    PreferredReturnMultiPeriod,
    PreferredReturnCompound,
    CatchUp,
    CarryStandard,
    CarryHurdleGated,
    CarryWholeFund,
    CarryAmericanCatchUp,
    CarryMultiHurdle,
    Clawback,
    ProRataAllocation,
    TierSkipped,
}

/// Pro-rata spread of one tier across commitments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTrace {
    pub basis: AllocationBasis,
    pub lp_amount: Money,
    pub gp_amount: Money,
    pub total_weight: Money,
    pub lp_event_count: usize,
    pub rounding_remainder: Money,
    /// Investor absorbing the rounding remainder
    pub remainder_investor_id: Option<String>,
}

/// Closed set of trace payloads; one shape per step kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationTrace {
    ReturnOfCapital(ReturnOfCapitalCalc),
    PreferredReturn(PreferredReturnCalc),
    CatchUp(CatchUpCalc),
    CarriedInterest(CarryCalc),
    Clawback(ClawbackCalc),
    Allocation(AllocationTrace),
    TierSkipped { available: Money },
}

impl CalculationTrace {
    pub fn formula(&self) -> FormulaId {
        match self {
            CalculationTrace::ReturnOfCapital(_) => FormulaId::ReturnOfCapital,
            CalculationTrace::PreferredReturn(calc) => match calc.method {
                AccrualMethod::SimpleDaily => FormulaId::PreferredReturnSimple,
                AccrualMethod::MultiPeriod => FormulaId::PreferredReturnMultiPeriod,
                AccrualMethod::Compound { .. } => FormulaId::PreferredReturnCompound,
            },
            CalculationTrace::CatchUp(_) => FormulaId::CatchUp,
            CalculationTrace::CarriedInterest(calc) => match calc {
                CarryCalc::Standard(_) => FormulaId::CarryStandard,
                CarryCalc::HurdleGated(_) => FormulaId::CarryHurdleGated,
                CarryCalc::WholeFund(_) => FormulaId::CarryWholeFund,
                CarryCalc::AmericanWithCatchUp(_) => FormulaId::CarryAmericanCatchUp,
                CarryCalc::MultiHurdle(_) => FormulaId::CarryMultiHurdle,
            },
            CalculationTrace::Clawback(_) => FormulaId::Clawback,
            CalculationTrace::Allocation(_) => FormulaId::ProRataAllocation,
            CalculationTrace::TierSkipped { .. } => FormulaId::TierSkipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub step_number: u32,
    pub tier_level: Option<u32>,
    pub tier_name: Option<String>,
    pub formula: FormulaId,
    pub trace: CalculationTrace,
}

/// Append-only log of calculation steps. Entries can be added and read but
/// never edited or removed.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, numbering it after the last one.
    pub fn record(&mut self, tier: Option<&TierDefinition>, trace: CalculationTrace) -> u32 {
        let step_number = self.entries.len() as u32 + 1;
        self.entries.push(AuditEntry {
            step_number,
            tier_level: tier.map(|t| t.level),
            tier_name: tier.map(|t| t.name.clone()),
            formula: trace.formula(),
            trace,
        });
        step_number
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::catch_up::calculate_catch_up;
    use crate::calculators::preferred_return::calculate_preferred_return;
    use rust_decimal_macros::dec;

    #[test]
    fn test_steps_number_sequentially() {
        let mut trail = AuditTrail::new();
        let pref =
            calculate_preferred_return(dec!(1000), dec!(8), 365, dec!(0), dec!(1000)).unwrap();
        let catch_up = calculate_catch_up(dec!(10), dec!(100), dec!(20), dec!(0)).unwrap();
        assert_eq!(trail.record(None, CalculationTrace::PreferredReturn(pref)), 1);
        assert_eq!(trail.record(None, CalculationTrace::CatchUp(catch_up)), 2);

        let entries = trail.into_entries();
        assert_eq!(entries[0].formula, FormulaId::PreferredReturnSimple);
        assert_eq!(entries[1].formula, FormulaId::CatchUp);
    }

    #[test]
    fn test_trace_serializes_with_kind_tag() {
        let trace = CalculationTrace::TierSkipped {
            available: dec!(0),
        };
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["kind"], "tier_skipped");
        assert_eq!(json["available"], "0");
    }
}
