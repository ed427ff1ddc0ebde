use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::fund::FundSnapshot;
use crate::types::*;
use crate::waterfall::audit::AuditEntry;
use crate::waterfall::tiers::{TierResult, TierType};
use crate::waterfall::validator::ValidationReport;
use crate::FundAdminResult;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    #[default]
    Distribution,
    Hypothetical,
    IrrAnalysis,
}

impl fmt::Display for CalculationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalculationType::Distribution => "distribution",
            CalculationType::Hypothetical => "hypothetical",
            CalculationType::IrrAnalysis => "irr_analysis",
        };
        f.write_str(s)
    }
}

/// `draft → calculated → approved → distributed`, forward only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    #[default]
    Draft,
    Calculated,
    Approved,
    Distributed,
}

impl CalculationStatus {
    /// The only status this one may move to.
    pub fn next(self) -> Option<CalculationStatus> {
        match self {
            CalculationStatus::Draft => Some(CalculationStatus::Calculated),
            CalculationStatus::Calculated => Some(CalculationStatus::Approved),
            CalculationStatus::Approved => Some(CalculationStatus::Distributed),
            CalculationStatus::Distributed => None,
        }
    }

    pub fn ensure_transition(self, id: u64, to: CalculationStatus) -> FundAdminResult<()> {
        if self.next() == Some(to) {
            return Ok(());
        }
        let expected = match to {
            CalculationStatus::Draft => "none (draft is initial)".to_string(),
            CalculationStatus::Calculated => CalculationStatus::Draft.to_string(),
            CalculationStatus::Approved => CalculationStatus::Calculated.to_string(),
            CalculationStatus::Distributed => CalculationStatus::Approved.to_string(),
        };
        Err(FundAdminError::StateConflict {
            id,
            expected,
            actual: self.to_string(),
        })
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalculationStatus::Draft => "draft",
            CalculationStatus::Calculated => "calculated",
            CalculationStatus::Approved => "approved",
            CalculationStatus::Distributed => "distributed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Distribution events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ReturnOfCapital,
    PreferredReturn,
    CatchUp,
    /// GP share of the carry tier
    CarriedInterest,
    /// LP share of the carry tier
    ProfitShare,
}

impl EventType {
    pub fn for_tier(tier_type: TierType, to_gp: bool) -> EventType {
        match tier_type {
            TierType::ReturnOfCapital => EventType::ReturnOfCapital,
            TierType::PreferredReturn => EventType::PreferredReturn,
            TierType::CatchUp => EventType::CatchUp,
            TierType::CarriedInterest if to_gp => EventType::CarriedInterest,
            TierType::CarriedInterest => EventType::ProfitShare,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Lp,
    Gp,
}

/// One payment line of a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEvent {
    pub investor_id: String,
    /// None for the GP event
    pub commitment_id: Option<String>,
    pub tier_level: u32,
    pub recipient: Recipient,
    pub event_type: EventType,
    /// Gross amount; the per-tier reconciliation is on this figure
    pub amount: Money,
    pub withholding_amount: Money,
    pub net_amount: Money,
    pub payment_status: PaymentStatus,
}

/// Per-investor totals across every event of one calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorSummary {
    pub investor_id: String,
    pub return_of_capital: Money,
    pub preferred_return: Money,
    pub catch_up: Money,
    pub carried_interest: Money,
    pub profit_share: Money,
    pub gross_total: Money,
    pub withholding: Money,
    pub net_total: Money,
}

pub fn summarize_investors(events: &[DistributionEvent]) -> BTreeMap<String, InvestorSummary> {
    let mut summaries: BTreeMap<String, InvestorSummary> = BTreeMap::new();
    for event in events {
        let summary = summaries
            .entry(event.investor_id.clone())
            .or_insert_with(|| InvestorSummary {
                investor_id: event.investor_id.clone(),
                ..InvestorSummary::default()
            });
        let bucket = match event.event_type {
            EventType::ReturnOfCapital => &mut summary.return_of_capital,
            EventType::PreferredReturn => &mut summary.preferred_return,
            EventType::CatchUp => &mut summary.catch_up,
            EventType::CarriedInterest => &mut summary.carried_interest,
            EventType::ProfitShare => &mut summary.profit_share,
        };
        *bucket += event.amount;
        summary.gross_total += event.amount;
        summary.withholding += event.withholding_amount;
        summary.net_total += event.net_amount;
    }
    summaries
}

// ---------------------------------------------------------------------------
// IRR analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrAnalysis {
    /// LP net IRR in percent; None when it could not be computed
    pub lp_net_irr: Option<Percent>,
    pub lp_multiple: Option<Multiple>,
    pub total_contributed: Money,
    pub total_lp_distributions: Money,
}

// ---------------------------------------------------------------------------
// Calculation record
// ---------------------------------------------------------------------------

/// Header of a calculation as handed to the store; the store assigns the id
/// and the record starts in `draft`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalculation {
    pub fund_id: String,
    pub calculation_type: CalculationType,
    pub distribution_date: NaiveDate,
    pub total_distribution: Money,
    pub snapshot: FundSnapshot,
    pub investor_summaries: BTreeMap<String, InvestorSummary>,
    pub warnings: Vec<String>,
    pub irr: Option<IrrAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallCalculation {
    pub id: u64,
    pub fund_id: String,
    pub calculation_type: CalculationType,
    pub distribution_date: NaiveDate,
    pub total_distribution: Money,
    pub status: CalculationStatus,
    pub snapshot: FundSnapshot,
    pub tiers: Vec<TierResult>,
    pub events: Vec<DistributionEvent>,
    pub audit_log: Vec<AuditEntry>,
    /// Latest validator outcome
    pub validation: Option<ValidationReport>,
    pub investor_summaries: BTreeMap<String, InvestorSummary>,
    pub warnings: Vec<String>,
    pub irr: Option<IrrAnalysis>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl WaterfallCalculation {
    pub fn from_new(id: u64, new: NewCalculation) -> Self {
        WaterfallCalculation {
            id,
            fund_id: new.fund_id,
            calculation_type: new.calculation_type,
            distribution_date: new.distribution_date,
            total_distribution: new.total_distribution,
            status: CalculationStatus::Draft,
            snapshot: new.snapshot,
            tiers: Vec::new(),
            events: Vec::new(),
            audit_log: Vec::new(),
            validation: None,
            investor_summaries: new.investor_summaries,
            warnings: new.warnings,
            irr: new.irr,
            approved_by: None,
            approved_at: None,
        }
    }

    /// Whether this record feeds later snapshots' cumulative totals.
    pub fn counts_toward_cumulative(&self) -> bool {
        self.calculation_type == CalculationType::Distribution
            && matches!(
                self.status,
                CalculationStatus::Approved | CalculationStatus::Distributed
            )
    }

    /// Tiers, events and audit entries may only be attached while in draft.
    pub fn ensure_mutable(&self) -> FundAdminResult<()> {
        if self.status != CalculationStatus::Draft {
            return Err(FundAdminError::StateConflict {
                id: self.id,
                expected: CalculationStatus::Draft.to_string(),
                actual: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn total_distributed(&self) -> Money {
        self.tiers.iter().map(|t| t.distributed_amount).sum()
    }

    pub fn total_gp(&self) -> Money {
        self.tiers.iter().map(|t| t.gp_amount).sum()
    }

    pub fn total_lp(&self) -> Money {
        self.tiers.iter().map(|t| t.lp_amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(investor: &str, event_type: EventType, amount: Money, wh: Money) -> DistributionEvent {
        DistributionEvent {
            investor_id: investor.into(),
            commitment_id: Some(format!("C-{investor}")),
            tier_level: 1,
            recipient: Recipient::Lp,
            event_type,
            amount,
            withholding_amount: wh,
            net_amount: amount - wh,
            payment_status: PaymentStatus::Pending,
        }
    }

    #[test]
    fn test_status_moves_forward_only() {
        assert!(CalculationStatus::Draft
            .ensure_transition(1, CalculationStatus::Calculated)
            .is_ok());
        assert!(CalculationStatus::Approved
            .ensure_transition(1, CalculationStatus::Distributed)
            .is_ok());

        let err = CalculationStatus::Draft
            .ensure_transition(7, CalculationStatus::Approved)
            .unwrap_err();
        match err {
            FundAdminError::StateConflict {
                id,
                expected,
                actual,
            } => {
                assert_eq!(id, 7);
                assert_eq!(expected, "calculated");
                assert_eq!(actual, "draft");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(CalculationStatus::Distributed
            .ensure_transition(1, CalculationStatus::Calculated)
            .is_err());
    }

    #[test]
    fn test_event_type_for_carry_tier_depends_on_recipient() {
        assert_eq!(
            EventType::for_tier(TierType::CarriedInterest, true),
            EventType::CarriedInterest
        );
        assert_eq!(
            EventType::for_tier(TierType::CarriedInterest, false),
            EventType::ProfitShare
        );
    }

    #[test]
    fn test_investor_summary_totals() {
        let events = vec![
            event("LP1", EventType::ReturnOfCapital, dec!(100), dec!(0)),
            event("LP1", EventType::ProfitShare, dec!(40), dec!(6)),
            event("LP2", EventType::PreferredReturn, dec!(10), dec!(1)),
        ];
        let summaries = summarize_investors(&events);
        let lp1 = &summaries["LP1"];
        assert_eq!(lp1.gross_total, dec!(140));
        assert_eq!(lp1.withholding, dec!(6));
        assert_eq!(lp1.net_total, dec!(134));
        assert_eq!(lp1.profit_share, dec!(40));
        assert_eq!(summaries["LP2"].preferred_return, dec!(10));
    }
}
