use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::types::*;
use crate::FundAdminResult;

// ---------------------------------------------------------------------------
// Fund terms
// ---------------------------------------------------------------------------

/// Economic terms of a fund's limited partnership agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundTerms {
    pub fund_id: String,
    pub name: String,
    /// Annual preferred return (8 = 8%)
    pub preferred_return_rate: Percent,
    /// GP profit share once carry is earned (20 = 20%)
    pub carried_interest_rate: Percent,
    /// GP share of distributions while in the catch-up tier
    pub catch_up_pct: Percent,
    /// Multiple-of-money hurdles for tiered carry
    #[serde(default)]
    pub hurdle_tiers: Vec<HurdleTier>,
    #[serde(default)]
    pub carry_method: CarryMethod,
    #[serde(default)]
    pub currency: Currency,
    /// Recipient id used for GP-facing distribution events
    pub gp_investor_id: String,
    /// Used as the accrual start when no dated contributions exist
    pub inception_date: NaiveDate,
}

/// How the carried interest tier computes the GP share.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CarryMethod {
    /// Flat split at the tier's GP percentage
    #[default]
    Standard,
    /// No carry until cumulative returns reach `hurdle_rate`% of contributions
    HurdleGated { hurdle_rate: Percent },
    /// European carry on whole-fund profit, optionally above a hurdle amount
    WholeFund {
        #[serde(default)]
        hurdle_rate: Option<Percent>,
    },
    /// Carry rate stepped by multiple-of-money thresholds (`hurdle_tiers`)
    MultiHurdle,
    /// Deal-by-deal carry with the catch-up folded into the carry tier
    AmericanWithCatchUp,
}

/// One multiple-of-money threshold and the carry rate it unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HurdleTier {
    pub multiple_threshold: Multiple,
    pub carry_rate: Percent,
}

impl FundTerms {
    pub fn validate(&self) -> FundAdminResult<()> {
        if self.fund_id.trim().is_empty() {
            return Err(FundAdminError::invalid("fund_id", "Fund id cannot be empty"));
        }
        if self.gp_investor_id.trim().is_empty() {
            return Err(FundAdminError::invalid(
                "gp_investor_id",
                "GP recipient id cannot be empty",
            ));
        }
        ensure_percent("preferred_return_rate", self.preferred_return_rate)?;
        ensure_percent("carried_interest_rate", self.carried_interest_rate)?;
        ensure_percent("catch_up_pct", self.catch_up_pct)?;

        match &self.carry_method {
            CarryMethod::HurdleGated { hurdle_rate } => {
                if *hurdle_rate < Decimal::ZERO {
                    return Err(FundAdminError::invalid(
                        "carry_method.hurdle_rate",
                        "Hurdle rate cannot be negative",
                    ));
                }
            }
            CarryMethod::WholeFund {
                hurdle_rate: Some(rate),
            } if *rate < Decimal::ZERO => {
                return Err(FundAdminError::invalid(
                    "carry_method.hurdle_rate",
                    "Hurdle rate cannot be negative",
                ));
            }
            CarryMethod::MultiHurdle if self.hurdle_tiers.is_empty() => {
                return Err(FundAdminError::invalid(
                    "hurdle_tiers",
                    "Multi-hurdle carry requires at least one hurdle tier",
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Commitments and capital flows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    #[default]
    Active,
    Transferred,
    Defaulted,
    Closed,
}

/// An investor's commitment to the fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub commitment_id: String,
    pub investor_id: String,
    pub commitment_amount: Money,
    pub capital_called: Money,
    pub capital_returned: Money,
    pub commitment_date: NaiveDate,
    #[serde(default)]
    pub status: CommitmentStatus,
    /// Withholding applied to distributions paid on this commitment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withholding_rate_pct: Option<Percent>,
}

impl Commitment {
    pub fn is_active_on(&self, as_of: NaiveDate) -> bool {
        self.status == CommitmentStatus::Active && self.commitment_date <= as_of
    }

    /// Called capital not yet returned, floored at zero.
    pub fn unreturned_capital(&self) -> Money {
        (self.capital_called - self.capital_returned).max(Decimal::ZERO)
    }

    pub fn validate(&self) -> FundAdminResult<()> {
        ensure_non_negative("commitment_amount", self.commitment_amount)?;
        ensure_non_negative("capital_called", self.capital_called)?;
        ensure_non_negative("capital_returned", self.capital_returned)?;
        if let Some(rate) = self.withholding_rate_pct {
            ensure_percent("withholding_rate_pct", rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalFlowKind {
    Contribution,
    CapitalReturn,
}

/// A dated capital movement at fund level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalFlow {
    pub date: NaiveDate,
    pub kind: CapitalFlowKind,
    pub amount: Money,
}

impl CapitalFlow {
    /// Effect on contributed capital outstanding.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            CapitalFlowKind::Contribution => self.amount,
            CapitalFlowKind::CapitalReturn => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn terms() -> FundTerms {
        FundTerms {
            fund_id: "F1".into(),
            name: "Fund I".into(),
            preferred_return_rate: dec!(8),
            carried_interest_rate: dec!(20),
            catch_up_pct: dec!(100),
            hurdle_tiers: vec![],
            carry_method: CarryMethod::Standard,
            currency: Currency::USD,
            gp_investor_id: "GP".into(),
            inception_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_terms_validate() {
        assert!(terms().validate().is_ok());

        let mut bad = terms();
        bad.carried_interest_rate = dec!(120);
        assert!(bad.validate().is_err());

        let mut multi = terms();
        multi.carry_method = CarryMethod::MultiHurdle;
        assert!(multi.validate().is_err());
    }

    #[test]
    fn test_carry_method_wire_format() {
        let method: CarryMethod =
            serde_json::from_str(r#"{"method": "hurdle_gated", "hurdle_rate": "110"}"#).unwrap();
        assert_eq!(
            method,
            CarryMethod::HurdleGated {
                hurdle_rate: dec!(110)
            }
        );
        let method: CarryMethod = serde_json::from_str(r#"{"method": "whole_fund"}"#).unwrap();
        assert_eq!(method, CarryMethod::WholeFund { hurdle_rate: None });
    }

    #[test]
    fn test_commitment_activity_and_unreturned() {
        let c = Commitment {
            commitment_id: "C1".into(),
            investor_id: "LP1".into(),
            commitment_amount: dec!(1000),
            capital_called: dec!(600),
            capital_returned: dec!(700),
            commitment_date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            status: CommitmentStatus::Active,
            withholding_rate_pct: None,
        };
        assert_eq!(c.unreturned_capital(), Decimal::ZERO);
        assert!(!c.is_active_on(NaiveDate::from_ymd_opt(2021, 5, 31).unwrap()));
        assert!(c.is_active_on(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()));
    }
}
