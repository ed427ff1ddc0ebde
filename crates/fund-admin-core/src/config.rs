use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::types::Percent;
use crate::FundAdminResult;

/// Weighting used when spreading an LP-facing tier amount across commitments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationBasis {
    /// Commitment amount over total fund commitments
    #[default]
    Commitment,
    /// Capital called to date
    CalledCapital,
    /// Capital called and not yet returned
    UnreturnedCapital,
}

/// Engine-wide settings. Every field has a default so partial config files
/// deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimal places of persisted tier and event amounts
    pub money_scale: u32,
    pub allocation_basis: AllocationBasis,
    /// Allowed deviation of `lp_allocation_pct + gp_allocation_pct` from 100
    pub allocation_pct_tolerance: Percent,
    pub max_scenario_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            money_scale: 2,
            allocation_basis: AllocationBasis::Commitment,
            allocation_pct_tolerance: Decimal::ZERO,
            max_scenario_workers: 4,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> FundAdminResult<()> {
        if self.money_scale > 10 {
            return Err(FundAdminError::invalid(
                "money_scale",
                "Money scale above 10 decimal places is not supported",
            ));
        }
        if self.allocation_pct_tolerance < Decimal::ZERO {
            return Err(FundAdminError::invalid(
                "allocation_pct_tolerance",
                "Tolerance cannot be negative",
            ));
        }
        if self.max_scenario_workers == 0 {
            return Err(FundAdminError::invalid(
                "max_scenario_workers",
                "At least one scenario worker is required",
            ));
        }
        Ok(())
    }
}
