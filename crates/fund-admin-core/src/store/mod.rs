//! Storage collaborators of the waterfall engine.
//!
//! The engine reads fund state through [`FundRepository`] and writes
//! calculations through [`CalculationStore`]. Both are plain synchronous
//! traits; [`InMemoryStore`] is the reference implementation used by the CLI
//! and the tests.

pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::fund::{CapitalFlow, Commitment, FundTerms};
use crate::waterfall::audit::AuditEntry;
use crate::waterfall::calculation::{
    CalculationStatus, DistributionEvent, NewCalculation, PaymentStatus, WaterfallCalculation,
};
use crate::waterfall::tiers::TierResult;
use crate::waterfall::validator::ValidationReport;
use crate::FundAdminResult;

pub use memory::InMemoryStore;

/// Read side: fund terms, commitments, capital flows and calculation history.
pub trait FundRepository {
    /// Fails with `NotFound` for an unknown fund.
    fn get_fund_terms(&self, fund_id: &str) -> FundAdminResult<FundTerms>;

    fn list_active_commitments(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<Vec<Commitment>>;

    /// Dated contributions and capital returns up to `as_of`.
    fn list_capital_flows(&self, fund_id: &str, as_of: NaiveDate)
        -> FundAdminResult<Vec<CapitalFlow>>;

    /// Calculations of the fund dated on or before `as_of`, in any status.
    fn get_prior_calculations(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<Vec<WaterfallCalculation>>;
}

/// Write side: calculation records and their lifecycle.
pub trait CalculationStore {
    /// Store a new record in `draft` and return its id.
    fn create_calculation(&self, header: NewCalculation) -> FundAdminResult<u64>;

    /// Draft only; `StateConflict` otherwise.
    fn attach_tiers(&self, id: u64, tiers: Vec<TierResult>) -> FundAdminResult<()>;

    /// Draft only; `StateConflict` otherwise.
    fn attach_distribution_events(
        &self,
        id: u64,
        events: Vec<DistributionEvent>,
    ) -> FundAdminResult<()>;

    /// Draft only. Step numbers must continue the existing log.
    fn append_audit_entries(&self, id: u64, entries: Vec<AuditEntry>) -> FundAdminResult<()>;

    /// Forward transitions only; `StateConflict` otherwise.
    fn update_calculation_status(&self, id: u64, status: CalculationStatus)
        -> FundAdminResult<()>;

    fn update_payment_status(&self, id: u64, status: PaymentStatus) -> FundAdminResult<()>;

    /// Replace the latest validation outcome.
    fn record_validation(&self, id: u64, report: ValidationReport) -> FundAdminResult<()>;

    fn record_approval(
        &self,
        id: u64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> FundAdminResult<()>;

    fn get_calculation(&self, id: u64) -> FundAdminResult<WaterfallCalculation>;

    /// Run `f` with exclusive access to `fund_id`. Reads inside `f` see one
    /// consistent state; writes become visible to others only if `f`
    /// returns `Ok`, and are discarded otherwise.
    fn atomically<T, F>(&self, fund_id: &str, f: F) -> FundAdminResult<T>
    where
        F: FnOnce(&Self) -> FundAdminResult<T>,
        Self: Sized;
}

/// A fund with everything the engine reads about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    pub terms: FundTerms,
    #[serde(default)]
    pub commitments: Vec<Commitment>,
    #[serde(default)]
    pub capital_flows: Vec<CapitalFlow>,
}

/// Serializable contents of a store: funds and calculation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundBook {
    #[serde(default)]
    pub funds: Vec<FundRecord>,
    #[serde(default)]
    pub calculations: Vec<WaterfallCalculation>,
}
