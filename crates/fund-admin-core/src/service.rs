use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculators::carried_interest::{calculate_clawback, ClawbackCalc};
use crate::config::EngineConfig;
use crate::error::FundAdminError;
use crate::fund::load_snapshot;
use crate::store::{CalculationStore, FundRepository};
use crate::types::*;
use crate::waterfall::audit::{AuditEntry, AuditTrail, CalculationTrace};
use crate::waterfall::calculation::{
    CalculationStatus, CalculationType, PaymentStatus, WaterfallCalculation,
};
use crate::waterfall::pipeline::{compute_waterfall, WaterfallOutcome, WaterfallRequest};
use crate::waterfall::validator::{validate_calculation, ValidationReport};
use crate::FundAdminResult;

/// Windup clawback over a fund's distribution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClawbackAssessment {
    pub fund_id: String,
    pub as_of: NaiveDate,
    pub total_contributions: Money,
    pub cumulative_distributions: Money,
    pub clawback: ClawbackCalc,
    pub audit_log: Vec<AuditEntry>,
}

/// Operations exposed to an outer API layer. Every read-modify-write runs
/// inside the store's per-fund `atomically`.
pub struct WaterfallService<S> {
    store: S,
    config: EngineConfig,
}

/// Write a computed run to the store: header, tiers, events, audit log and
/// validation, then move it to `calculated`.
pub(crate) fn persist_outcome<S: CalculationStore>(
    store: &S,
    outcome: WaterfallOutcome,
) -> FundAdminResult<WaterfallCalculation> {
    let id = store.create_calculation(outcome.header)?;
    store.attach_tiers(id, outcome.tiers)?;
    store.attach_distribution_events(id, outcome.events)?;
    store.append_audit_entries(id, outcome.audit_log)?;
    store.record_validation(id, outcome.validation)?;
    store.update_calculation_status(id, CalculationStatus::Calculated)?;
    store.get_calculation(id)
}

impl<S> WaterfallService<S>
where
    S: FundRepository + CalculationStore,
{
    pub fn new(store: S, config: EngineConfig) -> FundAdminResult<Self> {
        config.validate()?;
        Ok(WaterfallService { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_calculation(&self, id: u64) -> FundAdminResult<WaterfallCalculation> {
        self.store.get_calculation(id)
    }

    /// Snapshot, run and persist one calculation as a single unit. Any
    /// error leaves the store untouched.
    pub fn calculate_waterfall(
        &self,
        request: &WaterfallRequest,
    ) -> FundAdminResult<WaterfallCalculation> {
        self.store.atomically(&request.fund_id, |store| {
            let snapshot = load_snapshot(store, &request.fund_id, request.distribution_date)?;
            let outcome = compute_waterfall(&snapshot, request, &self.config)?;
            let calc = persist_outcome(store, outcome)?;
            info!(
                "calculation {} stored for fund {} ({})",
                calc.id, calc.fund_id, calc.status
            );
            Ok(calc)
        })
    }

    /// Validator outcome for a calculation; pure, stores nothing.
    pub fn validate_calculation(&self, calc: &WaterfallCalculation) -> ValidationReport {
        validate_calculation(calc, self.config.allocation_pct_tolerance)
    }

    /// Re-run the validator on a stored calculation and keep the result as
    /// its latest validation.
    pub fn revalidate(&self, id: u64) -> FundAdminResult<ValidationReport> {
        let fund_id = self.store.get_calculation(id)?.fund_id;
        self.store.atomically(&fund_id, |store| {
            let calc = store.get_calculation(id)?;
            let report = self.validate_calculation(&calc);
            store.record_validation(id, report.clone())?;
            Ok(report)
        })
    }

    /// `calculated → approved`, only when the latest validation is valid.
    /// Hypothetical calculations can never be approved.
    pub fn approve_calculation(
        &self,
        id: u64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> FundAdminResult<WaterfallCalculation> {
        if approved_by.trim().is_empty() {
            return Err(FundAdminError::invalid(
                "approved_by",
                "Approver cannot be empty",
            ));
        }
        let fund_id = self.store.get_calculation(id)?.fund_id;
        self.store.atomically(&fund_id, |store| {
            let calc = store.get_calculation(id)?;
            if calc.calculation_type == CalculationType::Hypothetical {
                return Err(FundAdminError::StateConflict {
                    id,
                    expected: CalculationType::Distribution.to_string(),
                    actual: calc.calculation_type.to_string(),
                });
            }
            if calc.status != CalculationStatus::Calculated {
                return Err(FundAdminError::StateConflict {
                    id,
                    expected: CalculationStatus::Calculated.to_string(),
                    actual: calc.status.to_string(),
                });
            }

            let report = match &calc.validation {
                Some(report) => report.clone(),
                None => self.validate_calculation(&calc),
            };
            if !report.is_valid {
                warn!("approval of calculation {id} blocked by validation errors");
                return Err(FundAdminError::InvariantViolation {
                    errors: report.messages(),
                });
            }

            store.record_approval(id, approved_by, approved_at)?;
            store.update_calculation_status(id, CalculationStatus::Approved)?;
            info!("calculation {id} approved by {approved_by}");
            store.get_calculation(id)
        })
    }

    /// `approved → distributed`; every event is marked paid.
    pub fn mark_distributed(&self, id: u64) -> FundAdminResult<WaterfallCalculation> {
        let fund_id = self.store.get_calculation(id)?.fund_id;
        self.store.atomically(&fund_id, |store| {
            store.update_calculation_status(id, CalculationStatus::Distributed)?;
            store.update_payment_status(id, PaymentStatus::Paid)?;
            info!("calculation {id} distributed");
            store.get_calculation(id)
        })
    }

    /// Compare carry paid to date with carry earned on the fund's profit to
    /// date (`cumulative distributions − contributions`).
    pub fn assess_clawback(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<ClawbackAssessment> {
        let snapshot = self
            .store
            .atomically(fund_id, |store| load_snapshot(store, fund_id, as_of))?;

        let final_profit = snapshot.cumulative_distributions - snapshot.total_contributions;
        let clawback = calculate_clawback(
            final_profit,
            snapshot.carried_interest_rate,
            snapshot.previous_gp_distributions,
        )?;
        if clawback.overdistribution > Decimal::ZERO {
            warn!(
                "fund {fund_id}: GP carry over-distributed by {}",
                clawback.overdistribution
            );
        }

        let mut audit = AuditTrail::new();
        audit.record(None, CalculationTrace::Clawback(clawback.clone()));
        Ok(ClawbackAssessment {
            fund_id: fund_id.to_string(),
            as_of,
            total_contributions: snapshot.total_contributions,
            cumulative_distributions: snapshot.cumulative_distributions,
            clawback,
            audit_log: audit.into_entries(),
        })
    }
}
