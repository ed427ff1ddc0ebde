use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calculators::preferred_return::CompoundingFrequency;
use crate::config::EngineConfig;
use crate::error::FundAdminError;
use crate::fund::FundSnapshot;
use crate::types::*;
use crate::waterfall::allocation::allocate_tiers;
use crate::waterfall::audit::{AuditEntry, AuditTrail};
use crate::waterfall::calculation::{
    summarize_investors, CalculationType, DistributionEvent, NewCalculation,
};
use crate::waterfall::irr::analyze_lp_returns;
use crate::waterfall::sequencer::run_tiers;
use crate::waterfall::tiers::{default_tiers, TierDefinition, TierResult, TierType};
use crate::waterfall::validator::{validate_parts, ValidationReport};
use crate::FundAdminResult;

/// Input of a single waterfall run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallRequest {
    pub fund_id: String,
    pub distribution_date: NaiveDate,
    pub total_distribution: Money,
    #[serde(default)]
    pub calculation_type: CalculationType,
    /// Custom tier list; the fund's default topology when absent
    #[serde(default)]
    pub tiers: Option<Vec<TierDefinition>>,
    /// Compound preferred-return accrual, hypothetical runs only
    #[serde(default)]
    pub compounding: Option<CompoundingFrequency>,
}

/// Everything a run produces, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct WaterfallOutcome {
    pub header: NewCalculation,
    pub tiers: Vec<TierResult>,
    pub events: Vec<DistributionEvent>,
    pub audit_log: Vec<AuditEntry>,
    pub validation: ValidationReport,
}

/// Pure waterfall run over a loaded snapshot: tier sequence, allocation,
/// audit and validation. Performs no I/O, so any error here leaves nothing
/// behind to clean up.
pub fn compute_waterfall(
    snapshot: &FundSnapshot,
    request: &WaterfallRequest,
    config: &EngineConfig,
) -> FundAdminResult<WaterfallOutcome> {
    if request.fund_id != snapshot.fund_id {
        return Err(FundAdminError::invalid(
            "fund_id",
            format!(
                "Request is for fund {} but the snapshot is of fund {}",
                request.fund_id, snapshot.fund_id
            ),
        ));
    }
    if request.compounding.is_some() && request.calculation_type != CalculationType::Hypothetical
    {
        return Err(FundAdminError::invalid(
            "compounding",
            "Compound accrual is only available for hypothetical calculations",
        ));
    }

    info!(
        "waterfall start: fund={} date={} total={} type={}",
        request.fund_id, request.distribution_date, request.total_distribution, request.calculation_type
    );

    let tier_defs = match &request.tiers {
        Some(custom) => custom.clone(),
        None => default_tiers(&snapshot.terms),
    };

    let mut warnings = Vec::new();
    if !tier_defs
        .iter()
        .any(|t| t.tier_type == TierType::ReturnOfCapital)
    {
        warnings.push("No return of capital tier: capital is not returned before profit".into());
    }
    if snapshot.commitments.is_empty() {
        warnings.push(format!(
            "Fund {} has no active commitments as of {}",
            snapshot.fund_id, snapshot.as_of
        ));
    }

    let mut audit = AuditTrail::new();
    let tiers = run_tiers(
        snapshot,
        &tier_defs,
        request.total_distribution,
        request.compounding,
        config.money_scale,
        &mut audit,
    )?;
    let events = allocate_tiers(
        &tiers,
        &snapshot.commitments,
        &snapshot.terms.gp_investor_id,
        config.allocation_basis,
        config.money_scale,
        &mut audit,
    )?;
    let audit_log = audit.into_entries();

    let irr = if request.calculation_type == CalculationType::IrrAnalysis {
        let lp_total: Money = tiers.iter().map(|t| t.lp_amount).sum();
        Some(analyze_lp_returns(
            snapshot,
            request.distribution_date,
            lp_total,
            &mut warnings,
        ))
    } else {
        None
    };

    let validation = validate_parts(
        request.total_distribution,
        &tiers,
        &events,
        &audit_log,
        config.allocation_pct_tolerance,
    );
    if validation.is_valid {
        info!(
            "waterfall done: fund={} tiers={} events={}",
            request.fund_id,
            tiers.len(),
            events.len()
        );
    } else {
        warn!(
            "waterfall for fund {} failed validation: {}",
            request.fund_id,
            validation.messages().join("; ")
        );
    }
    warnings.extend(validation.warnings.iter().cloned());

    Ok(WaterfallOutcome {
        header: NewCalculation {
            fund_id: request.fund_id.clone(),
            calculation_type: request.calculation_type,
            distribution_date: request.distribution_date,
            total_distribution: request.total_distribution,
            snapshot: snapshot.clone(),
            investor_summaries: summarize_investors(&events),
            warnings,
            irr,
        },
        tiers,
        events,
        audit_log,
        validation,
    })
}
