use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::types::*;
use crate::FundAdminResult;

/// Days per year for simple daily accrual.
pub const DAYS_PER_YEAR: i64 = 365;

/// Longest accrual window accepted, in days (ten years).
pub const MAX_ACCRUAL_DAYS: i64 = 3650;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A stretch of days over which a constant capital base accrues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualPeriod {
    pub capital_base: Money,
    pub days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundingFrequency {
    Daily,
    Monthly,
    Quarterly,
    Annual,
}

impl CompoundingFrequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            CompoundingFrequency::Daily => 365,
            CompoundingFrequency::Monthly => 12,
            CompoundingFrequency::Quarterly => 4,
            CompoundingFrequency::Annual => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AccrualMethod {
    SimpleDaily,
    MultiPeriod,
    Compound { frequency: CompoundingFrequency },
}

/// Trace of a preferred return computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredReturnCalc {
    pub method: AccrualMethod,
    pub annual_rate: Percent,
    pub periods: Vec<AccrualPeriod>,
    /// Per-period accrual, parallel to `periods`
    pub period_accruals: Vec<Money>,
    pub previous_paid: Money,
    pub available: Money,
    pub accrued: Money,
    pub unpaid: Money,
    pub to_distribute: Money,
    /// Unpaid preferred return left after this distribution
    pub remaining: Money,
}

/// Trace of a compound growth computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundAccrualCalc {
    pub principal: Money,
    pub annual_rate: Percent,
    pub frequency: CompoundingFrequency,
    pub days: i64,
    pub exponent: Decimal,
    pub growth_factor: Decimal,
    pub final_value: Money,
    pub accrued: Money,
}

// ---------------------------------------------------------------------------
// Accrual
// ---------------------------------------------------------------------------

fn validate_accrual_inputs(capital_base: Money, annual_rate: Percent, days: i64) -> FundAdminResult<()> {
    if capital_base < Decimal::ZERO {
        return Err(FundAdminError::invalid(
            "capital_base",
            "Capital base cannot be negative",
        ));
    }
    ensure_percent("annual_rate", annual_rate)?;
    if !(0..=MAX_ACCRUAL_DAYS).contains(&days) {
        return Err(FundAdminError::invalid(
            "days",
            format!("Accrual days must be between 0 and {MAX_ACCRUAL_DAYS}, got {days}"),
        ));
    }
    Ok(())
}

/// Simple daily accrual:
/// `capital_base × (annual_rate ÷ 365) × days ÷ 100`.
///
/// Evaluated as `capital_base × annual_rate × days ÷ 36500` so whole-number
/// inputs produce exact results.
pub fn simple_accrual(capital_base: Money, annual_rate: Percent, days: i64) -> FundAdminResult<Money> {
    validate_accrual_inputs(capital_base, annual_rate, days)?;
    capital_base
        .checked_mul(annual_rate)
        .and_then(|v| v.checked_mul(Decimal::from(days)))
        .map(|v| v / Decimal::from(DAYS_PER_YEAR * 100))
        .ok_or_else(|| overflow("capital_base"))
}

/// Compound growth for hypothetical modeling:
/// `final = principal × (1 + rate/100/n)^(n·years)`, `years = days ÷ 365`.
pub fn compound_accrual(
    principal: Money,
    annual_rate: Percent,
    days: i64,
    frequency: CompoundingFrequency,
) -> FundAdminResult<CompoundAccrualCalc> {
    validate_accrual_inputs(principal, annual_rate, days)?;

    let n = Decimal::from(frequency.periods_per_year());
    let growth_factor = Decimal::ONE + annual_rate / dec!(100) / n;
    let exponent = n * Decimal::from(days) / Decimal::from(DAYS_PER_YEAR);

    let compounded = match exponent.fract().is_zero().then(|| exponent.to_u64()).flatten() {
        Some(whole) => growth_factor.checked_powu(whole),
        None => growth_factor.checked_powd(exponent),
    }
    .ok_or_else(|| FundAdminError::invalid("annual_rate", "Compound growth overflowed"))?;

    let final_value = principal
        .checked_mul(compounded)
        .ok_or_else(|| overflow("principal"))?;
    Ok(CompoundAccrualCalc {
        principal,
        annual_rate,
        frequency,
        days,
        exponent,
        growth_factor,
        final_value,
        accrued: final_value - principal,
    })
}

// ---------------------------------------------------------------------------
// Preferred return
// ---------------------------------------------------------------------------

fn settle(
    method: AccrualMethod,
    annual_rate: Percent,
    periods: Vec<AccrualPeriod>,
    period_accruals: Vec<Money>,
    previous_paid: Money,
    available: Money,
) -> FundAdminResult<PreferredReturnCalc> {
    ensure_non_negative("previous_paid", previous_paid)?;
    ensure_non_negative("available", available)?;

    let accrued: Money = period_accruals.iter().copied().sum();
    let unpaid = (accrued - previous_paid).max(Decimal::ZERO);
    let to_distribute = unpaid.min(available);

    Ok(PreferredReturnCalc {
        method,
        annual_rate,
        periods,
        period_accruals,
        previous_paid,
        available,
        accrued,
        unpaid,
        to_distribute,
        remaining: unpaid - to_distribute,
    })
}

/// Preferred return on a single capital base:
/// `unpaid = accrued − previous_paid` (floored at zero),
/// `to_distribute = min(unpaid, available)`, `remaining = unpaid − to_distribute`.
pub fn calculate_preferred_return(
    capital_base: Money,
    annual_rate: Percent,
    days: i64,
    previous_paid: Money,
    available: Money,
) -> FundAdminResult<PreferredReturnCalc> {
    let accrued = simple_accrual(capital_base, annual_rate, days)?;
    settle(
        AccrualMethod::SimpleDaily,
        annual_rate,
        vec![AccrualPeriod { capital_base, days }],
        vec![accrued],
        previous_paid,
        available,
    )
}

/// Preferred return over several periods with changing capital bases; the
/// accrual is the sum of per-period simple accruals.
pub fn calculate_multi_period_preferred_return(
    periods: &[AccrualPeriod],
    annual_rate: Percent,
    previous_paid: Money,
    available: Money,
) -> FundAdminResult<PreferredReturnCalc> {
    let total_days: i64 = periods.iter().map(|p| p.days).sum();
    if total_days > MAX_ACCRUAL_DAYS {
        return Err(FundAdminError::invalid(
            "periods",
            format!("Accrual window of {total_days} days exceeds {MAX_ACCRUAL_DAYS}"),
        ));
    }
    ensure_percent("annual_rate", annual_rate)?;
    let accruals = periods
        .iter()
        .map(|p| simple_accrual(p.capital_base, annual_rate, p.days))
        .collect::<FundAdminResult<Vec<_>>>()?;
    settle(
        AccrualMethod::MultiPeriod,
        annual_rate,
        periods.to_vec(),
        accruals,
        previous_paid,
        available,
    )
}

/// Preferred return with compound accrual, for hypothetical scenarios.
pub fn calculate_compound_preferred_return(
    principal: Money,
    annual_rate: Percent,
    days: i64,
    frequency: CompoundingFrequency,
    previous_paid: Money,
    available: Money,
) -> FundAdminResult<PreferredReturnCalc> {
    let growth = compound_accrual(principal, annual_rate, days, frequency)?;
    settle(
        AccrualMethod::Compound { frequency },
        annual_rate,
        vec![AccrualPeriod {
            capital_base: principal,
            days,
        }],
        vec![growth.accrued],
        previous_paid,
        available,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
