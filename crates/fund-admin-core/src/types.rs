use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FundAdminError;
use crate::FundAdminResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Percentages expressed on a 0-100 scale (8 = 8%). Never as fractions.
pub type Percent = Decimal;

/// Multiples of money (e.g., 1.5x returned over contributed)
pub type Multiple = Decimal;

/// Currency code
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    GBP,
    #[default]
    USD,
    EUR,
    CHF,
    JPY,
    CAD,
    AUD,
    HKD,
    SGD,
    Other(String),
}

/// A single cash flow at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

pub(crate) const HUNDRED: Decimal = dec!(100);

/// Largest distribution a calculation accepts.
pub const MAX_DISTRIBUTION: Money = dec!(1_000_000_000_000_000_000);

pub(crate) fn overflow(field: &str) -> FundAdminError {
    FundAdminError::InvalidInput {
        field: field.into(),
        reason: "Amount is too large to compute exactly".into(),
    }
}

/// `amount × pct / 100`, multiplying before dividing so exact inputs stay exact.
pub fn pct_of(amount: Money, pct: Percent) -> FundAdminResult<Money> {
    amount
        .checked_mul(pct)
        .map(|product| product / HUNDRED)
        .ok_or_else(|| overflow("amount"))
}

/// Round to `scale` decimal places, half away from zero.
pub fn round_money(amount: Money, scale: u32) -> Money {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate toward zero at `scale` decimal places.
pub fn floor_money(amount: Money, scale: u32) -> Money {
    amount.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Reject percentages outside `[0, 100]`.
pub fn ensure_percent(field: &str, value: Percent) -> FundAdminResult<()> {
    if value < Decimal::ZERO || value > HUNDRED {
        return Err(FundAdminError::InvalidInput {
            field: field.into(),
            reason: format!("Percentage must be between 0 and 100, got {value}"),
        });
    }
    Ok(())
}

/// Reject negative monetary amounts.
pub fn ensure_non_negative(field: &str, value: Money) -> FundAdminResult<()> {
    if value < Decimal::ZERO {
        return Err(FundAdminError::InvalidInput {
            field: field.into(),
            reason: format!("Amount cannot be negative, got {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_of_is_exact_for_whole_inputs() {
        assert_eq!(pct_of(dec!(100000), dec!(20)).unwrap(), dec!(20000));
        assert_eq!(pct_of(dec!(333.33), dec!(12.5)).unwrap(), dec!(41.66625));
    }

    #[test]
    fn test_pct_of_reports_overflow() {
        let err = pct_of(Decimal::MAX, dec!(20)).unwrap_err();
        assert!(matches!(err, FundAdminError::InvalidInput { .. }));
    }

    #[test]
    fn test_rounding_modes() {
        assert_eq!(round_money(dec!(10.005), 2), dec!(10.01));
        assert_eq!(floor_money(dec!(10.009), 2), dec!(10.00));
    }

    #[test]
    fn test_ensure_percent_bounds() {
        assert!(ensure_percent("rate", dec!(0)).is_ok());
        assert!(ensure_percent("rate", dec!(100)).is_ok());
        assert!(ensure_percent("rate", dec!(100.0001)).is_err());
        assert!(ensure_percent("rate", dec!(-0.5)).is_err());
    }
}
