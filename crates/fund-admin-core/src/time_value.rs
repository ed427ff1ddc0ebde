use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::FundAdminError;
use crate::types::Money;
use crate::FundAdminResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Whole days from `from` to `to`. Both dates are taken at UTC midnight, so
/// the count never depends on a local timezone.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Day count expressed in years on the given basis (365 or 360).
pub fn year_fraction(days: i64, basis: i64) -> Decimal {
    Decimal::from(days) / Decimal::from(basis)
}

/// Extended IRR for irregular cash flow dates using Newton-Raphson.
///
/// Returns the annual rate as a fraction (0.12 = 12%). Flows are sorted by
/// date; the earliest date anchors the discounting.
pub fn xirr(dated_flows: &[(NaiveDate, Money)], guess: Decimal) -> FundAdminResult<Decimal> {
    if dated_flows.len() < 2 {
        return Err(FundAdminError::InsufficientData(
            "XIRR requires at least 2 cash flows".into(),
        ));
    }
    let has_outflow = dated_flows.iter().any(|(_, a)| *a < Decimal::ZERO);
    let has_inflow = dated_flows.iter().any(|(_, a)| *a > Decimal::ZERO);
    if !has_outflow || !has_inflow {
        return Err(FundAdminError::InsufficientData(
            "XIRR requires both contributions and distributions".into(),
        ));
    }

    let mut flows = dated_flows.to_vec();
    flows.sort_by_key(|(date, _)| *date);
    let base_date = flows[0].0;
    let mut rate = guess;

    for i in 0..MAX_IRR_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        if one_plus_r <= Decimal::ZERO {
            return Err(FundAdminError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        for (date, amount) in &flows {
            let years = year_fraction(days_between(base_date, *date), 365);
            let Some(discount) = one_plus_r.checked_powd(years) else {
                return Err(FundAdminError::ConvergenceFailure {
                    function: "XIRR".into(),
                    iterations: i,
                    last_delta: npv_val,
                });
            };
            if discount.is_zero() {
                continue;
            }
            let present = amount.checked_div(discount);
            let slope = years
                .checked_mul(*amount)
                .zip(one_plus_r.checked_mul(discount))
                .and_then(|(num, den)| num.checked_div(den));
            match (present, slope) {
                (Some(present), Some(slope)) => {
                    npv_val += present;
                    dnpv -= slope;
                }
                _ => {
                    return Err(FundAdminError::ConvergenceFailure {
                        function: "XIRR".into(),
                        iterations: i,
                        last_delta: npv_val,
                    })
                }
            }
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(FundAdminError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        rate -= npv_val / dnpv;

        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(FundAdminError::ConvergenceFailure {
        function: "XIRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: Decimal::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_days_between_spans_leap_year() {
        assert_eq!(days_between(d(2024, 1, 1), d(2025, 1, 1)), 366);
        assert_eq!(days_between(d(2023, 1, 1), d(2024, 1, 1)), 365);
        assert_eq!(days_between(d(2024, 3, 1), d(2024, 2, 1)), -29);
    }

    #[test]
    fn test_year_fraction() {
        assert_eq!(year_fraction(730, 365), dec!(2));
        assert_eq!(year_fraction(180, 360), dec!(0.5));
    }

    #[test]
    fn test_xirr_doubling_over_one_year() {
        let flows = vec![(d(2023, 1, 1), dec!(-1000)), (d(2024, 1, 1), dec!(2000))];
        let rate = xirr(&flows, dec!(0.1)).unwrap();
        assert!((rate - dec!(1.0)).abs() < dec!(0.0001), "got {rate}");
    }

    #[test]
    fn test_xirr_unsorted_input() {
        let flows = vec![
            (d(2025, 1, 1), dec!(1210)),
            (d(2023, 1, 1), dec!(-1000)),
        ];
        let rate = xirr(&flows, dec!(0.1)).unwrap();
        // 1000 -> 1210 over 731 days ~ 10% p.a.
        assert!((rate - dec!(0.10)).abs() < dec!(0.005), "got {rate}");
    }

    #[test]
    fn test_xirr_requires_sign_change() {
        let flows = vec![(d(2023, 1, 1), dec!(100)), (d(2024, 1, 1), dec!(200))];
        assert!(matches!(
            xirr(&flows, dec!(0.1)),
            Err(FundAdminError::InsufficientData(_))
        ));
    }
}
