use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::FundAdminResult;

/// Trace of a return-of-capital computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnOfCapitalCalc {
    pub unreturned_capital: Money,
    pub available: Money,
    pub to_distribute: Money,
    /// Capital still unreturned after this distribution
    pub remaining_unreturned: Money,
}

/// `to_distribute = min(available, unreturned_capital)`.
pub fn calculate_return_of_capital(
    unreturned_capital: Money,
    available: Money,
) -> FundAdminResult<ReturnOfCapitalCalc> {
    ensure_non_negative("unreturned_capital", unreturned_capital)?;
    ensure_non_negative("available", available)?;

    let to_distribute = available.min(unreturned_capital);
    Ok(ReturnOfCapitalCalc {
        unreturned_capital,
        available,
        to_distribute,
        remaining_unreturned: unreturned_capital - to_distribute,
    })
}
