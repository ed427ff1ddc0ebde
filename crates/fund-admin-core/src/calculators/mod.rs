//! Pure waterfall formulas. Each function validates its inputs, performs no
//! I/O and returns a trace struct carrying inputs, intermediates and results,
//! ready to be appended to an audit log.

pub mod capital;
pub mod carried_interest;
pub mod catch_up;
pub mod preferred_return;
