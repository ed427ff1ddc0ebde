use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;

use fund_admin_core::calculators::carried_interest::{
    calculate_hurdle_carry, calculate_standard_carry,
};
use fund_admin_core::calculators::catch_up::calculate_tier_catch_up;
use fund_admin_core::calculators::preferred_return::{
    calculate_compound_preferred_return, calculate_multi_period_preferred_return,
    calculate_preferred_return, compound_accrual, simple_accrual, AccrualPeriod,
    CompoundingFrequency,
};

use super::waterfall::CompoundingArg;
use super::{envelope, CommandResult};
use crate::input;

/// Arguments for a standalone preferred-return accrual
#[derive(Args)]
pub struct PrefReturnArgs {
    /// Path to a JSON multi-period input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Capital base accruing the return
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Annual rate in percent (8 = 8%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Days in the accrual window
    #[arg(long)]
    pub days: Option<i64>,

    /// Preferred return already paid
    #[arg(long)]
    pub previous_paid: Option<Decimal>,

    /// Cash available; defaults to the full accrual
    #[arg(long)]
    pub available: Option<Decimal>,

    /// Compound instead of simple daily accrual
    #[arg(long, value_enum)]
    pub compounding: Option<CompoundingArg>,
}

/// Multi-period accrual read from `--input`.
#[derive(Debug, Deserialize)]
struct MultiPeriodInput {
    periods: Vec<AccrualPeriod>,
    annual_rate: Decimal,
    #[serde(default)]
    previous_paid: Decimal,
    #[serde(default)]
    available: Option<Decimal>,
}

pub fn run_pref_return(args: PrefReturnArgs) -> CommandResult {
    let started = Instant::now();

    if let Some(ref path) = args.input {
        let inp: MultiPeriodInput = input::file::read_json(path)?;
        let available = match inp.available {
            Some(a) => a,
            None => inp
                .periods
                .iter()
                .map(|p| simple_accrual(p.capital_base, inp.annual_rate, p.days))
                .sum::<Result<Decimal, _>>()?,
        };
        let calc = calculate_multi_period_preferred_return(
            &inp.periods,
            inp.annual_rate,
            inp.previous_paid,
            available,
        )?;
        return envelope(
            "Multi-period simple preferred return (actual/365)",
            &json!({ "periods": inp.periods.len(), "annual_rate": inp.annual_rate }),
            Vec::new(),
            started,
            calc,
        );
    }

    let capital = args.capital.ok_or("--capital is required (or provide --input)")?;
    let rate = args.rate.ok_or("--rate is required (or provide --input)")?;
    let days = args.days.ok_or("--days is required (or provide --input)")?;
    let previous_paid = args.previous_paid.unwrap_or(dec!(0));
    let assumptions = json!({
        "capital": capital,
        "rate": rate,
        "days": days,
        "previous_paid": previous_paid,
    });

    match args.compounding {
        Some(frequency) => {
            let frequency: CompoundingFrequency = frequency.into();
            let available = match args.available {
                Some(a) => a,
                None => compound_accrual(capital, rate, days, frequency)?.accrued,
            };
            let calc = calculate_compound_preferred_return(
                capital,
                rate,
                days,
                frequency,
                previous_paid,
                available,
            )?;
            envelope(
                "Compound preferred return: principal x (1 + r/n)^(n x days/365)",
                &assumptions,
                vec!["Compound accrual is for hypothetical modeling only".into()],
                started,
                calc,
            )
        }
        None => {
            let available = match args.available {
                Some(a) => a,
                None => simple_accrual(capital, rate, days)?,
            };
            let calc = calculate_preferred_return(capital, rate, days, previous_paid, available)?;
            envelope(
                "Simple preferred return: capital x rate x days / 36500",
                &assumptions,
                Vec::new(),
                started,
                calc,
            )
        }
    }
}

/// Arguments for a standalone GP catch-up
#[derive(Args)]
pub struct CatchUpArgs {
    /// Cash available for the catch-up tier
    #[arg(long)]
    pub available: Decimal,

    /// Cumulative distributions including this one
    #[arg(long)]
    pub cumulative: Decimal,

    /// Carried interest rate in percent
    #[arg(long)]
    pub carry_rate: Decimal,

    /// GP share of cumulative distributions so far, in percent
    #[arg(long)]
    pub current_gp_pct: Option<Decimal>,

    /// GP percentage of the catch-up tier (100 = full catch-up)
    #[arg(long, default_value = "100")]
    pub gp_share: Decimal,
}

pub fn run_catch_up(args: CatchUpArgs) -> CommandResult {
    let started = Instant::now();
    let current_gp_pct = args.current_gp_pct.unwrap_or(dec!(0));
    let calc = calculate_tier_catch_up(
        args.available,
        args.cumulative,
        args.carry_rate,
        current_gp_pct,
        args.gp_share,
    )?;
    envelope(
        "GP catch-up toward carry rate x cumulative distributions",
        &json!({
            "available": args.available,
            "cumulative": args.cumulative,
            "carry_rate": args.carry_rate,
            "current_gp_pct": current_gp_pct,
            "gp_share": args.gp_share,
        }),
        Vec::new(),
        started,
        calc,
    )
}

/// Arguments for a standalone carried-interest split
#[derive(Args)]
pub struct CarryArgs {
    /// Distribution subject to carry
    #[arg(long)]
    pub distribution: Decimal,

    /// Carried interest rate in percent
    #[arg(long)]
    pub carry_rate: Decimal,

    /// Hurdle as a percentage of contributions (gates the carry)
    #[arg(long, requires_all = ["contributions", "returned"])]
    pub hurdle_rate: Option<Decimal>,

    /// Total contributions, for the hurdle test
    #[arg(long)]
    pub contributions: Option<Decimal>,

    /// Total returned to date, for the hurdle test
    #[arg(long)]
    pub returned: Option<Decimal>,
}

pub fn run_carry(args: CarryArgs) -> CommandResult {
    let started = Instant::now();
    match (args.hurdle_rate, args.contributions, args.returned) {
        (Some(hurdle_rate), Some(contributions), Some(returned)) => {
            let calc = calculate_hurdle_carry(
                args.distribution,
                args.carry_rate,
                contributions,
                returned,
                hurdle_rate,
            )?;
            let warnings = if calc.hurdle_met {
                Vec::new()
            } else {
                vec![format!(
                    "Hurdle of {} not met; no carry is payable",
                    calc.hurdle_amount
                )]
            };
            envelope(
                "Hurdle-gated carry: carry only once returns reach the hurdle",
                &json!({
                    "distribution": args.distribution,
                    "carry_rate": args.carry_rate,
                    "hurdle_rate": hurdle_rate,
                }),
                warnings,
                started,
                calc,
            )
        }
        _ => {
            let calc = calculate_standard_carry(args.distribution, args.carry_rate)?;
            envelope(
                "Standard carry: distribution x carry rate",
                &json!({ "distribution": args.distribution, "carry_rate": args.carry_rate }),
                Vec::new(),
                started,
                calc,
            )
        }
    }
}
