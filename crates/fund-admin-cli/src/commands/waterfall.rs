use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::json;

use fund_admin_core::calculators::preferred_return::CompoundingFrequency;
use fund_admin_core::waterfall::{CalculationType, WaterfallRequest};
use fund_admin_core::EngineConfig;

use super::{envelope, open_book, save_book, BookArgs, CommandResult};
use crate::input;

const WATERFALL_METHODOLOGY: &str = "Sequential distribution waterfall: return of capital, \
     preferred return, GP catch-up, carried interest; pro-rata allocation to commitments";

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CalculationTypeArg {
    Distribution,
    Hypothetical,
    IrrAnalysis,
}

impl From<CalculationTypeArg> for CalculationType {
    fn from(arg: CalculationTypeArg) -> Self {
        match arg {
            CalculationTypeArg::Distribution => CalculationType::Distribution,
            CalculationTypeArg::Hypothetical => CalculationType::Hypothetical,
            CalculationTypeArg::IrrAnalysis => CalculationType::IrrAnalysis,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompoundingArg {
    Daily,
    Monthly,
    Quarterly,
    Annual,
}

impl From<CompoundingArg> for CompoundingFrequency {
    fn from(arg: CompoundingArg) -> Self {
        match arg {
            CompoundingArg::Daily => CompoundingFrequency::Daily,
            CompoundingArg::Monthly => CompoundingFrequency::Monthly,
            CompoundingArg::Quarterly => CompoundingFrequency::Quarterly,
            CompoundingArg::Annual => CompoundingFrequency::Annual,
        }
    }
}

/// Arguments for a waterfall calculation
#[derive(Args)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Path to a JSON waterfall request (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Fund to distribute from
    #[arg(long)]
    pub fund_id: Option<String>,

    /// Distribution date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Total cash to distribute
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Calculation type
    #[arg(long, value_enum, default_value = "distribution")]
    pub calculation_type: CalculationTypeArg,

    /// Compound the preferred return (hypothetical runs only)
    #[arg(long, value_enum)]
    pub compounding: Option<CompoundingArg>,
}

pub fn run_calculate(args: CalculateArgs, config: &EngineConfig) -> CommandResult {
    let request: WaterfallRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        WaterfallRequest {
            fund_id: args
                .fund_id
                .clone()
                .ok_or("--fund-id is required (or provide --input)")?,
            distribution_date: args.date.ok_or("--date is required (or provide --input)")?,
            total_distribution: args
                .amount
                .ok_or("--amount is required (or provide --input)")?,
            calculation_type: args.calculation_type.into(),
            tiers: None,
            compounding: args.compounding.map(Into::into),
        }
    };

    let started = Instant::now();
    let service = open_book(&args.book, config)?;
    let calc = service.calculate_waterfall(&request)?;
    save_book(&args.book, &service)?;

    let mut warnings = calc.warnings.clone();
    if let Some(report) = &calc.validation {
        warnings.extend(
            report
                .messages()
                .into_iter()
                .map(|m| format!("validation error: {m}")),
        );
    }
    envelope(WATERFALL_METHODOLOGY, &request, warnings, started, calc)
}

/// Arguments for reading back a stored calculation
#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Calculation id
    #[arg(long)]
    pub id: u64,
}

pub fn run_show(args: ShowArgs, config: &EngineConfig) -> CommandResult {
    let started = Instant::now();
    let service = open_book(&args.book, config)?;
    let calc = service.get_calculation(args.id)?;
    envelope(
        WATERFALL_METHODOLOGY,
        &json!({ "id": args.id }),
        calc.warnings.clone(),
        started,
        calc,
    )
}

/// Arguments for re-validating a stored calculation
#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Calculation id
    #[arg(long)]
    pub id: u64,
}

pub fn run_validate(args: ValidateArgs, config: &EngineConfig) -> CommandResult {
    let started = Instant::now();
    let service = open_book(&args.book, config)?;
    let report = service.revalidate(args.id)?;
    save_book(&args.book, &service)?;

    let warnings = report.warnings.clone();
    envelope(
        "Waterfall validation: totals, allocation percentages, tier ordering, \
         tier arithmetic, event reconciliation, audit sequence",
        &json!({
            "id": args.id,
            "allocation_pct_tolerance": config.allocation_pct_tolerance,
        }),
        warnings,
        started,
        report,
    )
}
