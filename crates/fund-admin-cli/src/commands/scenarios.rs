use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use fund_admin_core::scenarios::HypotheticalScenario;
use fund_admin_core::EngineConfig;

use super::{envelope, open_book, save_book, BookArgs, CommandResult};
use crate::input;

/// Arguments for a batch of hypothetical distributions
#[derive(Args)]
pub struct ScenarioArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Fund to model
    #[arg(long)]
    pub fund_id: String,

    /// Path to a JSON array of scenarios (or pipe it on stdin)
    #[arg(long)]
    pub input: Option<String>,
}

/// One line of the batch summary.
#[derive(Debug, Serialize)]
struct ScenarioRow {
    index: usize,
    label: Option<String>,
    total_distribution: Decimal,
    calculation_id: Option<u64>,
    lp_total: Option<Decimal>,
    gp_total: Option<Decimal>,
    error: Option<String>,
}

pub fn run_scenarios(args: ScenarioArgs, config: &EngineConfig) -> CommandResult {
    let scenarios: Vec<HypotheticalScenario> = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <scenarios.json> or stdin required for scenarios".into());
    };

    let started = Instant::now();
    let service = open_book(&args.book, config)?;
    let results = service.create_hypothetical_scenario(&args.fund_id, &scenarios)?;
    save_book(&args.book, &service)?;

    let mut warnings = Vec::new();
    let rows: Vec<ScenarioRow> = scenarios
        .iter()
        .zip(results)
        .enumerate()
        .map(|(index, (scenario, result))| match result {
            Ok(calc) => ScenarioRow {
                index,
                label: scenario.label.clone(),
                total_distribution: scenario.total_distribution,
                calculation_id: Some(calc.id),
                lp_total: Some(calc.total_lp()),
                gp_total: Some(calc.total_gp()),
                error: None,
            },
            Err(e) => {
                warnings.push(format!("scenario {index} failed: {e}"));
                ScenarioRow {
                    index,
                    label: scenario.label.clone(),
                    total_distribution: scenario.total_distribution,
                    calculation_id: None,
                    lp_total: None,
                    gp_total: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    envelope(
        "Hypothetical scenarios: independent waterfalls against one fund snapshot",
        &json!({
            "fund_id": args.fund_id,
            "scenarios": scenarios.len(),
            "max_scenario_workers": config.max_scenario_workers,
        }),
        warnings,
        started,
        rows,
    )
}
