use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calculators::preferred_return::CompoundingFrequency;
use crate::config::EngineConfig;
use crate::error::FundAdminError;
use crate::fund::{load_snapshot, FundSnapshot};
use crate::service::{persist_outcome, WaterfallService};
use crate::store::{CalculationStore, FundRepository};
use crate::types::*;
use crate::waterfall::calculation::{CalculationType, WaterfallCalculation};
use crate::waterfall::pipeline::{compute_waterfall, WaterfallOutcome, WaterfallRequest};
use crate::waterfall::tiers::TierDefinition;
use crate::FundAdminResult;

/// One candidate distribution to model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypotheticalScenario {
    #[serde(default)]
    pub label: Option<String>,
    pub distribution_date: NaiveDate,
    pub total_distribution: Money,
    #[serde(default)]
    pub compounding: Option<CompoundingFrequency>,
    #[serde(default)]
    pub tiers: Option<Vec<TierDefinition>>,
}

/// Fund snapshots keyed by distribution date. A date the fund cannot be
/// read at keeps its error, which every scenario on that date reports.
pub type SnapshotsByDate = BTreeMap<NaiveDate, FundAdminResult<FundSnapshot>>;

fn run_scenario(
    snapshots: &SnapshotsByDate,
    scenario: &HypotheticalScenario,
    config: &EngineConfig,
) -> FundAdminResult<WaterfallOutcome> {
    let snapshot = match snapshots.get(&scenario.distribution_date) {
        Some(Ok(snapshot)) => snapshot,
        Some(Err(e)) => return Err(e.clone()),
        None => {
            return Err(FundAdminError::not_found(
                "snapshot",
                scenario.distribution_date,
            ))
        }
    };
    let request = WaterfallRequest {
        fund_id: snapshot.fund_id.clone(),
        distribution_date: scenario.distribution_date,
        total_distribution: scenario.total_distribution,
        calculation_type: CalculationType::Hypothetical,
        tiers: scenario.tiers.clone(),
        compounding: scenario.compounding,
    };
    compute_waterfall(snapshot, &request, config)
}

/// Run every scenario against the snapshot for its date on up to
/// `max_scenario_workers` threads. Results are in input order and
/// independent of each other.
pub fn run_batch(
    snapshots: &SnapshotsByDate,
    scenarios: &[HypotheticalScenario],
    config: &EngineConfig,
) -> Vec<FundAdminResult<WaterfallOutcome>> {
    let workers = config.max_scenario_workers.clamp(1, scenarios.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                let Some(scenario) = scenarios.get(idx) else {
                    break;
                };
                if tx.send((idx, run_scenario(snapshots, scenario, config))).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<FundAdminResult<WaterfallOutcome>>> =
        scenarios.iter().map(|_| None).collect();
    for (idx, result) in rx {
        slots[idx] = Some(result);
    }
    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(FundAdminError::Storage(
                    "scenario worker exited without a result".into(),
                ))
            })
        })
        .collect()
}

impl<S> WaterfallService<S>
where
    S: FundRepository + CalculationStore,
{
    /// Model several candidate distributions against the same fund state.
    ///
    /// The fund is read as of every distinct scenario date in one
    /// `atomically` call, so each scenario sees only the commitments, flows
    /// and prior distributions dated on or before its own date. Scenarios
    /// run in parallel and are stored as `hypothetical` calculations, which
    /// never feed cumulative totals. A failing scenario yields an `Err` in
    /// its slot and leaves the others alone.
    pub fn create_hypothetical_scenario(
        &self,
        fund_id: &str,
        scenarios: &[HypotheticalScenario],
    ) -> FundAdminResult<Vec<FundAdminResult<WaterfallCalculation>>> {
        if scenarios.is_empty() {
            return Err(FundAdminError::invalid(
                "scenarios",
                "At least one scenario is required",
            ));
        }
        let dates: BTreeSet<NaiveDate> = scenarios.iter().map(|s| s.distribution_date).collect();
        let snapshots: SnapshotsByDate = self.store().atomically(fund_id, |store| {
            store.get_fund_terms(fund_id)?;
            Ok(dates
                .into_iter()
                .map(|date| (date, load_snapshot(store, fund_id, date)))
                .collect())
        })?;

        info!(
            "running {} scenario(s) for fund {fund_id} on up to {} worker(s)",
            scenarios.len(),
            self.config().max_scenario_workers
        );
        let outcomes = run_batch(&snapshots, scenarios, self.config());

        Ok(outcomes
            .into_iter()
            .enumerate()
            .map(|(idx, outcome)| {
                let stored = outcome.and_then(|outcome| {
                    self.store()
                        .atomically(fund_id, |store| persist_outcome(store, outcome))
                });
                if let Err(e) = &stored {
                    warn!("scenario {idx} for fund {fund_id} failed: {e}");
                }
                stored
            })
            .collect())
    }
}
