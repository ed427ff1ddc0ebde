use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

use crate::error::FundAdminError;
use crate::fund::{CapitalFlow, Commitment, FundTerms};
use crate::store::{CalculationStore, FundBook, FundRecord, FundRepository};
use crate::waterfall::audit::AuditEntry;
use crate::waterfall::calculation::{
    CalculationStatus, DistributionEvent, NewCalculation, PaymentStatus, WaterfallCalculation,
};
use crate::waterfall::tiers::TierResult;
use crate::waterfall::validator::ValidationReport;
use crate::FundAdminResult;

fn poisoned<T>(_: PoisonError<T>) -> FundAdminError {
    FundAdminError::Storage("store lock poisoned".into())
}

/// Writes made inside an open `atomically` call, visible only to the
/// thread that opened it until commit.
struct Staging {
    owner: ThreadId,
    calculations: BTreeMap<u64, WaterfallCalculation>,
}

/// Thread-safe in-memory store.
///
/// Each fund has its own lock taken by [`CalculationStore::atomically`].
/// Calculation writes made inside it are staged per fund and merged into
/// the committed map when the closure succeeds. Writes issued outside
/// `atomically` go straight to the committed map and are not isolated.
pub struct InMemoryStore {
    funds: RwLock<BTreeMap<String, FundRecord>>,
    calculations: RwLock<BTreeMap<u64, WaterfallCalculation>>,
    next_id: AtomicU64,
    fund_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    staged: Mutex<HashMap<String, Staging>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore {
            funds: RwLock::new(BTreeMap::new()),
            calculations: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            fund_locks: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_book(book: FundBook) -> FundAdminResult<Self> {
        let store = InMemoryStore::new();
        for fund in book.funds {
            store.upsert_fund(fund)?;
        }
        let next_id = book.calculations.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        {
            let mut calcs = store.calculations.write().map_err(poisoned)?;
            for calc in book.calculations {
                if !store.funds.read().map_err(poisoned)?.contains_key(&calc.fund_id) {
                    return Err(FundAdminError::not_found("fund", &calc.fund_id));
                }
                calcs.insert(calc.id, calc);
            }
        }
        store.next_id.store(next_id, Ordering::SeqCst);
        Ok(store)
    }

    pub fn from_json(json: &str) -> FundAdminResult<Self> {
        let book: FundBook = serde_json::from_str(json)?;
        Self::from_book(book)
    }

    /// Committed contents only; staged writes are not exported.
    pub fn to_book(&self) -> FundAdminResult<FundBook> {
        Ok(FundBook {
            funds: self.funds.read().map_err(poisoned)?.values().cloned().collect(),
            calculations: self
                .calculations
                .read()
                .map_err(poisoned)?
                .values()
                .cloned()
                .collect(),
        })
    }

    pub fn to_json(&self) -> FundAdminResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_book()?)?)
    }

    pub fn upsert_fund(&self, record: FundRecord) -> FundAdminResult<()> {
        record.terms.validate()?;
        for commitment in &record.commitments {
            commitment.validate()?;
        }
        self.funds
            .write()
            .map_err(poisoned)?
            .insert(record.terms.fund_id.clone(), record);
        Ok(())
    }

    fn fund<T>(&self, fund_id: &str, f: impl FnOnce(&FundRecord) -> T) -> FundAdminResult<T> {
        let funds = self.funds.read().map_err(poisoned)?;
        funds
            .get(fund_id)
            .map(f)
            .ok_or_else(|| FundAdminError::not_found("fund", fund_id))
    }

    /// Apply `f` to calculation `id`, in the caller's staging area when the
    /// calculation's fund has an open transaction on this thread.
    fn modify<F>(&self, id: u64, f: F) -> FundAdminResult<()>
    where
        F: FnOnce(&mut WaterfallCalculation) -> FundAdminResult<()>,
    {
        let me = thread::current().id();
        let mut staged = self.staged.lock().map_err(poisoned)?;
        for staging in staged.values_mut().filter(|s| s.owner == me) {
            if let Some(calc) = staging.calculations.get_mut(&id) {
                return f(calc);
            }
        }

        let committed = self
            .calculations
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| FundAdminError::not_found("calculation", id))?;

        if let Some(staging) = staged
            .get_mut(&committed.fund_id)
            .filter(|s| s.owner == me)
        {
            let mut copy = committed;
            f(&mut copy)?;
            staging.calculations.insert(id, copy);
            return Ok(());
        }
        drop(staged);

        let mut calcs = self.calculations.write().map_err(poisoned)?;
        let calc = calcs
            .get_mut(&id)
            .ok_or_else(|| FundAdminError::not_found("calculation", id))?;
        f(calc)
    }
}

impl FundRepository for InMemoryStore {
    fn get_fund_terms(&self, fund_id: &str) -> FundAdminResult<FundTerms> {
        self.fund(fund_id, |f| f.terms.clone())
    }

    fn list_active_commitments(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<Vec<Commitment>> {
        self.fund(fund_id, |f| {
            f.commitments
                .iter()
                .filter(|c| c.is_active_on(as_of))
                .cloned()
                .collect()
        })
    }

    fn list_capital_flows(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<Vec<CapitalFlow>> {
        self.fund(fund_id, |f| {
            f.capital_flows
                .iter()
                .filter(|flow| flow.date <= as_of)
                .cloned()
                .collect()
        })
    }

    fn get_prior_calculations(
        &self,
        fund_id: &str,
        as_of: NaiveDate,
    ) -> FundAdminResult<Vec<WaterfallCalculation>> {
        self.fund(fund_id, |_| ())?;
        let me = thread::current().id();
        let staged = self.staged.lock().map_err(poisoned)?;

        let mut found: BTreeMap<u64, WaterfallCalculation> = self
            .calculations
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|c| c.fund_id == fund_id && c.distribution_date <= as_of)
            .map(|c| (c.id, c.clone()))
            .collect();
        if let Some(staging) = staged.get(fund_id).filter(|s| s.owner == me) {
            for calc in staging
                .calculations
                .values()
                .filter(|c| c.distribution_date <= as_of)
            {
                found.insert(calc.id, calc.clone());
            }
        }
        Ok(found.into_values().collect())
    }
}

impl CalculationStore for InMemoryStore {
    fn create_calculation(&self, header: NewCalculation) -> FundAdminResult<u64> {
        self.fund(&header.fund_id, |_| ())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let calc = WaterfallCalculation::from_new(id, header);

        let me = thread::current().id();
        let mut staged = self.staged.lock().map_err(poisoned)?;
        if let Some(staging) = staged.get_mut(&calc.fund_id).filter(|s| s.owner == me) {
            staging.calculations.insert(id, calc);
            return Ok(id);
        }
        drop(staged);
        self.calculations.write().map_err(poisoned)?.insert(id, calc);
        Ok(id)
    }

    fn attach_tiers(&self, id: u64, tiers: Vec<TierResult>) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            calc.ensure_mutable()?;
            calc.tiers.extend(tiers);
            Ok(())
        })
    }

    fn attach_distribution_events(
        &self,
        id: u64,
        events: Vec<DistributionEvent>,
    ) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            calc.ensure_mutable()?;
            calc.events.extend(events);
            Ok(())
        })
    }

    fn append_audit_entries(&self, id: u64, entries: Vec<AuditEntry>) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            calc.ensure_mutable()?;
            let start = calc.audit_log.len() as u32 + 1;
            for (offset, entry) in entries.iter().enumerate() {
                let expected = start + offset as u32;
                if entry.step_number != expected {
                    return Err(FundAdminError::invalid(
                        "audit_log",
                        format!(
                            "Audit step {} cannot follow step {}",
                            entry.step_number,
                            expected - 1
                        ),
                    ));
                }
            }
            calc.audit_log.extend(entries);
            Ok(())
        })
    }

    fn update_calculation_status(
        &self,
        id: u64,
        status: CalculationStatus,
    ) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            calc.status.ensure_transition(id, status)?;
            debug!("calculation {id}: {} -> {status}", calc.status);
            calc.status = status;
            Ok(())
        })
    }

    fn update_payment_status(&self, id: u64, status: PaymentStatus) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            for event in &mut calc.events {
                event.payment_status = status;
            }
            Ok(())
        })
    }

    fn record_validation(&self, id: u64, report: ValidationReport) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            calc.validation = Some(report);
            Ok(())
        })
    }

    fn record_approval(
        &self,
        id: u64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> FundAdminResult<()> {
        self.modify(id, |calc| {
            if calc.status != CalculationStatus::Calculated {
                return Err(FundAdminError::StateConflict {
                    id,
                    expected: CalculationStatus::Calculated.to_string(),
                    actual: calc.status.to_string(),
                });
            }
            calc.approved_by = Some(approved_by.to_string());
            calc.approved_at = Some(approved_at);
            Ok(())
        })
    }

    fn get_calculation(&self, id: u64) -> FundAdminResult<WaterfallCalculation> {
        let me = thread::current().id();
        let staged = self.staged.lock().map_err(poisoned)?;
        for staging in staged.values().filter(|s| s.owner == me) {
            if let Some(calc) = staging.calculations.get(&id) {
                return Ok(calc.clone());
            }
        }
        self.calculations
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| FundAdminError::not_found("calculation", id))
    }

    fn atomically<T, F>(&self, fund_id: &str, f: F) -> FundAdminResult<T>
    where
        F: FnOnce(&Self) -> FundAdminResult<T>,
    {
        let me = thread::current().id();
        let nested = self
            .staged
            .lock()
            .map_err(poisoned)?
            .get(fund_id)
            .is_some_and(|s| s.owner == me);
        if nested {
            return f(self);
        }

        let fund_lock = {
            let mut locks = self.fund_locks.lock().map_err(poisoned)?;
            Arc::clone(locks.entry(fund_id.to_string()).or_default())
        };
        // The unit lock guards no data, so a poisoned lock is still usable.
        let _guard = fund_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.staged.lock().map_err(poisoned)?.insert(
            fund_id.to_string(),
            Staging {
                owner: me,
                calculations: BTreeMap::new(),
            },
        );
        let result = f(self);
        let staging = self.staged.lock().map_err(poisoned)?.remove(fund_id);

        match result {
            Ok(value) => {
                if let Some(staging) = staging {
                    let count = staging.calculations.len();
                    self.calculations
                        .write()
                        .map_err(poisoned)?
                        .extend(staging.calculations);
                    debug!("fund {fund_id}: committed {count} staged calculation(s)");
                }
                Ok(value)
            }
            Err(e) => {
                debug!("fund {fund_id}: discarded staged writes ({e})");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fund::{load_snapshot, CarryMethod, CommitmentStatus};
    use crate::types::Currency;
    use crate::waterfall::calculation::CalculationType;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_fund(FundRecord {
                terms: FundTerms {
                    fund_id: "F1".into(),
                    name: "Fund I".into(),
                    preferred_return_rate: dec!(8),
                    carried_interest_rate: dec!(20),
                    catch_up_pct: dec!(100),
                    hurdle_tiers: vec![],
                    carry_method: CarryMethod::Standard,
                    currency: Currency::USD,
                    gp_investor_id: "GP".into(),
                    inception_date: d(2022, 1, 1),
                },
                commitments: vec![Commitment {
                    commitment_id: "C1".into(),
                    investor_id: "LP1".into(),
                    commitment_amount: dec!(1000),
                    capital_called: dec!(1000),
                    capital_returned: dec!(0),
                    commitment_date: d(2022, 1, 1),
                    status: CommitmentStatus::Active,
                    withholding_rate_pct: None,
                }],
                capital_flows: vec![],
            })
            .unwrap();
        store
    }

    fn header(store: &InMemoryStore, date: NaiveDate) -> NewCalculation {
        NewCalculation {
            fund_id: "F1".into(),
            calculation_type: CalculationType::Distribution,
            distribution_date: date,
            total_distribution: dec!(100),
            snapshot: load_snapshot(store, "F1", date).unwrap(),
            investor_summaries: BTreeMap::new(),
            warnings: vec![],
            irr: None,
        }
    }

    #[test]
    fn test_unknown_fund_and_calculation() {
        let store = store();
        assert!(matches!(
            store.get_fund_terms("nope"),
            Err(FundAdminError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_calculation(99),
            Err(FundAdminError::NotFound { .. })
        ));
    }

    #[test]
    fn test_attach_after_draft_conflicts() {
        let store = store();
        let id = store.create_calculation(header(&store, d(2023, 1, 1))).unwrap();
        store.attach_tiers(id, vec![]).unwrap();
        store
            .update_calculation_status(id, CalculationStatus::Calculated)
            .unwrap();
        assert!(matches!(
            store.attach_tiers(id, vec![]),
            Err(FundAdminError::StateConflict { .. })
        ));
        assert!(matches!(
            store.update_calculation_status(id, CalculationStatus::Distributed),
            Err(FundAdminError::StateConflict { .. })
        ));
    }

    #[test]
    fn test_failed_transaction_leaves_nothing_behind() {
        let store = store();
        let result: FundAdminResult<()> = store.atomically("F1", |s| {
            let id = s.create_calculation(header(s, d(2023, 1, 1)))?;
            assert!(s.get_calculation(id).is_ok());
            Err(FundAdminError::invalid("test", "abort"))
        });
        assert!(result.is_err());
        assert!(store.to_book().unwrap().calculations.is_empty());
    }

    #[test]
    fn test_successful_transaction_commits() {
        let store = store();
        let id = store
            .atomically("F1", |s| {
                let id = s.create_calculation(header(s, d(2023, 1, 1)))?;
                s.update_calculation_status(id, CalculationStatus::Calculated)?;
                Ok(id)
            })
            .unwrap();
        assert_eq!(
            store.get_calculation(id).unwrap().status,
            CalculationStatus::Calculated
        );
    }

    #[test]
    fn test_prior_calculations_filtered_by_fund_and_date() {
        let store = store();
        store.create_calculation(header(&store, d(2023, 1, 1))).unwrap();
        store.create_calculation(header(&store, d(2023, 6, 1))).unwrap();
        assert_eq!(
            store.get_prior_calculations("F1", d(2023, 3, 1)).unwrap().len(),
            1
        );
        assert_eq!(
            store.get_prior_calculations("F1", d(2023, 6, 1)).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_book_round_trip_keeps_id_sequence() {
        let store = store();
        let first = store.create_calculation(header(&store, d(2023, 1, 1))).unwrap();
        let json = store.to_json().unwrap();

        let reloaded = InMemoryStore::from_json(&json).unwrap();
        let second = reloaded
            .create_calculation(header(&reloaded, d(2023, 2, 1)))
            .unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_concurrent_transactions_on_one_fund_both_commit() {
        let store = store();
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    store
                        .atomically("F1", |s| s.create_calculation(header(s, d(2023, 1, 1))))
                        .unwrap();
                });
            }
        });
        assert_eq!(store.to_book().unwrap().calculations.len(), 2);
    }
}
