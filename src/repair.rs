//! Repair engine: deterministic renumbering of all of an owner's records.
//!
//! Records are partitioned by attribution year (order date, else creation
//! date), ordered by creation time within each year, and numbered `1..=N` in
//! that order. Ties keep the store's iteration order. Each year's counter is
//! then set to `N` so online allocation continues after the repaired run.
//! The old-to-new number mapping is not kept.
//!
//! A record whose write fails keeps its previous number and does not consume
//! a sequence value, so the records that were rewritten always form a dense
//! run in creation order. Running the repair again finishes the job.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::NumberingConfig;
use crate::counter::Counters;
use crate::lock::{ScopeGuard, ScopeLockManager};
use crate::receipt::{ReceiptNumber, ScopeKey};
use crate::records::{Record, Records};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub records: usize,
    pub counter_synced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairResult {
    /// Records whose new number was written.
    pub fixed: usize,
    /// Records the pass tried to renumber.
    pub total: usize,
    pub errors: Vec<String>,
    pub years: Vec<YearSummary>,
}

impl RepairResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct RepairEngine<'a, S, L> {
    store: &'a S,
    locks: &'a L,
    config: &'a NumberingConfig,
}

impl<'a, S, L> RepairEngine<'a, S, L>
where
    S: DocumentStore,
    L: ScopeLockManager,
{
    pub fn new(store: &'a S, locks: &'a L, config: &'a NumberingConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Renumber every record of `owner_id` while holding the owner's scope lock.
    pub fn repair(&self, owner_id: &str) -> RepairResult {
        let _guard = match ScopeGuard::acquire(self.locks, owner_id, self.config.lock_timeout()) {
            Ok(guard) => guard,
            Err(err) => {
                return RepairResult {
                    errors: vec![format!("could not lock {}: {}", owner_id, err)],
                    ..RepairResult::default()
                }
            }
        };
        self.renumber(owner_id)
    }

    /// The repair pass proper. Callers must already hold the owner's lock.
    pub(crate) fn renumber(&self, owner_id: &str) -> RepairResult {
        let records = Records::new(self.store, &self.config.retry);
        let counters = Counters::new(self.store, &self.config.retry);
        let mut result = RepairResult::default();

        let owned = match records.query_by_owner(owner_id) {
            Ok(owned) => owned,
            Err(err) => {
                warn!(owner = %owner_id, error = %err, "repair could not load records");
                result.errors.push(format!("failed to load records: {}", err));
                return result;
            }
        };

        for (year, mut partition) in partition_by_year(owned) {
            partition.sort_by_key(|r| r.created_at);
            result.total += partition.len();

            let mut next_seq: u32 = 1;
            for record in &partition {
                let number = ReceiptNumber::new(self.config.prefix.as_str(), next_seq, year);
                match records.set_receipt_number(&record.id, &number) {
                    Ok(()) => {
                        result.fixed += 1;
                        next_seq += 1;
                    }
                    Err(err) => {
                        warn!(record = %record.id, number = %number, error = %err, "failed to renumber record");
                        result.errors.push(format!("{}: {}", record.id, err));
                    }
                }
            }

            let scope = ScopeKey::new(owner_id, year);
            let counter_synced = match counters.set(&scope, partition.len() as u32) {
                Ok(_) => true,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "failed to resynchronize counter");
                    result
                        .errors
                        .push(format!("counter {}: {}", scope, err));
                    false
                }
            };

            result.years.push(YearSummary {
                year,
                records: partition.len(),
                counter_synced,
            });
        }

        info!(
            owner = %owner_id,
            fixed = result.fixed,
            total = result.total,
            errors = result.errors.len(),
            "repair finished"
        );
        result
    }
}

fn partition_by_year(records: Vec<Record>) -> BTreeMap<i32, Vec<Record>> {
    let mut years: BTreeMap<i32, Vec<Record>> = BTreeMap::new();
    for record in records {
        years.entry(record.attribution_year()).or_default().push(record);
    }
    years
}
