//! Shared fixtures: a fault-injecting store and record seeding helpers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use receipt_numbering::{
    Counter, Document, DocumentStore, InMemoryDocumentStore, NumberingConfig, Record, Records,
    RetryConfig, StoreError, Versioned,
};

/// Wraps an [`InMemoryDocumentStore`] and fails selected operations.
///
/// - `take_counters_offline` makes every counter read and write fail with
///   `Unavailable`, as if the backend dropped the transaction path.
/// - `fail_writes_to` makes conditional writes to one record fail.
/// - `inject_conflicts` makes the next N counter writes report a concurrent
///   writer, exercising the transaction retry loop.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryDocumentStore,
    counters_offline: Arc<AtomicBool>,
    records_offline: Arc<AtomicBool>,
    failing_records: Arc<Mutex<HashSet<String>>>,
    pending_conflicts: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_counters_offline(&self) {
        self.counters_offline.store(true, Ordering::SeqCst);
    }

    pub fn take_records_offline(&self) {
        self.records_offline.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes_to(&self, record_id: &str) {
        self.failing_records
            .lock()
            .unwrap()
            .insert(record_id.to_string());
    }

    pub fn inject_conflicts(&self, count: usize) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn check<D: Document>(&self) -> Result<(), StoreError> {
        if D::COLLECTION == Counter::COLLECTION && self.counters_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("counter backend offline".into()));
        }
        if D::COLLECTION == Record::COLLECTION && self.records_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("record backend offline".into()));
        }
        Ok(())
    }

    fn check_write<D: Document>(&self, id: &str) -> Result<(), StoreError> {
        self.check::<D>()?;
        if D::COLLECTION == Record::COLLECTION && self.failing_records.lock().unwrap().contains(id) {
            return Err(StoreError::Unavailable(format!("write to {} rejected", id)));
        }
        if D::COLLECTION == Counter::COLLECTION {
            let injected = self
                .pending_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StoreError::Conflict {
                    collection: D::COLLECTION.to_string(),
                    id: id.to_string(),
                    expected: 0,
                    actual: 0,
                });
            }
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn get<D: Document>(&self, id: &str) -> Result<Option<Versioned<D>>, StoreError> {
        self.check::<D>()?;
        self.inner.get(id)
    }

    fn insert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError> {
        self.check_write::<D>(doc.id())?;
        self.inner.insert(doc)
    }

    fn upsert<D: Document>(&self, doc: &D) -> Result<Versioned<D>, StoreError> {
        self.check_write::<D>(doc.id())?;
        self.inner.upsert(doc)
    }

    fn update<D: Document>(&self, doc: &D, expected_version: u64) -> Result<Versioned<D>, StoreError> {
        self.check_write::<D>(doc.id())?;
        self.inner.update(doc, expected_version)
    }

    fn find<D: Document>(
        &self,
        predicate: &dyn Fn(&D) -> bool,
    ) -> Result<Vec<Versioned<D>>, StoreError> {
        self.check::<D>()?;
        self.inner.find(predicate)
    }
}

/// Retry budget small enough to keep failing tests fast.
pub fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
    }
}

pub fn config() -> NumberingConfig {
    NumberingConfig::default().with_retry(quick_retry())
}

pub fn instant(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}

/// Insert one record per entry, created an hour apart starting at `start`.
/// Ids are `"<owner>-<yyyymmdd of start>-<index>"`, so seeding the same owner
/// from different start dates never collides.
pub fn seed<S: DocumentStore>(
    store: &S,
    owner: &str,
    start: DateTime<Utc>,
    numbers: &[Option<&str>],
) -> Vec<String> {
    let retry = quick_retry();
    let records = Records::new(store, &retry);
    numbers
        .iter()
        .enumerate()
        .map(|(i, number)| {
            let mut record = Record::new(
                format!("{}-{}-{}", owner, start.format("%Y%m%d"), i),
                owner,
                start + Duration::hours(i as i64),
            );
            record.receipt_number = number.map(str::to_string);
            records.insert(&record).unwrap();
            record.id
        })
        .collect()
}

pub fn receipt_of<S: DocumentStore>(store: &S, id: &str) -> Option<String> {
    let retry = quick_retry();
    Records::new(store, &retry)
        .get(id)
        .unwrap()
        .and_then(|r| r.receipt_number)
}
