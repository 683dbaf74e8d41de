//! Counter documents and the counter store adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::receipt::ScopeKey;
use crate::store::{run_transaction, DocumentStore, StoreError};
use crate::Document;

/// Last number handed out in one scope. Created lazily on first allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Document)]
#[document(collection = "receipt_counters")]
pub struct Counter {
    pub id: String,
    pub owner_id: String,
    pub year: i32,
    pub last_number: u32,
    pub last_updated: DateTime<Utc>,
}

impl Counter {
    fn new(scope: &ScopeKey, last_number: u32) -> Self {
        Self {
            id: scope.document_id(),
            owner_id: scope.owner_id.clone(),
            year: scope.year,
            last_number,
            last_updated: Utc::now(),
        }
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.owner_id.clone(), self.year)
    }
}

/// Typed access to the counter collection of a [`DocumentStore`].
///
/// Holds no state of its own; every read goes to the store so no client-side
/// copy of the last number can drift from it.
pub struct Counters<'a, S> {
    store: &'a S,
    retry: &'a RetryConfig,
}

impl<'a, S: DocumentStore> Counters<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Atomically bump the scope's counter and return the new value.
    ///
    /// An absent counter counts as zero, so the first call returns 1.
    pub fn increment(&self, scope: &ScopeKey) -> Result<u32, StoreError> {
        let id = scope.document_id();
        let committed = run_transaction(self.store, &id, self.retry, |current: Option<Counter>| {
            let last = current.map(|c| c.last_number).unwrap_or(0);
            let next = last
                .checked_add(1)
                .ok_or_else(|| StoreError::Storage(format!("counter {} overflowed", id)))?;
            Ok(Counter::new(scope, next))
        })?;
        Ok(committed.data.last_number)
    }

    pub fn get(&self, scope: &ScopeKey) -> Result<Option<Counter>, StoreError> {
        Ok(self
            .store
            .get::<Counter>(&scope.document_id())?
            .map(|v| v.data))
    }

    /// Overwrite the scope's counter unconditionally.
    pub fn set(&self, scope: &ScopeKey, last_number: u32) -> Result<Counter, StoreError> {
        Ok(self.store.upsert(&Counter::new(scope, last_number))?.data)
    }
}
