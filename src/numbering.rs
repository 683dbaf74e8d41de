//! Numbering - the facade the record-creation workflow and the admin surface call.

use crate::allocator::{AllocateError, Allocation, Allocator};
use crate::config::NumberingConfig;
use crate::lock::{InMemoryScopeLockManager, ScopeLockManager};
use crate::receipt::ScopeKey;
use crate::repair::{RepairEngine, RepairResult};
use crate::reset::{ResetController, ResetResult};
use crate::scanner::{DiagnosisReport, Scanner};
use crate::store::{DocumentStore, StoreError};

/// Owns a store, a lock manager and configuration, and exposes the numbering
/// operations keyed by owner. Years default to the current UTC year.
///
/// ## Example
///
/// ```ignore
/// let numbering = Numbering::new(InMemoryDocumentStore::new(), NumberingConfig::default());
///
/// let allocation = numbering.allocate("owner-1")?;
/// let report = numbering.diagnose("owner-1")?;
/// if !report.is_consistent() {
///     numbering.repair("owner-1");
/// }
/// ```
pub struct Numbering<S, L = InMemoryScopeLockManager> {
    store: S,
    locks: L,
    config: NumberingConfig,
}

impl<S: DocumentStore> Numbering<S> {
    pub fn new(store: S, config: NumberingConfig) -> Self {
        Self::with_locks(store, InMemoryScopeLockManager::new(), config)
    }
}

impl<S, L> Numbering<S, L>
where
    S: DocumentStore,
    L: ScopeLockManager,
{
    pub fn with_locks(store: S, locks: L, config: NumberingConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Next receipt number for `owner_id` in the current year.
    pub fn allocate(&self, owner_id: &str) -> Result<Allocation, AllocateError> {
        self.allocate_in(&ScopeKey::current(owner_id))
    }

    pub fn allocate_in(&self, scope: &ScopeKey) -> Result<Allocation, AllocateError> {
        Allocator::new(&self.store, &self.locks, &self.config).allocate(scope)
    }

    /// Diagnose `owner_id`'s numbering in the current year.
    pub fn diagnose(&self, owner_id: &str) -> Result<DiagnosisReport, StoreError> {
        self.diagnose_scope(&ScopeKey::current(owner_id))
    }

    pub fn diagnose_scope(&self, scope: &ScopeKey) -> Result<DiagnosisReport, StoreError> {
        Scanner::new(&self.store, &self.config).diagnose(scope)
    }

    /// Renumber every year of `owner_id`.
    pub fn repair(&self, owner_id: &str) -> RepairResult {
        RepairEngine::new(&self.store, &self.locks, &self.config).repair(owner_id)
    }

    /// Zero the current year's counter for `owner_id` and renumber.
    pub fn reset_scope(&self, owner_id: &str) -> ResetResult {
        self.reset(&ScopeKey::current(owner_id))
    }

    pub fn reset(&self, scope: &ScopeKey) -> ResetResult {
        ResetController::new(&self.store, &self.locks, &self.config).reset_scope(scope)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &NumberingConfig {
        &self.config
    }
}
