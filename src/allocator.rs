//! Sequential allocator: hands out the next receipt number of a scope.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FallbackPolicy, NumberingConfig};
use crate::counter::Counters;
use crate::lock::{LockError, ScopeGuard, ScopeLockManager};
use crate::receipt::{ReceiptNumber, ScopeKey};
use crate::records::Records;
use crate::store::{DocumentStore, StoreError};

/// Which path produced an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Committed through the counter transaction. Unique within the scope.
    Primary,
    /// Derived from a scan of existing records after the counter transaction
    /// failed. Only safe against a single writer; may duplicate under
    /// concurrency and is not reflected in the counter.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub number: ReceiptNumber,
    pub mode: AllocationMode,
}

impl Allocation {
    pub fn is_degraded(&self) -> bool {
        self.mode == AllocationMode::Degraded
    }
}

#[derive(Debug, Error)]
pub enum AllocateError {
    /// The counter transaction failed and the fallback is disabled.
    #[error("counter transaction for {scope} failed: {source}")]
    Counter {
        scope: ScopeKey,
        #[source]
        source: StoreError,
    },
    /// Both the counter transaction and the record scan failed.
    #[error("counter transaction for {scope} failed ({counter}) and the record scan failed too: {source}")]
    Unavailable {
        scope: ScopeKey,
        counter: StoreError,
        #[source]
        source: StoreError,
    },
    /// The scope lock could not be taken and the fallback is disabled.
    #[error("scope lock for {scope} unavailable: {source}")]
    Lock {
        scope: ScopeKey,
        #[source]
        source: LockError,
    },
    #[error("sequence space of {0} is exhausted")]
    Exhausted(ScopeKey),
}

/// Allocates receipt numbers. Call once per record, never twice for the same record.
pub struct Allocator<'a, S, L> {
    store: &'a S,
    locks: &'a L,
    config: &'a NumberingConfig,
}

impl<'a, S, L> Allocator<'a, S, L>
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

    /// Allocate the next number of `scope`.
    ///
    /// The owner's lock is held around the counter increment. When it cannot
    /// be taken in time the `ScanRecords` policy still increments the counter,
    /// unfenced, and `Fail` returns [`AllocateError::Lock`].
    pub fn allocate(&self, scope: &ScopeKey) -> Result<Allocation, AllocateError> {
        let _guard = match ScopeGuard::acquire(self.locks, &scope.owner_id, self.config.lock_timeout()) {
            Ok(guard) => Some(guard),
            Err(source) => match self.config.fallback {
                FallbackPolicy::Fail => {
                    return Err(AllocateError::Lock {
                        scope: scope.clone(),
                        source,
                    })
                }
                FallbackPolicy::ScanRecords => {
                    warn!(
                        scope = %scope,
                        error = %source,
                        "scope lock unavailable, allocating without it"
                    );
                    None
                }
            },
        };

        let counters = Counters::new(self.store, &self.config.retry);
        match counters.increment(scope) {
            Ok(seq) => {
                let number = ReceiptNumber::new(self.config.prefix.as_str(), seq, scope.year);
                debug!(scope = %scope, number = %number, "allocated receipt number");
                Ok(Allocation {
                    number,
                    mode: AllocationMode::Primary,
                })
            }
            Err(counter) => match self.config.fallback {
                FallbackPolicy::Fail => Err(AllocateError::Counter {
                    scope: scope.clone(),
                    source: counter,
                }),
                FallbackPolicy::ScanRecords => self.allocate_degraded(scope, counter),
            },
        }
    }

    fn allocate_degraded(
        &self,
        scope: &ScopeKey,
        counter: StoreError,
    ) -> Result<Allocation, AllocateError> {
        warn!(
            scope = %scope,
            error = %counter,
            "counter transaction failed, allocating from a record scan (degraded mode)"
        );

        let highest = match self.highest_in_scope(scope) {
            Ok(highest) => highest,
            Err(source) => {
                return Err(AllocateError::Unavailable {
                    scope: scope.clone(),
                    counter,
                    source,
                })
            }
        };
        let seq = highest
            .checked_add(1)
            .ok_or_else(|| AllocateError::Exhausted(scope.clone()))?;

        let number = ReceiptNumber::new(self.config.prefix.as_str(), seq, scope.year);
        warn!(scope = %scope, number = %number, "allocated receipt number in degraded mode");
        Ok(Allocation {
            number,
            mode: AllocationMode::Degraded,
        })
    }

    /// Highest sequence among the scope's parseable, same-year receipt numbers.
    fn highest_in_scope(&self, scope: &ScopeKey) -> Result<u32, StoreError> {
        let records = Records::new(self.store, &self.config.retry).query_by_owner(&scope.owner_id)?;

        let mut highest = 0;
        for record in &records {
            match record.parsed_receipt() {
                Some(Ok(number)) if number.year() == scope.year => {
                    highest = highest.max(number.seq());
                }
                Some(Ok(_)) | None => {}
                Some(Err(err)) => {
                    debug!(record = %record.id, error = %err, "skipping unparsable receipt number");
                }
            }
        }
        Ok(highest)
    }
}
