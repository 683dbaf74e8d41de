//! Reset controller: zero a scope's counter, then force a full repair.
//!
//! Confirmation is the caller's job; by the time `reset_scope` runs the
//! operator has already agreed to lose the old numbering.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::NumberingConfig;
use crate::counter::Counters;
use crate::lock::{ScopeGuard, ScopeLockManager};
use crate::receipt::ScopeKey;
use crate::repair::{RepairEngine, RepairResult};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetResult {
    pub success: bool,
    pub message: String,
    /// `None` when the reset stopped before the repair pass.
    pub repair: Option<RepairResult>,
}

impl ResetResult {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            repair: None,
        }
    }
}

pub struct ResetController<'a, S, L> {
    store: &'a S,
    locks: &'a L,
    config: &'a NumberingConfig,
}

impl<'a, S, L> ResetController<'a, S, L>
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

    /// Zero the counter and renumber, even if the counter already looks right.
    pub fn reset_scope(&self, scope: &ScopeKey) -> ResetResult {
        let _guard = match ScopeGuard::acquire(self.locks, &scope.owner_id, self.config.lock_timeout()) {
            Ok(guard) => guard,
            Err(err) => return ResetResult::failed(format!("Could not lock {}: {}", scope, err)),
        };

        if let Err(err) = Counters::new(self.store, &self.config.retry).set(scope, 0) {
            warn!(scope = %scope, error = %err, "failed to zero counter");
            return ResetResult::failed(format!("Failed to reset counter for {}: {}", scope, err));
        }

        let repair = RepairEngine::new(self.store, self.locks, self.config).renumber(&scope.owner_id);
        let success = repair.is_complete();
        let message = if success {
            format!(
                "Counter for {} reset; renumbered {} of {} records",
                scope, repair.fixed, repair.total
            )
        } else {
            format!(
                "Counter for {} reset; renumbered {} of {} records, {} errors",
                scope,
                repair.fixed,
                repair.total,
                repair.errors.len()
            )
        };

        info!(scope = %scope, success, fixed = repair.fixed, total = repair.total, "scope reset");
        ResetResult {
            success,
            message,
            repair: Some(repair),
        }
    }
}
