//! Advisory per-owner locks between repair and allocation.
//!
//! A [`ScopeLockManager`] hands out one lock per owner. Repair and reset hold
//! it for their whole pass. Allocation holds it only around its counter
//! increment, so it cannot run while a renumbering is writing records.
//!
//! The fence is partial. The caller saves the new record after the guard
//! is dropped, so a repair that starts in that window does not see the
//! record, sets the counter to its own count, and the next allocation can
//! hand out the same number again. Diagnosis reports the duplicate and a
//! later repair clears it.
//!
//! Every acquisition is bounded by a timeout. A lock that cannot be taken in
//! time is a [`LockError::Timeout`], never an indefinite wait. The in-memory
//! manager fences one process. A distributed manager (Redis, Postgres
//! advisory locks, a lease document) extends the fence across processes.

mod in_memory;

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub use in_memory::{InMemoryScopeLock, InMemoryScopeLockManager};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying primitive was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    /// Somebody else held the lock for longer than the caller would wait.
    #[error("lock {key} not acquired within {waited_ms}ms")]
    Timeout { key: String, waited_ms: u64 },
    #[error("lock acquire failed: {0}")]
    AcquireFailed(String),
    #[error("lock release failed: {0}")]
    ReleaseFailed(String),
}

impl LockError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}

/// Handle on one owner's lock.
pub trait ScopeLock: Send + Sync {
    /// Take the lock if it is free right now.
    fn try_lock(&self) -> Result<bool, LockError>;

    /// Wait at most `timeout` for the lock. `Ok(false)` when the deadline passed.
    fn lock_within(&self, timeout: Duration) -> Result<bool, LockError>;

    fn unlock(&self) -> Result<(), LockError>;
}

/// Factory for per-owner lock handles. Handles for the same key must
/// exclude each other.
pub trait ScopeLockManager: Send + Sync {
    type Lock: ScopeLock;

    fn get_lock(&self, key: &str) -> Result<Self::Lock, LockError>;
}

/// Holds a scope lock until dropped.
pub struct ScopeGuard<L: ScopeLock> {
    key: String,
    lock: L,
}

impl<L: ScopeLock> ScopeGuard<L> {
    /// Wait up to `timeout` for the lock on `key`.
    pub fn acquire<M>(manager: &M, key: &str, timeout: Duration) -> Result<Self, LockError>
    where
        M: ScopeLockManager<Lock = L>,
    {
        let lock = manager.get_lock(key)?;
        if !lock.lock_within(timeout)? {
            return Err(LockError::Timeout {
                key: key.to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }
        Ok(Self {
            key: key.to_string(),
            lock,
        })
    }

    /// Take the lock on `key` only if nobody holds it.
    pub fn try_acquire<M>(manager: &M, key: &str) -> Result<Option<Self>, LockError>
    where
        M: ScopeLockManager<Lock = L>,
    {
        let lock = manager.get_lock(key)?;
        if !lock.try_lock()? {
            return Ok(None);
        }
        Ok(Some(Self {
            key: key.to_string(),
            lock,
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<L: ScopeLock> Drop for ScopeGuard<L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            warn!(key = %self.key, error = %err, "failed to release scope lock");
        }
    }
}
