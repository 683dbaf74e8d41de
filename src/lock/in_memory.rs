use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::{LockError, ScopeLock, ScopeLockManager};

/// Keys currently held, shared by every handle of one manager.
#[derive(Default)]
struct HeldKeys {
    keys: Mutex<HashSet<String>>,
    released: Condvar,
}

fn poisoned<T>(err: PoisonError<T>) -> LockError {
    LockError::Poisoned(err.to_string())
}

/// One handle on an owner's key. Releases the key when dropped while held.
pub struct InMemoryScopeLock {
    key: String,
    held: Arc<HeldKeys>,
    owned: AtomicBool,
}

impl InMemoryScopeLock {
    fn claim(&self, keys: &mut HashSet<String>) -> bool {
        if !keys.insert(self.key.clone()) {
            return false;
        }
        self.owned.store(true, Ordering::SeqCst);
        true
    }
}

impl ScopeLock for InMemoryScopeLock {
    fn try_lock(&self) -> Result<bool, LockError> {
        let mut keys = self.held.keys.lock().map_err(poisoned)?;
        Ok(self.claim(&mut keys))
    }

    fn lock_within(&self, timeout: Duration) -> Result<bool, LockError> {
        let keys = self.held.keys.lock().map_err(poisoned)?;
        let (mut keys, _) = self
            .held
            .released
            .wait_timeout_while(keys, timeout, |keys| keys.contains(&self.key))
            .map_err(poisoned)?;
        Ok(self.claim(&mut keys))
    }

    fn unlock(&self) -> Result<(), LockError> {
        if !self.owned.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut keys = self.held.keys.lock().map_err(poisoned)?;
        keys.remove(&self.key);
        self.held.released.notify_all();
        Ok(())
    }
}

impl Drop for InMemoryScopeLock {
    fn drop(&mut self) {
        let _ = self.unlock();
    }
}

/// Process-local lock manager. Clones share the same held-key table, so a
/// clone handed to [`Numbering`](crate::Numbering) fences against the original.
#[derive(Clone, Default)]
pub struct InMemoryScopeLockManager {
    held: Arc<HeldKeys>,
}

impl InMemoryScopeLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopeLockManager for InMemoryScopeLockManager {
    type Lock = InMemoryScopeLock;

    fn get_lock(&self, key: &str) -> Result<InMemoryScopeLock, LockError> {
        Ok(InMemoryScopeLock {
            key: key.to_string(),
            held: Arc::clone(&self.held),
            owned: AtomicBool::new(false),
        })
    }
}
