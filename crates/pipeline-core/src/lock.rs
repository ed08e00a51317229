//! Per-user generation locks.
//!
//! At most one turn per user may be generating at a time. The lock is an
//! add-if-absent entry with a TTL so a crashed worker can never wedge a
//! user permanently; an expired entry is reclaimable by the next acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct GenerationLocks {
    held: Arc<Mutex<HashMap<i64, Instant>>>,
    ttl: Duration,
}

impl Default for GenerationLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            held: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Atomic add-if-absent. Returns false while another unexpired holder
    /// exists; taking over an expired entry is allowed (the stale worker's
    /// eventual release is harmless, see `release`).
    pub fn try_acquire(&self, user_id: i64) -> bool {
        let mut held = self.held.lock().expect("lock table poisoned");
        match held.get(&user_id) {
            Some(acquired) if acquired.elapsed() < self.ttl => false,
            _ => {
                held.insert(user_id, Instant::now());
                true
            }
        }
    }

    /// Unconditional and idempotent; releasing an unheld lock is a no-op.
    pub fn release(&self, user_id: i64) {
        self.held.lock().expect("lock table poisoned").remove(&user_id);
    }
}

/// Releases the lock when the owning worker finishes, on any outcome.
pub struct LockGuard {
    locks: GenerationLocks,
    user_id: i64,
}

impl LockGuard {
    pub fn new(locks: GenerationLocks, user_id: i64) -> Self {
        Self { locks, user_id }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.release(self.user_id);
    }
}
