//! Shared request quota.
//!
//! # States
//! ```text
//! remaining < 0   unlimited, every request accepted, never decremented
//! remaining == 0  every gated request rejected
//! remaining > 0   accept and decrement
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Quota value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Remaining number of requests the gate will admit.
///
/// Every accessor takes the same lock for the whole read or read-modify-write,
/// so concurrent callers can never spend the same unit twice.
#[derive(Debug)]
pub struct Quota {
    remaining: Mutex<i64>,
}

impl Quota {
    pub fn new(remaining: i64) -> Self {
        Self {
            remaining: Mutex::new(remaining),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(UNLIMITED)
    }

    /// Replace the counter. Any value is accepted.
    pub fn set(&self, remaining: i64) {
        *self.lock() = remaining;
    }

    pub fn get(&self) -> i64 {
        *self.lock()
    }

    /// Consume one unit if available.
    ///
    /// Returns `true` when the request may proceed. An unlimited quota is
    /// never decremented; an exhausted one stays at zero.
    pub fn accept_request(&self) -> bool {
        let mut remaining = self.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        *remaining < 0
    }

    // The critical sections only touch an i64 and cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, i64> {
        self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::unlimited()
    }
}
