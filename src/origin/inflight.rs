//! Single-flight registry for origin fetches.
//!
//! Membership is a fail-fast test-and-set: the first caller for a key gets an
//! [`InFlightGuard`], every concurrent caller for the same key gets `None`
//! until that guard is dropped. Dropping the guard releases the key on every
//! exit path, including panics and aborted tasks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-wide set of keys (source URLs) currently being fetched.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    keys: Mutex<HashSet<String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `key`.
    ///
    /// Returns `None` if the key is already claimed.
    pub fn try_acquire(self: &Arc<Self>, key: &str) -> Option<InFlightGuard> {
        if self.lock().insert(key.to_string()) {
            Some(InFlightGuard {
                registry: Arc::clone(self),
                key: key.to_string(),
            })
        } else {
            None
        }
    }

    /// Release `key`. Normally called by [`InFlightGuard`]'s drop.
    pub fn release(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-operation
        self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Claim on a key in an [`InFlightRegistry`]; releases it when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
