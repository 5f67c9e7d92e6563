//! Per-credential "pass running" registry
//!
//! At most one pass touches a courier account at a time. A second pass
//! asking for the same credential is turned away instead of queued; the
//! caller records the group as coalesced.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use ordersync_core::domain::CredentialKey;

/// Shared set of credentials with a pass in flight
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    running: Arc<DashMap<CredentialKey, Instant>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the credential, or returns `None` if a pass already holds it
    ///
    /// The claim is released when the returned guard is dropped.
    pub fn try_acquire(&self, key: CredentialKey) -> Option<InFlightGuard> {
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => {
                trace!(credential = %key, "Credential already in flight");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                trace!(credential = %key, "Credential claimed");
                Some(InFlightGuard {
                    running: Arc::clone(&self.running),
                    key,
                })
            }
        }
    }

    pub fn is_running(&self, key: &CredentialKey) -> bool {
        self.running.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

/// Releases a credential claim on drop
pub struct InFlightGuard {
    running: Arc<DashMap<CredentialKey, Instant>>,
    key: CredentialKey,
}

impl InFlightGuard {
    pub fn key(&self) -> &CredentialKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((_, since)) = self.running.remove(&self.key) {
            trace!(
                credential = %self.key,
                held_ms = since.elapsed().as_millis() as u64,
                "Credential released"
            );
        }
    }
}
