//! In-memory implementation of the per-activeflow lease lock
//!
//! Leases live in a process-local map, so this only serializes advances
//! within one process. Expired leases are taken over on the next acquire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use async_trait::async_trait;
use tracing::{debug, trace};

use activeflow_core::{
    CoreError,
    domain::activeflow::ActiveflowId,
    domain::lock::{LeaseLock, LeaseToken},
};

/// A held lease
struct Lease {
    /// Token of the holder
    token: LeaseToken,
    /// When the lease lapses
    expires_at: Instant,
}

/// In-memory implementation of LeaseLock
#[derive(Clone, Default)]
pub struct InMemoryLeaseLock {
    leases: Arc<Mutex<HashMap<ActiveflowId, Lease>>>,
}

impl InMemoryLeaseLock {
    /// Create a new in-memory lease lock
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseLock for InMemoryLeaseLock {
    async fn acquire(&self, id: &ActiveflowId, ttl: Duration) -> Result<LeaseToken, CoreError> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(lease) = leases.get(id) {
            if now < lease.expires_at {
                trace!(activeflow_id = %id, "Lease held");
                return Err(CoreError::LockUnavailable(id.to_string()));
            }
            debug!(activeflow_id = %id, "Taking over expired lease");
        }

        let token = LeaseToken::new();
        leases.insert(
            *id,
            Lease {
                token,
                expires_at: now + ttl,
            },
        );
        Ok(token)
    }

    async fn release(&self, id: &ActiveflowId, token: &LeaseToken) -> Result<(), CoreError> {
        let mut leases = self.leases.lock().await;
        match leases.get(id) {
            Some(lease) if lease.token == *token => {
                leases.remove(id);
            }
            _ => {
                debug!(activeflow_id = %id, "Release with a stale token ignored");
            }
        }
        Ok(())
    }
}
