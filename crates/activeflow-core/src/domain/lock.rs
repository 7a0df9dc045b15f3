use crate::domain::activeflow::ActiveflowId;
use crate::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Proof of holding a lease. Only the holder's token releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseToken(pub Uuid);

impl LeaseToken {
    /// Generate a fresh token
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LeaseToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-activeflow mutual exclusion with a lease timeout.
///
/// A lease that is not released expires after its TTL, so a crashed holder
/// cannot wedge the activeflow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaseLock: Send + Sync {
    /// Take the lease, failing with `CoreError::LockUnavailable` while
    /// another unexpired lease is held.
    async fn acquire(&self, id: &ActiveflowId, ttl: Duration) -> Result<LeaseToken, CoreError>;

    /// Give the lease back. Releasing with a stale token is a no-op.
    async fn release(&self, id: &ActiveflowId, token: &LeaseToken) -> Result<(), CoreError>;
}
