use crate::config::EngineConfig;
use crate::domain::activeflow::ActiveflowId;
use crate::domain::lock::{LeaseLock, LeaseToken};
use crate::CoreError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The per-activeflow lease with the configured TTL and retry policy.
///
/// Record and variable writes share one lease per activeflow.
#[derive(Clone)]
pub struct Lease {
    lock: Arc<dyn LeaseLock>,
    ttl: Duration,
    retry_count: u32,
    retry_interval: Duration,
}

impl Lease {
    /// Wrap a lock with the lease settings of `config`
    pub fn new(lock: Arc<dyn LeaseLock>, config: &EngineConfig) -> Self {
        Self {
            lock,
            ttl: config.lock_ttl,
            retry_count: config.lock_retry_count,
            retry_interval: config.lock_retry_interval,
        }
    }

    /// Take the lease, retrying while it is busy
    pub async fn acquire(&self, id: &ActiveflowId) -> Result<LeaseToken, CoreError> {
        let mut attempt = 0;
        loop {
            match self.lock.acquire(id, self.ttl).await {
                Ok(token) => return Ok(token),
                Err(e) if e.is_transient() && attempt < self.retry_count => {
                    attempt += 1;
                    debug!(activeflow_id = %id, attempt, "Lease busy, retrying");
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Give the lease back. Failures are logged; the lease expires anyway.
    pub async fn release(&self, id: &ActiveflowId, token: &LeaseToken) {
        if let Err(e) = self.lock.release(id, token).await {
            warn!(activeflow_id = %id, error = %e, "Could not release lease");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lock::MockLeaseLock;
    use mockall::Sequence;

    fn config(retry_count: u32) -> EngineConfig {
        EngineConfig {
            lock_retry_count: retry_count,
            lock_retry_interval: Duration::from_millis(1),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_acquire_succeeds_after_busy() {
        let token = LeaseToken::new();
        let mut seq = Sequence::new();
        let mut lock = MockLeaseLock::new();
        lock.expect_acquire()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, _| Err(CoreError::LockUnavailable(id.to_string())));
        lock.expect_acquire()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(token));

        let lease = Lease::new(Arc::new(lock), &config(3));
        assert_eq!(lease.acquire(&ActiveflowId::new()).await.unwrap(), token);
    }

    #[tokio::test]
    async fn test_acquire_does_not_retry_hard_errors() {
        let mut lock = MockLeaseLock::new();
        lock.expect_acquire()
            .times(1)
            .returning(|_, _| Err(CoreError::StateStoreError("down".to_string())));

        let lease = Lease::new(Arc::new(lock), &config(3));
        let err = lease.acquire(&ActiveflowId::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::StateStoreError(_)));
    }

    #[tokio::test]
    async fn test_release_failure_is_swallowed() {
        let mut lock = MockLeaseLock::new();
        lock.expect_release()
            .times(1)
            .returning(|_, _| Err(CoreError::StateStoreError("down".to_string())));

        let lease = Lease::new(Arc::new(lock), &config(0));
        lease.release(&ActiveflowId::new(), &LeaseToken::new()).await;
    }
}
