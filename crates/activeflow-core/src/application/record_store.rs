use crate::application::lease::Lease;
use crate::config::EngineConfig;
use crate::domain::activeflow::{Activeflow, ActiveflowId};
use crate::domain::lock::{LeaseLock, LeaseToken};
use crate::domain::repository::{ActiveflowFilter, ActiveflowRepository, Page};
use crate::CoreError;
use std::sync::Arc;

/// Activeflow records plus the per-activeflow lease lock.
///
/// Every read-modify-write of a record happens between `acquire` and
/// `release` of its lease.
pub struct ActiveflowStore {
    repo: Arc<dyn ActiveflowRepository>,
    lease: Lease,
}

impl ActiveflowStore {
    /// Create a store
    pub fn new(
        repo: Arc<dyn ActiveflowRepository>,
        lock: Arc<dyn LeaseLock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            lease: Lease::new(lock, config),
        }
    }

    /// Insert a new record
    pub async fn create(&self, activeflow: &Activeflow) -> Result<(), CoreError> {
        self.repo.create(activeflow).await
    }

    /// Fetch a record, soft-deleted ones included
    pub async fn get(&self, id: &ActiveflowId) -> Result<Activeflow, CoreError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ActiveflowNotFound(id.to_string()))
    }

    /// Replace a record. Callers must hold the lease.
    pub async fn update(&self, activeflow: &Activeflow) -> Result<(), CoreError> {
        self.repo.update(activeflow).await
    }

    /// Soft-delete a record
    pub async fn delete(&self, id: &ActiveflowId) -> Result<(), CoreError> {
        self.repo.delete(id).await
    }

    /// List records
    pub async fn list(&self, filter: &ActiveflowFilter, page: Page) -> Result<Vec<Activeflow>, CoreError> {
        self.repo.list(filter, page).await
    }

    /// Take the lease, retrying while it is busy
    pub async fn acquire(&self, id: &ActiveflowId) -> Result<LeaseToken, CoreError> {
        self.lease.acquire(id).await
    }

    /// Give the lease back
    pub async fn release(&self, id: &ActiveflowId, token: &LeaseToken) {
        self.lease.release(id, token).await
    }

    /// Take the lease and read the record
    pub async fn get_with_lock(
        &self,
        id: &ActiveflowId,
    ) -> Result<(Activeflow, LeaseToken), CoreError> {
        let token = self.acquire(id).await?;
        match self.get(id).await {
            Ok(activeflow) => Ok((activeflow, token)),
            Err(e) => {
                self.release(id, &token).await;
                Err(e)
            }
        }
    }

    /// Read, mutate and persist a record under its lease.
    ///
    /// The mutation's result is returned with the stored record, which
    /// carries an "updated" event. Nothing is persisted when `mutate` fails.
    pub async fn update_with_lock<T, F>(
        &self,
        id: &ActiveflowId,
        mutate: F,
    ) -> Result<(Activeflow, T), CoreError>
    where
        F: FnOnce(&mut Activeflow) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let (mut activeflow, token) = self.get_with_lock(id).await?;

        let res = match mutate(&mut activeflow) {
            Ok(value) => match self.repo.update(&activeflow).await {
                Ok(()) => {
                    activeflow.record_updated();
                    Ok((activeflow, value))
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        self.release(id, &token).await;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activeflow::{CustomerId, FlowId, NewActiveflow, ReferenceType};
    use crate::domain::lock::MockLeaseLock;
    use crate::domain::repository::MockActiveflowRepository;
    use mockall::predicate::*;
    use std::time::Duration;

    fn activeflow(id: ActiveflowId) -> Activeflow {
        let mut af = Activeflow::new(NewActiveflow {
            id,
            customer_id: CustomerId::new(),
            flow_id: FlowId::new(),
            reference_type: ReferenceType::Api,
            reference_id: uuid::Uuid::nil(),
            reference_activeflow_id: None,
            on_complete_flow_id: None,
            actions: vec![],
        });
        af.take_events();
        af
    }

    fn config() -> EngineConfig {
        EngineConfig {
            lock_retry_count: 2,
            lock_retry_interval: Duration::from_millis(1),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_update_with_lock_persists_and_releases() {
        let id = ActiveflowId::new();
        let token = LeaseToken::new();

        let mut repo = MockActiveflowRepository::new();
        repo.expect_find_by_id()
            .with(eq(id))
            .returning(move |id| Ok(Some(activeflow(*id))));
        repo.expect_update()
            .withf(|af| af.status == crate::domain::activeflow::ActiveflowStatus::Ended)
            .times(1)
            .returning(|_| Ok(()));

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().times(1).returning(move |_, _| Ok(token));
        lock.expect_release()
            .withf(move |_, t| *t == token)
            .times(1)
            .returning(|_, _| Ok(()));

        let store = ActiveflowStore::new(Arc::new(repo), Arc::new(lock), &config());
        let (mut af, ()) = store.update_with_lock(&id, |af| af.end()).await.unwrap();

        let events = af.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "activeflow_updated");
    }

    #[tokio::test]
    async fn test_update_with_lock_skips_persist_on_failure() {
        let id = ActiveflowId::new();

        let mut repo = MockActiveflowRepository::new();
        repo.expect_find_by_id()
            .returning(move |id| Ok(Some(activeflow(*id))));
        repo.expect_update().never();

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().returning(|_, _| Ok(LeaseToken::new()));
        lock.expect_release().times(1).returning(|_, _| Ok(()));

        let store = ActiveflowStore::new(Arc::new(repo), Arc::new(lock), &config());
        let res = store
            .update_with_lock(&id, |_| -> Result<(), CoreError> {
                Err(CoreError::ValidationError("nope".to_string()))
            })
            .await;
        assert!(matches!(res, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_acquire_retries_then_gives_up() {
        let id = ActiveflowId::new();
        let repo = MockActiveflowRepository::new();

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire()
            .times(3)
            .returning(|id, _| Err(CoreError::LockUnavailable(id.to_string())));

        let store = ActiveflowStore::new(Arc::new(repo), Arc::new(lock), &config());
        let err = store.acquire(&id).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_get_with_lock_releases_when_missing() {
        let id = ActiveflowId::new();

        let mut repo = MockActiveflowRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().returning(|_, _| Ok(LeaseToken::new()));
        lock.expect_release().times(1).returning(|_, _| Ok(()));

        let store = ActiveflowStore::new(Arc::new(repo), Arc::new(lock), &config());
        let err = store.get_with_lock(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::ActiveflowNotFound(_)));
    }
}
