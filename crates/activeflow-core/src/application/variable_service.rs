use crate::application::lease::Lease;
use crate::config::EngineConfig;
use crate::domain::activeflow::{Activeflow, ActiveflowId};
use crate::domain::lock::LeaseLock;
use crate::domain::repository::VariableRepository;
use crate::domain::variable::{
    self, Variable, KEY_ACTIVEFLOW_FLOW_ID, KEY_ACTIVEFLOW_ID, KEY_ACTIVEFLOW_REFERENCE_ACTIVEFLOW_ID,
    KEY_ACTIVEFLOW_REFERENCE_ID, KEY_ACTIVEFLOW_REFERENCE_TYPE,
};
use crate::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Variable bags of activeflows.
///
/// Writes to a bag hold the owning activeflow's lease, the same one the
/// record store takes.
pub struct VariableService {
    repo: Arc<dyn VariableRepository>,
    lease: Lease,
}

impl VariableService {
    /// Create a variable service
    pub fn new(
        repo: Arc<dyn VariableRepository>,
        lock: Arc<dyn LeaseLock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            lease: Lease::new(lock, config),
        }
    }

    /// Fetch the bag of an activeflow
    pub async fn get(&self, id: &ActiveflowId) -> Result<Variable, CoreError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::VariableNotFound(id.to_string()))
    }

    /// Create the bag of a new activeflow.
    ///
    /// The spawning activeflow's bag is copied first, then the
    /// `activeflow.*` keys are seeded.
    pub async fn create(&self, activeflow: &Activeflow) -> Result<Variable, CoreError> {
        let mut variables = HashMap::new();

        if let Some(reference_id) = activeflow.reference_activeflow_id {
            match self.repo.find_by_id(&reference_id).await {
                Ok(Some(parent)) => variables.extend(parent.variables),
                Ok(None) => {
                    warn!(activeflow_id = %activeflow.id, reference_activeflow_id = %reference_id, "Reference activeflow has no variables");
                }
                Err(e) => return Err(e),
            }
        }

        variables.insert(KEY_ACTIVEFLOW_ID.to_string(), activeflow.id.to_string());
        variables.insert(KEY_ACTIVEFLOW_FLOW_ID.to_string(), activeflow.flow_id.to_string());
        variables.insert(
            KEY_ACTIVEFLOW_REFERENCE_TYPE.to_string(),
            activeflow.reference_type.to_string(),
        );
        variables.insert(
            KEY_ACTIVEFLOW_REFERENCE_ID.to_string(),
            activeflow.reference_id.to_string(),
        );
        variables.insert(
            KEY_ACTIVEFLOW_REFERENCE_ACTIVEFLOW_ID.to_string(),
            activeflow
                .reference_activeflow_id
                .unwrap_or(ActiveflowId::EMPTY)
                .to_string(),
        );

        let variable = Variable::new(activeflow.id, variables);
        self.repo.create(&variable).await?;
        debug!(activeflow_id = %activeflow.id, count = variable.variables.len(), "Created variables");
        Ok(variable)
    }

    /// Merge values into a bag. Each value is substituted against the bag
    /// as it was before the merge.
    pub async fn set_variable(
        &self,
        id: &ActiveflowId,
        values: HashMap<String, String>,
    ) -> Result<Variable, CoreError> {
        let token = self.lease.acquire(id).await?;
        let res = self.merge_locked(id, values).await;
        self.lease.release(id, &token).await;
        res
    }

    async fn merge_locked(
        &self,
        id: &ActiveflowId,
        values: HashMap<String, String>,
    ) -> Result<Variable, CoreError> {
        let mut variable = self.get(id).await?;

        let substituted = values
            .into_iter()
            .map(|(k, v)| {
                let v = variable::substitute_string(&v, &variable.variables);
                (k, v)
            })
            .collect();
        variable.merge(substituted);

        self.repo.update(&variable).await?;
        Ok(variable)
    }

    /// Remove one key from a bag
    pub async fn delete_variable(&self, id: &ActiveflowId, key: &str) -> Result<(), CoreError> {
        let token = self.lease.acquire(id).await?;
        let res = self.remove_locked(id, key).await;
        self.lease.release(id, &token).await;
        res
    }

    async fn remove_locked(&self, id: &ActiveflowId, key: &str) -> Result<(), CoreError> {
        let mut variable = self.get(id).await?;
        if variable.remove(key).is_none() {
            return Ok(());
        }
        self.repo.update(&variable).await
    }

    /// Substitute text against an activeflow's bag
    pub async fn substitute_string(&self, id: &ActiveflowId, data: &str) -> Result<String, CoreError> {
        let variable = self.get(id).await?;
        Ok(variable::substitute_string(data, &variable.variables))
    }

    /// Substitute bytes against an activeflow's bag
    pub async fn substitute_bytes(&self, id: &ActiveflowId, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let variable = self.get(id).await?;
        Ok(variable::substitute_bytes(data, &variable.variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activeflow::{CustomerId, FlowId, NewActiveflow, ReferenceType};
    use crate::domain::lock::{LeaseToken, MockLeaseLock};
    use crate::domain::repository::MockVariableRepository;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn service(repo: MockVariableRepository, lock: MockLeaseLock) -> VariableService {
        VariableService::new(Arc::new(repo), Arc::new(lock), &EngineConfig::default())
    }

    fn free_lock() -> MockLeaseLock {
        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().returning(|_, _| Ok(LeaseToken::new()));
        lock.expect_release().returning(|_, _| Ok(()));
        lock
    }

    fn activeflow(reference_activeflow_id: Option<ActiveflowId>) -> Activeflow {
        Activeflow::new(NewActiveflow {
            id: ActiveflowId::new(),
            customer_id: CustomerId::new(),
            flow_id: FlowId::new(),
            reference_type: ReferenceType::Call,
            reference_id: uuid::Uuid::new_v4(),
            reference_activeflow_id,
            on_complete_flow_id: None,
            actions: vec![],
        })
    }

    #[tokio::test]
    async fn test_create_seeds_and_copies_parent() {
        let parent_id = ActiveflowId::new();
        let af = activeflow(Some(parent_id));

        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id().returning(move |id| {
            Ok(Some(Variable::new(
                *id,
                HashMap::from([
                    ("customer.name".to_string(), "bob".to_string()),
                    (KEY_ACTIVEFLOW_ID.to_string(), id.to_string()),
                ]),
            )))
        });
        repo.expect_create().times(1).returning(|_| Ok(()));

        let service = service(repo, MockLeaseLock::new());
        let variable = service.create(&af).await.unwrap();

        assert_eq!(variable.get("customer.name"), Some("bob"));
        assert_eq!(variable.get(KEY_ACTIVEFLOW_ID), Some(af.id.to_string().as_str()));
        assert_eq!(variable.get(KEY_ACTIVEFLOW_REFERENCE_TYPE), Some("call"));
        assert_eq!(
            variable.get(KEY_ACTIVEFLOW_REFERENCE_ACTIVEFLOW_ID),
            Some(parent_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_set_variable_substitutes_against_current_bag() {
        let id = ActiveflowId::new();
        let stored = Arc::new(Mutex::new(Variable::new(
            id,
            HashMap::from([("call.digits".to_string(), "42".to_string())]),
        )));

        let mut repo = MockVariableRepository::new();
        let read = stored.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(read.lock().unwrap().clone())));
        let write = stored.clone();
        repo.expect_update().returning(move |v| {
            *write.lock().unwrap() = v.clone();
            Ok(())
        });

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().times(2).returning(|_, _| Ok(LeaseToken::new()));
        lock.expect_release().times(2).returning(|_, _| Ok(()));

        let service = service(repo, lock);
        service
            .set_variable(
                &id,
                HashMap::from([("choice".to_string(), "digit ${call.digits}".to_string())]),
            )
            .await
            .unwrap();

        assert_eq!(stored.lock().unwrap().get("choice"), Some("digit 42"));
        assert_eq!(
            service.substitute_string(&id, "${choice}!").await.unwrap(),
            "digit 42!"
        );

        service.delete_variable(&id, "choice").await.unwrap();
        assert_eq!(stored.lock().unwrap().get("choice"), None);
    }

    #[tokio::test]
    async fn test_get_missing_bag() {
        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let service = service(repo, MockLeaseLock::new());
        let err = service.get(&ActiveflowId::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::VariableNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_variable_releases_lease_on_failure() {
        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_update().never();

        let token = LeaseToken::new();
        let mut lock = MockLeaseLock::new();
        lock.expect_acquire().times(1).returning(move |_, _| Ok(token));
        lock.expect_release()
            .withf(move |_, t| *t == token)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(repo, lock);
        let err = service
            .set_variable(&ActiveflowId::new(), HashMap::from([("k".to_string(), "v".to_string())]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::VariableNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_variable_refused_while_lease_held() {
        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id().never();
        repo.expect_update().never();

        let mut lock = MockLeaseLock::new();
        lock.expect_acquire()
            .returning(|id, _| Err(CoreError::LockUnavailable(id.to_string())));
        lock.expect_release().never();

        let service = VariableService::new(
            Arc::new(repo),
            Arc::new(lock),
            &EngineConfig {
                lock_retry_count: 1,
                lock_retry_interval: std::time::Duration::from_millis(1),
                ..EngineConfig::default()
            },
        );
        let err = service
            .delete_variable(&ActiveflowId::new(), "k")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_delete_missing_key_skips_write() {
        let id = ActiveflowId::new();
        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(Variable::new(*id, HashMap::new()))));
        repo.expect_update().never();

        let service = service(repo, free_lock());
        service.delete_variable(&id, "absent").await.unwrap();
    }
}
