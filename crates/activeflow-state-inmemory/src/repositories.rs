use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use async_trait::async_trait;

use activeflow_core::{
    CoreError,
    domain::activeflow::{Activeflow, ActiveflowId},
    domain::repository::{ActiveflowFilter, ActiveflowRepository, Page, VariableRepository},
    domain::variable::Variable,
};

/// In-memory implementation of the ActiveflowRepository
pub struct InMemoryActiveflowRepository {
    activeflows: Arc<RwLock<HashMap<ActiveflowId, Activeflow>>>,
}

impl InMemoryActiveflowRepository {
    /// Create a new in-memory activeflow repository
    pub fn new(activeflows: Arc<RwLock<HashMap<ActiveflowId, Activeflow>>>) -> Self {
        Self { activeflows }
    }
}

#[async_trait]
impl ActiveflowRepository for InMemoryActiveflowRepository {
    async fn create(&self, activeflow: &Activeflow) -> Result<(), CoreError> {
        let mut activeflows = self.activeflows.write().await;
        if activeflows.contains_key(&activeflow.id) {
            return Err(CoreError::StateStoreError(format!(
                "activeflow {} already exists",
                activeflow.id
            )));
        }
        activeflows.insert(activeflow.id, activeflow.clone());
        debug!(activeflow_id = %activeflow.id, "Stored activeflow");
        Ok(())
    }

    async fn find_by_id(&self, id: &ActiveflowId) -> Result<Option<Activeflow>, CoreError> {
        let activeflows = self.activeflows.read().await;
        Ok(activeflows.get(id).cloned())
    }

    async fn update(&self, activeflow: &Activeflow) -> Result<(), CoreError> {
        let mut activeflows = self.activeflows.write().await;
        match activeflows.get_mut(&activeflow.id) {
            Some(stored) => {
                *stored = activeflow.clone();
                Ok(())
            }
            None => Err(CoreError::ActiveflowNotFound(activeflow.id.to_string())),
        }
    }

    async fn delete(&self, id: &ActiveflowId) -> Result<(), CoreError> {
        let mut activeflows = self.activeflows.write().await;
        let stored = activeflows
            .get_mut(id)
            .ok_or_else(|| CoreError::ActiveflowNotFound(id.to_string()))?;
        if stored.deleted_at.is_none() {
            stored.mark_deleted();
        }
        Ok(())
    }

    async fn list(&self, filter: &ActiveflowFilter, page: Page) -> Result<Vec<Activeflow>, CoreError> {
        let activeflows = self.activeflows.read().await;

        let mut result: Vec<Activeflow> = activeflows
            .values()
            .filter(|activeflow| filter.matches(activeflow))
            .filter(|activeflow| page.token.map_or(true, |token| activeflow.created_at < token))
            .cloned()
            .collect();

        // Newest first
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(page.size);

        Ok(result)
    }
}

/// In-memory implementation of the VariableRepository
pub struct InMemoryVariableRepository {
    variables: Arc<RwLock<HashMap<ActiveflowId, Variable>>>,
}

impl InMemoryVariableRepository {
    /// Create a new in-memory variable repository
    pub fn new(variables: Arc<RwLock<HashMap<ActiveflowId, Variable>>>) -> Self {
        Self { variables }
    }
}

#[async_trait]
impl VariableRepository for InMemoryVariableRepository {
    async fn create(&self, variable: &Variable) -> Result<(), CoreError> {
        let mut variables = self.variables.write().await;
        variables.insert(variable.id, variable.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ActiveflowId) -> Result<Option<Variable>, CoreError> {
        let variables = self.variables.read().await;
        Ok(variables.get(id).cloned())
    }

    async fn update(&self, variable: &Variable) -> Result<(), CoreError> {
        let mut variables = self.variables.write().await;
        if !variables.contains_key(&variable.id) {
            return Err(CoreError::VariableNotFound(variable.id.to_string()));
        }
        let mut updated = variable.clone();
        updated.updated_at = chrono::Utc::now();
        variables.insert(variable.id, updated);
        Ok(())
    }

    async fn delete(&self, id: &ActiveflowId) -> Result<(), CoreError> {
        let mut variables = self.variables.write().await;
        variables.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activeflow_core::domain::activeflow::{CustomerId, FlowId, NewActiveflow, ReferenceType};
    use chrono::Duration;

    fn activeflow(customer_id: CustomerId) -> Activeflow {
        let mut activeflow = Activeflow::new(NewActiveflow {
            id: ActiveflowId::new(),
            customer_id,
            flow_id: FlowId::new(),
            reference_type: ReferenceType::Api,
            reference_id: uuid::Uuid::nil(),
            reference_activeflow_id: None,
            on_complete_flow_id: None,
            actions: vec![],
        });
        activeflow.take_events();
        activeflow
    }

    #[tokio::test]
    async fn test_activeflow_repository() -> Result<(), CoreError> {
        let repo = InMemoryActiveflowRepository::new(Arc::new(RwLock::new(HashMap::new())));
        let mut activeflow = activeflow(CustomerId::new());

        repo.create(&activeflow).await?;
        assert!(repo.create(&activeflow).await.is_err());

        activeflow.end()?;
        repo.update(&activeflow).await?;
        let found = repo.find_by_id(&activeflow.id).await?.unwrap();
        assert!(!found.is_running());

        // soft delete keeps the record
        repo.delete(&activeflow.id).await?;
        let found = repo.find_by_id(&activeflow.id).await?.unwrap();
        assert!(found.deleted_at.is_some());

        let listed = repo.list(&ActiveflowFilter::default(), Page::default()).await?;
        assert!(listed.is_empty());
        let listed = repo
            .list(
                &ActiveflowFilter {
                    include_deleted: true,
                    ..Default::default()
                },
                Page::default(),
            )
            .await?;
        assert_eq!(listed.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() -> Result<(), CoreError> {
        let repo = InMemoryActiveflowRepository::new(Arc::new(RwLock::new(HashMap::new())));
        let customer_id = CustomerId::new();

        let base = chrono::Utc::now();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut activeflow = activeflow(customer_id);
            activeflow.created_at = base + Duration::seconds(i);
            ids.push(activeflow.id);
            repo.create(&activeflow).await?;
        }
        repo.create(&activeflow(CustomerId::new())).await?;

        let filter = ActiveflowFilter {
            customer_id: Some(customer_id),
            ..Default::default()
        };
        let first = repo.list(&filter, Page { token: None, size: 2 }).await?;
        assert_eq!(first.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let token = first.last().map(|a| a.created_at);
        let second = repo.list(&filter, Page { token, size: 2 }).await?;
        assert_eq!(second.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[0]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_variable_repository() -> Result<(), CoreError> {
        let repo = InMemoryVariableRepository::new(Arc::new(RwLock::new(HashMap::new())));
        let id = ActiveflowId::new();

        let mut variable = Variable::new(id, HashMap::new());
        assert!(repo.update(&variable).await.is_err());

        repo.create(&variable).await?;
        variable.merge(HashMap::from([("k".to_string(), "v".to_string())]));
        repo.update(&variable).await?;
        assert_eq!(repo.find_by_id(&id).await?.unwrap().get("k"), Some("v"));

        repo.delete(&id).await?;
        assert!(repo.find_by_id(&id).await?.is_none());

        Ok(())
    }
}
