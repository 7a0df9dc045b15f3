use crate::domain::activeflow::{
    Activeflow, ActiveflowId, ActiveflowStatus, CustomerId, FlowId, ReferenceType,
};
use crate::domain::variable::Variable;
use crate::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Criteria for listing activeflows. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveflowFilter {
    /// Owning customer
    pub customer_id: Option<CustomerId>,
    /// Status
    pub status: Option<ActiveflowStatus>,
    /// Reference kind
    pub reference_type: Option<ReferenceType>,
    /// Reference id
    pub reference_id: Option<Uuid>,
    /// Flow being executed
    pub flow_id: Option<FlowId>,
    /// Also return soft-deleted records
    pub include_deleted: bool,
}

impl ActiveflowFilter {
    /// Whether a record matches
    pub fn matches(&self, activeflow: &Activeflow) -> bool {
        self.customer_id.map_or(true, |id| activeflow.customer_id == id)
            && self.status.map_or(true, |s| activeflow.status == s)
            && self.reference_type.map_or(true, |t| activeflow.reference_type == t)
            && self.reference_id.map_or(true, |id| activeflow.reference_id == id)
            && self.flow_id.map_or(true, |id| activeflow.flow_id == id)
            && (self.include_deleted || activeflow.deleted_at.is_none())
    }
}

/// Pagination: newest first, strictly older than `token`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Creation time of the last record of the previous page
    pub token: Option<DateTime<Utc>>,
    /// Maximum number of records
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            token: None,
            size: 100,
        }
    }
}

/// Repository for activeflow records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActiveflowRepository: Send + Sync {
    /// Insert a new record
    async fn create(&self, activeflow: &Activeflow) -> Result<(), CoreError>;

    /// Find a record by ID, soft-deleted ones included
    async fn find_by_id(&self, id: &ActiveflowId) -> Result<Option<Activeflow>, CoreError>;

    /// Replace a record
    async fn update(&self, activeflow: &Activeflow) -> Result<(), CoreError>;

    /// Soft-delete a record
    async fn delete(&self, id: &ActiveflowId) -> Result<(), CoreError>;

    /// List records matching a filter
    async fn list(&self, filter: &ActiveflowFilter, page: Page) -> Result<Vec<Activeflow>, CoreError>;
}

/// Repository for variable bags
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VariableRepository: Send + Sync {
    /// Insert a new bag
    async fn create(&self, variable: &Variable) -> Result<(), CoreError>;

    /// Find a bag by its activeflow ID
    async fn find_by_id(&self, id: &ActiveflowId) -> Result<Option<Variable>, CoreError>;

    /// Replace a bag
    async fn update(&self, variable: &Variable) -> Result<(), CoreError>;

    /// Remove a bag
    async fn delete(&self, id: &ActiveflowId) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activeflow::NewActiveflow;

    #[test]
    fn test_filter_matches() {
        let customer_id = CustomerId::new();
        let mut af = Activeflow::new(NewActiveflow {
            id: ActiveflowId::new(),
            customer_id,
            flow_id: FlowId::new(),
            reference_type: ReferenceType::Call,
            reference_id: Uuid::new_v4(),
            reference_activeflow_id: None,
            on_complete_flow_id: None,
            actions: vec![],
        });

        assert!(ActiveflowFilter::default().matches(&af));
        assert!(ActiveflowFilter {
            customer_id: Some(customer_id),
            reference_type: Some(ReferenceType::Call),
            ..Default::default()
        }
        .matches(&af));
        assert!(!ActiveflowFilter {
            customer_id: Some(CustomerId::new()),
            ..Default::default()
        }
        .matches(&af));

        af.mark_deleted();
        assert!(!ActiveflowFilter::default().matches(&af));
        assert!(ActiveflowFilter {
            include_deleted: true,
            ..Default::default()
        }
        .matches(&af));
    }
}
