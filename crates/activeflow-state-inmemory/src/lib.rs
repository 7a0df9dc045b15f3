//! In-memory state store implementation for the activeflow engine
//!
//! This crate provides in-memory implementations of the repository and
//! lock interfaces defined in the activeflow-core crate. It is primarily
//! useful for development, testing, and single-process deployments where
//! persistence is not required.

use std::sync::Arc;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{InMemoryActiveflowRepository, InMemoryVariableRepository};

pub mod lock;
pub use lock::InMemoryLeaseLock;

use activeflow_core::{
    domain::activeflow::{Activeflow, ActiveflowId},
    domain::lock::LeaseLock,
    domain::repository::{ActiveflowRepository, VariableRepository},
    domain::variable::Variable,
};

/// Provider for in-memory state store repositories
pub struct InMemoryStateStoreProvider {
    // Shared storage for activeflow records
    activeflows: Arc<RwLock<HashMap<ActiveflowId, Activeflow>>>,

    // Shared storage for variable bags
    variables: Arc<RwLock<HashMap<ActiveflowId, Variable>>>,

    // Leases shared by every store handed out
    lock: InMemoryLeaseLock,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self {
            activeflows: Arc::new(RwLock::new(HashMap::new())),
            variables: Arc::new(RwLock::new(HashMap::new())),
            lock: InMemoryLeaseLock::new(),
        }
    }

    /// Create the repositories and the lock over the shared storage
    pub fn create_repositories(
        &self,
    ) -> (
        Arc<dyn ActiveflowRepository>,
        Arc<dyn VariableRepository>,
        Arc<dyn LeaseLock>,
    ) {
        let activeflow_repo = Arc::new(InMemoryActiveflowRepository::new(self.activeflows.clone()));
        let variable_repo = Arc::new(InMemoryVariableRepository::new(self.variables.clone()));
        let lock = Arc::new(self.lock.clone());

        (activeflow_repo, variable_repo, lock)
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
