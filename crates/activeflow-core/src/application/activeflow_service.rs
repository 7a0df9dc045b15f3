use crate::application::event_publisher::DomainEventHandler;
use crate::application::record_store::ActiveflowStore;
use crate::application::variable_service::VariableService;
use crate::config::EngineConfig;
use crate::domain::action::{Action, ActionId};
use crate::domain::activeflow::{
    Activeflow, ActiveflowId, CustomerId, FlowId, NewActiveflow, ReferenceType,
};
use crate::domain::events::ActiveflowDeleted;
use crate::domain::repository::{ActiveflowFilter, Page};
use crate::domain::rpc::RpcFacade;
use crate::domain::stack::StackId;
use crate::domain::variable::Variable;
use crate::CoreError;
use activeflow_monitoring::{MetricType, MetricsCollector};
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Request to instantiate a flow against a reference
#[derive(Debug, Clone, PartialEq)]
pub struct CreateActiveflow {
    /// Identifier to use; generated when `None`
    pub id: Option<ActiveflowId>,
    /// Expected owner of the flow, checked when given
    pub customer_id: Option<CustomerId>,
    /// Flow to run
    pub flow_id: FlowId,
    /// Kind of the driven thing
    pub reference_type: ReferenceType,
    /// Identifier of the driven thing
    pub reference_id: Uuid,
    /// Activeflow spawning this one; its variables are inherited
    pub reference_activeflow_id: Option<ActiveflowId>,
}

/// Service managing activeflows.
///
/// The advance loop lives in [`engine`](crate::application::engine); this
/// part holds the lifecycle operations it builds on.
pub struct ActiveflowService {
    /// Records and their lease lock
    pub(crate) store: Arc<ActiveflowStore>,

    /// Variable bags
    pub(crate) variables: Arc<VariableService>,

    /// External services
    pub(crate) rpc: Arc<dyn RpcFacade>,

    /// Event publisher
    pub(crate) event_handler: Arc<dyn DomainEventHandler>,

    /// Metrics sink
    pub(crate) metrics: Arc<dyn MetricsCollector>,

    /// Limits
    pub(crate) config: EngineConfig,
}

impl ActiveflowService {
    /// Create a new activeflow service
    pub fn new(
        store: Arc<ActiveflowStore>,
        variables: Arc<VariableService>,
        rpc: Arc<dyn RpcFacade>,
        event_handler: Arc<dyn DomainEventHandler>,
        metrics: Arc<dyn MetricsCollector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            variables,
            rpc,
            event_handler,
            metrics,
            config,
        }
    }

    /// Instantiate a flow. The new activeflow sits on the start
    /// pseudo-action until it is executed.
    pub async fn create(&self, request: CreateActiveflow) -> Result<Activeflow, CoreError> {
        info!(
            flow_id = %request.flow_id,
            reference_type = %request.reference_type,
            reference_id = %request.reference_id,
            "Creating activeflow"
        );

        let flow = self.rpc.flow_get(&request.flow_id).await?;
        if let Some(customer_id) = request.customer_id {
            if customer_id != flow.customer_id {
                return Err(CoreError::PermissionDenied(format!(
                    "flow {} is not owned by customer {}",
                    flow.id, customer_id
                )));
            }
        }

        let id = request
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(ActiveflowId::new);
        let mut activeflow = Activeflow::new(NewActiveflow {
            id,
            customer_id: flow.customer_id,
            flow_id: flow.id,
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            reference_activeflow_id: request.reference_activeflow_id,
            on_complete_flow_id: flow.on_complete_flow_id,
            actions: flow.actions,
        });

        self.store.create(&activeflow).await?;
        self.variables.create(&activeflow).await?;
        self.handle_events(&mut activeflow).await;
        self.count("activeflow_created_total", activeflow.reference_type);

        debug!(activeflow_id = %activeflow.id, "Activeflow created");
        Ok(activeflow)
    }

    /// Fetch an activeflow, soft-deleted ones included
    pub async fn get(&self, id: &ActiveflowId) -> Result<Activeflow, CoreError> {
        self.store.get(id).await
    }

    /// List activeflows, newest first
    pub async fn list(
        &self,
        filter: &ActiveflowFilter,
        page: Page,
    ) -> Result<Vec<Activeflow>, CoreError> {
        self.store.list(filter, page).await
    }

    /// End an activeflow. Stopping an ended activeflow is a no-op.
    ///
    /// When the flow names a continuation, it is started in the background
    /// against the same reference.
    pub async fn stop(&self, id: &ActiveflowId) -> Result<Activeflow, CoreError> {
        let mut activeflow = match self.store.update_with_lock(id, |af| af.end()).await {
            Ok((activeflow, ())) => activeflow,
            Err(CoreError::ActiveflowEnded(_)) => {
                debug!(activeflow_id = %id, "Activeflow already ended");
                return self.store.get(id).await;
            }
            Err(e) => return Err(e),
        };
        info!(activeflow_id = %id, execute_count = activeflow.execute_count, "Activeflow stopped");

        self.handle_events(&mut activeflow).await;
        self.count("activeflow_ended_total", activeflow.reference_type);

        if let Some(flow_id) = activeflow.on_complete_flow_id {
            tokio::spawn(self.start_on_complete(&activeflow, flow_id));
        }
        Ok(activeflow)
    }

    /// Soft-delete an activeflow, ending it first when it still runs
    pub async fn delete(&self, id: &ActiveflowId) -> Result<Activeflow, CoreError> {
        let current = self.store.get(id).await?;
        if current.deleted_at.is_some() {
            return Ok(current);
        }
        if current.is_running() {
            self.stop(id).await?;
        }

        self.store.delete(id).await?;
        let mut activeflow = self.store.get(id).await?;
        let timestamp = activeflow.deleted_at.unwrap_or_else(Utc::now);
        let snapshot = activeflow.clone();
        activeflow.record_event(Box::new(ActiveflowDeleted {
            activeflow: snapshot,
            timestamp,
        }));
        self.handle_events(&mut activeflow).await;

        info!(activeflow_id = %id, "Activeflow deleted");
        Ok(activeflow)
    }

    /// Set the action the next advance jumps to.
    ///
    /// With `forward_now` and a call reference, the call is asked to
    /// advance right away instead of finishing its current action.
    pub async fn set_forward_action_id(
        &self,
        id: &ActiveflowId,
        action_id: &ActionId,
        forward_now: bool,
    ) -> Result<Activeflow, CoreError> {
        let target = *action_id;
        let (mut activeflow, ()) = self
            .store
            .update_with_lock(id, move |af| af.forward_to(&target))
            .await?;
        self.handle_events(&mut activeflow).await;
        debug!(activeflow_id = %id, forward_action_id = %target, forward_now, "Forward action set");

        if forward_now && activeflow.reference_type == ReferenceType::Call {
            self.rpc
                .call_action_next(activeflow.reference_id, true)
                .await?;
        }
        Ok(activeflow)
    }

    /// Splice actions right after the current action
    pub async fn push_actions(
        &self,
        id: &ActiveflowId,
        actions: Vec<Action>,
    ) -> Result<Activeflow, CoreError> {
        let count = actions.len();
        let (mut activeflow, ()) = self
            .store
            .update_with_lock(id, move |af| af.splice_actions(actions))
            .await?;
        self.handle_events(&mut activeflow).await;
        debug!(activeflow_id = %id, count, "Actions added");
        Ok(activeflow)
    }

    /// Merge values into the activeflow's variable bag
    pub async fn add_variables(
        &self,
        id: &ActiveflowId,
        values: HashMap<String, String>,
    ) -> Result<Variable, CoreError> {
        self.variables.set_variable(id, values).await
    }

    /// A service finished early: pop its stack if it is still there
    pub async fn service_stop(
        &self,
        id: &ActiveflowId,
        service_id: Uuid,
    ) -> Result<Activeflow, CoreError> {
        let stack_id = StackId(service_id);
        let current = self.store.get(id).await?;
        if !current.stack_map.contains(&stack_id) {
            debug!(activeflow_id = %id, service_id = %service_id, "Service stack already gone");
            return Ok(current);
        }

        let (mut activeflow, ()) = self
            .store
            .update_with_lock(id, move |af| af.pop_stack(&stack_id))
            .await?;
        self.handle_events(&mut activeflow).await;
        info!(activeflow_id = %id, service_id = %service_id, "Service stack popped");
        Ok(activeflow)
    }

    fn start_on_complete(&self, ended: &Activeflow, flow_id: FlowId) -> BoxFuture<'static, ()> {
        let service = self.clone();
        let parent_id = ended.id;
        let request = CreateActiveflow {
            id: None,
            customer_id: Some(ended.customer_id),
            flow_id,
            reference_type: ended.reference_type,
            reference_id: ended.reference_id,
            reference_activeflow_id: Some(ended.id),
        };

        Box::pin(async move {
            let continuation = match service.create(request).await {
                Ok(activeflow) => activeflow,
                Err(e) => {
                    error!(activeflow_id = %parent_id, flow_id = %flow_id, error = %e, "Could not create the continuation");
                    return;
                }
            };
            info!(activeflow_id = %parent_id, continuation_id = %continuation.id, "Continuation started");

            if let Err(e) = service.execute(&continuation.id).await {
                warn!(activeflow_id = %continuation.id, error = %e, "Continuation execution failed");
            }
        })
    }

    /// Publish the events recorded on an activeflow. Publishing is a side
    /// channel, so failures are logged only.
    pub(crate) async fn handle_events(&self, activeflow: &mut Activeflow) {
        for event in activeflow.take_events() {
            let event_type = event.event_type();
            if let Err(e) = self.event_handler.handle_event(event).await {
                error!(activeflow_id = %activeflow.id, event_type, error = %e, "Could not publish event");
            }
        }
    }

    pub(crate) fn count(&self, name: &str, reference_type: ReferenceType) {
        self.metrics.record_metric(
            name,
            1.0,
            MetricType::Counter,
            HashMap::from([(
                "reference_type".to_string(),
                reference_type.as_str().to_string(),
            )]),
        );
    }
}

impl Clone for ActiveflowService {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            variables: self.variables.clone(),
            rpc: self.rpc.clone(),
            event_handler: self.event_handler.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        }
    }
}
