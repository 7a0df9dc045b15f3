use super::{ActionContext, Subroutine, SubroutineAction};
use crate::domain::action::{Action, ActionType};
use crate::domain::activeflow::ReferenceType;
use crate::domain::option::{
    AgentCallOption, AiSummaryOption, AiTalkOption, AiTaskOption, CallOption, ChatbotTalkOption,
    ConfbridgeJoinOption, ConferenceJoinOption, ConnectOption, FetchFlowOption, FetchOption,
    HangupOption, QueueJoinOption,
};
use crate::domain::rpc::{AiSessionRequest, CallsCreateRequest, SummaryRequest};
use crate::domain::stack::StackId;
use crate::CoreError;
use async_trait::async_trait;
use tracing::{debug, info};

/// Handler of `stop`, which has no option
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAction;

#[async_trait]
impl SubroutineAction for StopAction {
    async fn dispatch(&self, _ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        Ok(Subroutine::push(vec![Action::finish()]))
    }
}

#[async_trait]
impl SubroutineAction for ConferenceJoinOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .conference_service_start(self.conference_id, ctx.reference())
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, conference_id = %self.conference_id, service_id = %service.id, "Joining conference");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

#[async_trait]
impl SubroutineAction for QueueJoinOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .queue_service_start(self.queue_id, ctx.reference())
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, queue_id = %self.queue_id, service_id = %service.id, "Joining queue");
        Ok(Subroutine::service(service.id, service.push_actions))
    }

    async fn after_push(&self, ctx: &ActionContext<'_>, stack_id: &StackId) -> Result<(), CoreError> {
        ctx.rpc.queuecall_update_status_waiting(stack_id.0).await
    }
}

#[async_trait]
impl SubroutineAction for ChatbotTalkOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .chatbot_service_start(
                self.chatbot_id,
                ctx.reference(),
                self.gender.clone(),
                self.language.clone(),
            )
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, chatbot_id = %self.chatbot_id, service_id = %service.id, "Starting chatbot");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

#[async_trait]
impl SubroutineAction for AiTalkOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .ai_service_start(AiSessionRequest {
                ai_id: self.ai_id,
                reference: ctx.reference(),
                resume: self.resume,
                gender: self.gender.clone(),
                language: self.language.clone(),
                duration: self.duration,
            })
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, ai_id = %self.ai_id, service_id = %service.id, "Starting AI talk");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

/// Same session as `ai_talk`, always fresh and without a voice
#[async_trait]
impl SubroutineAction for AiTaskOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .ai_service_start(AiSessionRequest {
                ai_id: self.ai_id,
                reference: ctx.reference(),
                resume: false,
                gender: String::new(),
                language: String::new(),
                duration: 0,
            })
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, ai_id = %self.ai_id, service_id = %service.id, "Starting AI task");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

#[async_trait]
impl SubroutineAction for AiSummaryOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let reference_id = if self.reference_id.is_nil() {
            ctx.activeflow.reference_id
        } else {
            self.reference_id
        };
        let service = ctx
            .rpc
            .summary_service_start(SummaryRequest {
                customer_id: ctx.activeflow.customer_id,
                activeflow_id: ctx.activeflow.id,
                on_end_flow_id: (!self.on_end_flow_id.is_empty()).then_some(self.on_end_flow_id),
                reference_type: self.reference_type,
                reference_id,
                language: self.language.clone(),
            })
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, reference_id = %reference_id, service_id = %service.id, "Starting summary");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

#[async_trait]
impl SubroutineAction for AgentCallOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let service = ctx
            .rpc
            .agent_service_start(self.agent_id, ctx.reference())
            .await?;
        info!(activeflow_id = %ctx.activeflow.id, agent_id = %self.agent_id, service_id = %service.id, "Calling agent");
        Ok(Subroutine::service(service.id, service.push_actions))
    }
}

/// Bridges the referenced call with newly dialed destinations.
///
/// A confbridge is created and every new call runs a flow joining it. The
/// referenced call joins the same confbridge through the pushed stack. With
/// `relay_reason` and single calls only, the caller is then hung up with the
/// first callee's reason.
#[async_trait]
impl SubroutineAction for ConnectOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let call_id = ctx.call_id()?;
        let customer_id = ctx.activeflow.customer_id;

        let confbridge = ctx
            .rpc
            .confbridge_create(&customer_id, ctx.reference())
            .await?;
        let join = Action::new(
            ActionType::ConfbridgeJoin,
            serde_json::to_value(ConfbridgeJoinOption {
                confbridge_id: confbridge.id,
            })?,
        );

        let flow = ctx
            .rpc
            .flow_create(
                &customer_id,
                vec![
                    join.clone(),
                    Action::new(ActionType::Hangup, serde_json::Value::Null),
                ],
            )
            .await?;

        let (early_execution, execute_next) = if self.early_media {
            (true, false)
        } else {
            (false, self.destinations.len() == 1)
        };
        let created = ctx
            .rpc
            .calls_create(CallsCreateRequest {
                customer_id,
                flow_id: flow.id,
                master_call_id: Some(call_id),
                source: Some(self.source.clone()),
                destinations: self.destinations.clone(),
                early_execution,
                execute_next,
            })
            .await?;

        if created.calls.is_empty() && created.groupcalls.is_empty() {
            return Err(CoreError::ExternalServiceError(format!(
                "connect from {} created no calls",
                call_id
            )));
        }
        debug!(
            activeflow_id = %ctx.activeflow.id,
            confbridge_id = %confbridge.id,
            calls = created.calls.len(),
            groupcalls = created.groupcalls.len(),
            "Connect dialed"
        );

        let mut actions = vec![join];
        if self.relay_reason && created.groupcalls.is_empty() {
            if let Some(first) = created.calls.first() {
                actions.push(Action::new(
                    ActionType::Hangup,
                    serde_json::to_value(HangupOption {
                        reason: String::new(),
                        reference_id: first.id,
                    })?,
                ));
            }
        }
        Ok(Subroutine::push(actions))
    }
}

/// Places new calls running another flow. Control stays on this activeflow.
#[async_trait]
impl SubroutineAction for CallOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let customer_id = ctx.activeflow.customer_id;

        let flow_id = if !self.flow_id.is_empty() {
            self.flow_id
        } else if !self.actions.is_empty() {
            ctx.rpc.flow_create(&customer_id, self.actions.clone()).await?.id
        } else {
            return Err(CoreError::ValidationError(
                "call needs a flow_id or actions".to_string(),
            ));
        };

        let master_call_id = (self.chained && ctx.activeflow.reference_type == ReferenceType::Call)
            .then_some(ctx.activeflow.reference_id);

        let created = ctx
            .rpc
            .calls_create(CallsCreateRequest {
                customer_id,
                flow_id,
                master_call_id,
                source: self.source.clone(),
                destinations: self.destinations.clone(),
                early_execution: self.early_execution,
                execute_next: false,
            })
            .await?;
        info!(
            activeflow_id = %ctx.activeflow.id,
            flow_id = %flow_id,
            calls = created.calls.len(),
            groupcalls = created.groupcalls.len(),
            "Placed calls"
        );
        Ok(Subroutine::none())
    }
}

#[async_trait]
impl SubroutineAction for FetchOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let actions = ctx
            .rpc
            .fetch_actions(&ctx.activeflow.id, self.event_url.clone(), self.event_method.clone())
            .await?;
        debug!(activeflow_id = %ctx.activeflow.id, count = actions.len(), "Fetched actions");
        Ok(Subroutine::push(actions))
    }
}

#[async_trait]
impl SubroutineAction for FetchFlowOption {
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError> {
        let flow = ctx.rpc.flow_get(&self.flow_id).await?;
        if flow.customer_id != ctx.activeflow.customer_id {
            return Err(CoreError::PermissionDenied(format!(
                "flow {} belongs to another customer",
                flow.id
            )));
        }
        Ok(Subroutine::push(flow.actions))
    }
}
