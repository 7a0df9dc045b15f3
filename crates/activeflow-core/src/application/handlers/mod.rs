//! Action handlers.
//!
//! Every action type has one of four shapes, each a capability trait
//! implemented on the type's decoded option:
//!
//! - [`RoutingAction`]: decides where control goes next.
//! - [`SubroutineAction`]: produces a stack of actions to push.
//! - [`FireAndReportAction`]: calls an external service; failures are
//!   logged and the flow moves on.
//! - [`PassThroughAction`]: performed by the reference layer, not here.
//!
//! Handlers only compute. The engine applies their result to the record
//! under the activeflow's lease.

use crate::application::variable_service::VariableService;
use crate::domain::action::{Action, ActionId, ActionType};
use crate::domain::activeflow::{Activeflow, ReferenceType};
use crate::domain::option::ActionOption;
use crate::domain::rpc::{RpcFacade, ServiceReference};
use crate::domain::stack::StackId;
use crate::CoreError;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Routing handlers
pub mod routing;

/// Subroutine handlers
pub mod subroutine;

/// Fire-and-report handlers
pub mod fire_and_report;

/// Pass-through handlers
pub mod pass_through;

/// Everything a handler may look at
pub struct ActionContext<'a> {
    /// The activeflow as of the advance that landed on the action
    pub activeflow: &'a Activeflow,

    /// The action being executed, option already substituted
    pub action: &'a Action,

    /// External services
    pub rpc: &'a Arc<dyn RpcFacade>,

    /// Variable bags
    pub variables: &'a VariableService,
}

impl<'a> ActionContext<'a> {
    /// The reference a service started from here is bound to
    pub fn reference(&self) -> ServiceReference {
        ServiceReference {
            activeflow_id: self.activeflow.id,
            reference_type: self.activeflow.reference_type,
            reference_id: self.activeflow.reference_id,
        }
    }

    /// The referenced call, failing for any other reference type
    pub fn call_id(&self) -> Result<Uuid, CoreError> {
        if self.activeflow.reference_type == ReferenceType::Call {
            Ok(self.activeflow.reference_id)
        } else {
            Err(CoreError::ValidationError(format!(
                "{} needs a call reference, got {}",
                self.action.action_type, self.activeflow.reference_type
            )))
        }
    }
}

/// Outcome of a routing handler
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Advance sequentially
    Continue,
    /// Jump to an action of the current stack's return chain
    Forward(ActionId),
    /// Jump, and store a rewritten option on the current action first
    Loop {
        /// Jump target
        target: ActionId,
        /// Replacement option of the current action
        option: serde_json::Value,
    },
}

/// Actions to push as a new stack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subroutine {
    /// Stack id to use; generated when `None`
    pub stack_id: Option<StackId>,

    /// Actions of the new stack; nothing is pushed when empty
    pub actions: Vec<Action>,
}

impl Subroutine {
    /// Push nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Push under a generated stack id
    pub fn push(actions: Vec<Action>) -> Self {
        Self {
            stack_id: None,
            actions,
        }
    }

    /// Push under a service instance's id, so the service can pop it later
    pub fn service(service_id: Uuid, actions: Vec<Action>) -> Self {
        Self {
            stack_id: Some(StackId(service_id)),
            actions,
        }
    }
}

/// Decides the next action
#[async_trait]
pub trait RoutingAction: Send + Sync {
    /// Compute the route
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError>;
}

/// Produces a stack of actions to run before control returns
#[async_trait]
pub trait SubroutineAction: Send + Sync {
    /// Compute the stack to push
    async fn dispatch(&self, ctx: &ActionContext<'_>) -> Result<Subroutine, CoreError>;

    /// Called once the stack was pushed and persisted
    async fn after_push(&self, _ctx: &ActionContext<'_>, _stack_id: &StackId) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Calls an external service; the flow continues whatever the outcome
#[async_trait]
pub trait FireAndReportAction: Send + Sync {
    /// Make the call
    async fn fire(&self, ctx: &ActionContext<'_>) -> Result<(), CoreError>;
}

/// Performed by the reference layer, which advances the flow once done
pub trait PassThroughAction: Send + Sync {
    /// Whether the engine hands the action to the reference layer and waits.
    /// When false the engine advances past it immediately.
    fn waits_for_reference(&self) -> bool {
        true
    }
}

/// Handler lookup per shape. Each returns `None` when the option belongs
/// to another shape.
impl ActionOption {
    pub(crate) fn as_routing(&self) -> Option<&dyn RoutingAction> {
        use ActionOption as O;
        match self {
            O::Branch(o) => Some(o),
            O::ConditionCallDigits(o) => Some(o),
            O::ConditionCallStatus(o) => Some(o),
            O::ConditionDatetime(o) => Some(o),
            O::ConditionVariable(o) => Some(o),
            O::Goto(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_subroutine(&self) -> Option<&dyn SubroutineAction> {
        use ActionOption as O;
        match self {
            O::AgentCall(o) => Some(o),
            O::AiSummary(o) => Some(o),
            O::AiTalk(o) => Some(o),
            O::AiTask(o) => Some(o),
            O::Call(o) => Some(o),
            O::ChatbotTalk(o) => Some(o),
            O::ConferenceJoin(o) => Some(o),
            O::Connect(o) => Some(o),
            O::Fetch(o) => Some(o),
            O::FetchFlow(o) => Some(o),
            O::QueueJoin(o) => Some(o),
            O::Stop => Some(&subroutine::StopAction),
            _ => None,
        }
    }

    pub(crate) fn as_fire_and_report(&self) -> Option<&dyn FireAndReportAction> {
        use ActionOption as O;
        match self {
            O::ConversationSend(o) => Some(o),
            O::EmailSend(o) => Some(o),
            O::MessageSend(o) => Some(o),
            O::TranscribeRecording(o) => Some(o),
            O::TranscribeStart(o) => Some(o),
            O::VariableSet(o) => Some(o),
            O::WebhookSend(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_pass_through(&self) -> Option<&dyn PassThroughAction> {
        use pass_through::BareAction;
        use ActionOption as O;
        match self {
            O::Amd(o) => Some(o),
            O::ConfbridgeJoin(o) => Some(o),
            O::DigitsReceive(o) => Some(o),
            O::DigitsSend(o) => Some(o),
            O::Echo(o) | O::StreamEcho(o) => Some(o),
            O::ExternalMediaStart(o) => Some(o),
            O::Hangup(o) => Some(o),
            O::Play(o) => Some(o),
            O::RecordingStart(o) => Some(o),
            O::Sleep(o) => Some(o),
            O::Talk(o) => Some(o),
            O::Answer => Some(&BareAction(ActionType::Answer)),
            O::Beep => Some(&BareAction(ActionType::Beep)),
            O::Block => Some(&BareAction(ActionType::Block)),
            O::Empty => Some(&BareAction(ActionType::Empty)),
            O::ExternalMediaStop => Some(&BareAction(ActionType::ExternalMediaStop)),
            O::RecordingStop => Some(&BareAction(ActionType::RecordingStop)),
            O::TranscribeStop => Some(&BareAction(ActionType::TranscribeStop)),
            _ => None,
        }
    }
}
