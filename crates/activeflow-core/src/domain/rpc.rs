//! Facade over the external services the engine talks to.
//!
//! The engine only issues abstract requests ("start a call", "create a
//! confbridge") and receives structured results. Transport, retries and the
//! services' own business logic live behind [`RpcFacade`].

use crate::domain::action::Action;
use crate::domain::activeflow::{ActiveflowId, CustomerId, FlowId, ReferenceType};
use crate::domain::option::Address;
use crate::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Flow identifier
    pub id: FlowId,
    /// Owning customer
    pub customer_id: CustomerId,
    /// Actions of the flow
    pub actions: Vec<Action>,
    /// Flow started once an execution of this flow stops
    #[serde(default)]
    pub on_complete_flow_id: Option<FlowId>,
}

/// Call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Dialing the destination
    Dialing,
    /// The destination is ringing
    Ringing,
    /// Answered; both ends are talking
    Progressing,
    /// Being torn down
    Terminating,
    /// The originator is cancelling
    Canceling,
    /// Completed
    Hangup,
}

/// A call as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Call identifier
    pub id: Uuid,
    /// Current status
    pub status: CallStatus,
    /// Recordings made on this call
    #[serde(default)]
    pub recording_ids: Vec<Uuid>,
}

/// A group of calls ringing together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Groupcall {
    /// Groupcall identifier
    pub id: Uuid,
}

/// A bridge that calls can join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confbridge {
    /// Confbridge identifier
    pub id: Uuid,
}

/// Kind of service handed a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Conference participation
    Conferencecall,
    /// Queue membership
    Queuecall,
    /// Chatbot session
    Chatbotcall,
    /// AI talk or task session
    Aicall,
    /// Conversation summary
    Summary,
    /// Agent session
    Agentcall,
}

/// A started service and the actions to run while it lasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service instance id; becomes the id of the pushed stack
    pub id: Uuid,
    /// Kind of service
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Actions pushed onto the activeflow
    pub push_actions: Vec<Action>,
}

/// The reference a service is started for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReference {
    /// Activeflow starting the service
    pub activeflow_id: ActiveflowId,
    /// Kind of the driven thing
    pub reference_type: ReferenceType,
    /// Identifier of the driven thing
    pub reference_id: Uuid,
}

/// Request to place outbound calls
#[derive(Debug, Clone, PartialEq)]
pub struct CallsCreateRequest {
    /// Owning customer
    pub customer_id: CustomerId,
    /// Flow the calls run
    pub flow_id: FlowId,
    /// Call the new calls are chained to
    pub master_call_id: Option<Uuid>,
    /// Caller id
    pub source: Option<Address>,
    /// Who to call
    pub destinations: Vec<Address>,
    /// Run the flow before the callee answers
    pub early_execution: bool,
    /// Advance the master call once the calls are up
    pub execute_next: bool,
}

/// Result of placing calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallsCreateResponse {
    /// Single calls
    pub calls: Vec<Call>,
    /// Group calls
    pub groupcalls: Vec<Groupcall>,
}

/// What a transcription runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscribeReferenceType {
    /// A live call
    Call,
    /// A finished recording
    Recording,
}

/// Request to start a transcription
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeRequest {
    /// Owning customer
    pub customer_id: CustomerId,
    /// Requesting activeflow
    pub activeflow_id: ActiveflowId,
    /// Flow started when the transcription ends
    pub on_end_flow_id: Option<FlowId>,
    /// What to transcribe
    pub reference_type: TranscribeReferenceType,
    /// Identifier of the call or recording
    pub reference_id: Uuid,
    /// BCP47 language tag
    pub language: String,
}

/// Request to start an AI session on a reference
#[derive(Debug, Clone, PartialEq)]
pub struct AiSessionRequest {
    /// AI to run
    pub ai_id: Uuid,
    /// Reference handed to the session
    pub reference: ServiceReference,
    /// Resume the reference's previous session instead of starting fresh
    pub resume: bool,
    /// Voice gender; empty for text sessions
    pub gender: String,
    /// BCP47 language tag
    pub language: String,
    /// Session limit in milliseconds; 0 for no limit
    pub duration: u64,
}

/// What a summary is made of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryReferenceType {
    /// A call
    #[default]
    Call,
    /// A conference
    Conference,
    /// A finished recording
    Recording,
    /// A finished transcription
    Transcribe,
}

/// Request to start a summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    /// Owning customer
    pub customer_id: CustomerId,
    /// Requesting activeflow
    pub activeflow_id: ActiveflowId,
    /// Flow started when the summary is ready
    pub on_end_flow_id: Option<FlowId>,
    /// What to summarize
    pub reference_type: SummaryReferenceType,
    /// Identifier of the summarized thing
    pub reference_id: Uuid,
    /// BCP47 language tag
    pub language: String,
}

/// Request to send a webhook
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    /// Owning customer
    pub customer_id: CustomerId,
    /// Destination URI
    pub uri: String,
    /// HTTP method
    pub method: String,
    /// Content type
    pub data_type: String,
    /// Body, already substituted
    pub data: Vec<u8>,
}

/// Request to send an email
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRequest {
    /// Owning customer
    pub customer_id: CustomerId,
    /// Sending activeflow
    pub activeflow_id: ActiveflowId,
    /// Recipients
    pub destinations: Vec<Address>,
    /// Subject line
    pub subject: String,
    /// Body
    pub content: String,
}

/// Facade over the call, conference, queue, chatbot, AI, agent, messaging,
/// transcription and webhook services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcFacade: Send + Sync {
    /// Fetch a flow definition
    async fn flow_get(&self, flow_id: &FlowId) -> Result<Flow, CoreError>;

    /// Store a new, unnamed flow
    async fn flow_create(
        &self,
        customer_id: &CustomerId,
        actions: Vec<Action>,
    ) -> Result<Flow, CoreError>;

    /// Fetch a call
    async fn call_get(&self, call_id: Uuid) -> Result<Call, CoreError>;

    /// Digits received on a call so far
    async fn call_get_digits(&self, call_id: Uuid) -> Result<String, CoreError>;

    /// Place outbound calls
    async fn calls_create(&self, request: CallsCreateRequest) -> Result<CallsCreateResponse, CoreError>;

    /// Ask a call to advance its activeflow now
    async fn call_action_next(&self, call_id: Uuid, force: bool) -> Result<(), CoreError>;

    /// Create a confbridge owned by the reference
    async fn confbridge_create(
        &self,
        customer_id: &CustomerId,
        reference: ServiceReference,
    ) -> Result<Confbridge, CoreError>;

    /// Hand the reference to a conference
    async fn conference_service_start(
        &self,
        conference_id: Uuid,
        reference: ServiceReference,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Hand the reference to a queue
    async fn queue_service_start(
        &self,
        queue_id: Uuid,
        reference: ServiceReference,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Mark a queuecall as waiting for an agent
    async fn queuecall_update_status_waiting(&self, queuecall_id: Uuid) -> Result<(), CoreError>;

    /// Hand the reference to a chatbot
    async fn chatbot_service_start(
        &self,
        chatbot_id: Uuid,
        reference: ServiceReference,
        gender: String,
        language: String,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Start an AI talk or task session on the reference
    async fn ai_service_start(
        &self,
        request: AiSessionRequest,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Start a summary
    async fn summary_service_start(
        &self,
        request: SummaryRequest,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Hand the reference to an agent
    async fn agent_service_start(
        &self,
        agent_id: Uuid,
        reference: ServiceReference,
    ) -> Result<ServiceDescriptor, CoreError>;

    /// Fetch actions from a remote endpoint
    async fn fetch_actions(
        &self,
        activeflow_id: &ActiveflowId,
        event_url: String,
        event_method: String,
    ) -> Result<Vec<Action>, CoreError>;

    /// Start a transcription
    async fn transcribe_start(&self, request: TranscribeRequest) -> Result<Uuid, CoreError>;

    /// Send a text message
    async fn message_send(
        &self,
        customer_id: &CustomerId,
        source: Option<Address>,
        destinations: Vec<Address>,
        text: String,
    ) -> Result<(), CoreError>;

    /// Send an email
    async fn email_send(&self, request: EmailRequest) -> Result<(), CoreError>;

    /// Send a webhook
    async fn webhook_send(&self, request: WebhookRequest) -> Result<(), CoreError>;

    /// Post a message to a conversation
    async fn conversation_send(&self, conversation_id: Uuid, text: String) -> Result<(), CoreError>;
}
