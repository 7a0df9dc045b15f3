use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

uuid_id!(
    /// Value object: Action ID
    ActionId
);

impl ActionId {
    /// Pseudo-action that precedes the first action of the main stack
    pub const START: Self = Self(Uuid::from_u128(1));

    /// Pseudo-action that terminates the flow
    pub const FINISH: Self = Self(Uuid::from_u128(2));

    /// Expected-id marker used to resume a blocked flow
    pub const CONTINUE: Self = Self(Uuid::from_u128(3));

    /// Whether this is one of the reserved pseudo-action ids
    pub fn is_sentinel(&self) -> bool {
        *self == Self::START || *self == Self::FINISH || *self == Self::CONTINUE
    }
}

/// The closed set of action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Hand the reference to an agent
    AgentCall,
    /// Start a summary of the reference's conversation
    AiSummary,
    /// Hand the reference to an AI talk session
    AiTalk,
    /// Run an AI task against the reference
    AiTask,
    /// Answering machine detection
    Amd,
    /// Answer the call
    Answer,
    /// Play a beep
    Beep,
    /// Hold the flow until it is continued externally
    Block,
    /// Jump by the value of a variable
    Branch,
    /// Place outbound calls running their own flow
    Call,
    /// Hand the reference to a chatbot service
    ChatbotTalk,
    /// Route on received digits
    ConditionCallDigits,
    /// Route on the call status
    ConditionCallStatus,
    /// Route on the current date and time
    ConditionDatetime,
    /// Route on a variable value
    ConditionVariable,
    /// Join a confbridge
    ConfbridgeJoin,
    /// Hand the reference to a conference service
    ConferenceJoin,
    /// Dial destinations and bridge them with the caller
    Connect,
    /// Send a conversation message
    ConversationSend,
    /// Collect digits
    DigitsReceive,
    /// Send digits
    DigitsSend,
    /// Echo media back
    Echo,
    /// Send an email
    EmailSend,
    /// Does nothing
    Empty,
    /// Start external media streaming
    ExternalMediaStart,
    /// Stop external media streaming
    ExternalMediaStop,
    /// Fetch actions from a remote endpoint
    Fetch,
    /// Fetch the actions of another flow
    FetchFlow,
    /// Jump to an earlier action a bounded number of times
    Goto,
    /// Hang up the call
    Hangup,
    /// Send a text message
    MessageSend,
    /// Play media
    Play,
    /// Hand the reference to a queue service
    QueueJoin,
    /// Start recording
    RecordingStart,
    /// Stop recording
    RecordingStop,
    /// Pause
    Sleep,
    /// End the flow
    Stop,
    /// Echo media stream back
    StreamEcho,
    /// Text to speech
    Talk,
    /// Transcribe the call's recordings
    TranscribeRecording,
    /// Start a live transcription
    TranscribeStart,
    /// Stop a live transcription
    TranscribeStop,
    /// Set a variable
    VariableSet,
    /// Send a webhook
    WebhookSend,
}

/// How the engine treats an action type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionShape {
    /// Decides the next action and sets the forward pointer
    Routing,
    /// Pushes a new stack of actions
    Subroutine,
    /// Calls an external service and continues regardless of the outcome
    FireAndReport,
    /// Handed to the reference layer, advanced once it reports completion
    PassThrough,
}

/// Media carried by a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// No media requirement, or a reference without media
    None,
    /// Live audio channel
    Audio,
    /// Text channel
    Text,
}

impl ActionType {
    /// Every action type
    pub const ALL: &'static [ActionType] = &[
        ActionType::AgentCall,
        ActionType::AiSummary,
        ActionType::AiTalk,
        ActionType::AiTask,
        ActionType::Amd,
        ActionType::Answer,
        ActionType::Beep,
        ActionType::Block,
        ActionType::Branch,
        ActionType::Call,
        ActionType::ChatbotTalk,
        ActionType::ConditionCallDigits,
        ActionType::ConditionCallStatus,
        ActionType::ConditionDatetime,
        ActionType::ConditionVariable,
        ActionType::ConfbridgeJoin,
        ActionType::ConferenceJoin,
        ActionType::Connect,
        ActionType::ConversationSend,
        ActionType::DigitsReceive,
        ActionType::DigitsSend,
        ActionType::Echo,
        ActionType::EmailSend,
        ActionType::Empty,
        ActionType::ExternalMediaStart,
        ActionType::ExternalMediaStop,
        ActionType::Fetch,
        ActionType::FetchFlow,
        ActionType::Goto,
        ActionType::Hangup,
        ActionType::MessageSend,
        ActionType::Play,
        ActionType::QueueJoin,
        ActionType::RecordingStart,
        ActionType::RecordingStop,
        ActionType::Sleep,
        ActionType::Stop,
        ActionType::StreamEcho,
        ActionType::Talk,
        ActionType::TranscribeRecording,
        ActionType::TranscribeStart,
        ActionType::TranscribeStop,
        ActionType::VariableSet,
        ActionType::WebhookSend,
    ];

    /// The handler shape of this type
    pub fn shape(&self) -> ActionShape {
        use ActionType::*;
        match self {
            Branch | ConditionCallDigits | ConditionCallStatus | ConditionDatetime
            | ConditionVariable | Goto => ActionShape::Routing,
            AgentCall | AiSummary | AiTalk | AiTask | Call | ChatbotTalk | ConferenceJoin
            | Connect | Fetch | FetchFlow | QueueJoin | Stop => ActionShape::Subroutine,
            ConversationSend | EmailSend | MessageSend | TranscribeRecording
            | TranscribeStart | VariableSet | WebhookSend => ActionShape::FireAndReport,
            Amd | Answer | Beep | Block | ConfbridgeJoin | DigitsReceive | DigitsSend | Echo
            | Empty | ExternalMediaStart | ExternalMediaStop | Hangup | Play
            | RecordingStart | RecordingStop | Sleep | StreamEcho | Talk | TranscribeStop => {
                ActionShape::PassThrough
            }
        }
    }

    /// Media types a reference must carry for this action to run.
    /// `MediaType::None` in the list means any reference works.
    pub fn required_media(&self) -> &'static [MediaType] {
        use ActionType::*;
        match self {
            AgentCall | Amd | Answer | Beep | ConditionCallDigits | ConditionCallStatus
            | ConfbridgeJoin | ConferenceJoin | Connect | DigitsReceive | DigitsSend | Echo
            | ExternalMediaStart | ExternalMediaStop | Hangup | Play | QueueJoin
            | RecordingStart | RecordingStop | StreamEcho | Talk | TranscribeStart
            | TranscribeStop => &[MediaType::Audio],
            AiTalk | AiTask | ChatbotTalk => &[MediaType::Audio, MediaType::Text],
            AiSummary | Block | Branch | Call | ConditionDatetime | ConditionVariable
            | ConversationSend | EmailSend | Empty | Fetch | FetchFlow | Goto | MessageSend | Sleep | Stop
            | TranscribeRecording | VariableSet | WebhookSend => &[MediaType::None],
        }
    }

    /// Whether a reference carrying `media` may run this action
    pub fn supports_media(&self, media: MediaType) -> bool {
        let required = self.required_media();
        required.contains(&MediaType::None) || required.contains(&media)
    }

    /// The wire name of this type
    pub fn as_str(&self) -> &'static str {
        use ActionType::*;
        match self {
            AgentCall => "agent_call",
            AiSummary => "ai_summary",
            AiTalk => "ai_talk",
            AiTask => "ai_task",
            Amd => "amd",
            Answer => "answer",
            Beep => "beep",
            Block => "block",
            Branch => "branch",
            Call => "call",
            ChatbotTalk => "chatbot_talk",
            ConditionCallDigits => "condition_call_digits",
            ConditionCallStatus => "condition_call_status",
            ConditionDatetime => "condition_datetime",
            ConditionVariable => "condition_variable",
            ConfbridgeJoin => "confbridge_join",
            ConferenceJoin => "conference_join",
            Connect => "connect",
            ConversationSend => "conversation_send",
            DigitsReceive => "digits_receive",
            DigitsSend => "digits_send",
            Echo => "echo",
            EmailSend => "email_send",
            Empty => "empty",
            ExternalMediaStart => "external_media_start",
            ExternalMediaStop => "external_media_stop",
            Fetch => "fetch",
            FetchFlow => "fetch_flow",
            Goto => "goto",
            Hangup => "hangup",
            MessageSend => "message_send",
            Play => "play",
            QueueJoin => "queue_join",
            RecordingStart => "recording_start",
            RecordingStop => "recording_stop",
            Sleep => "sleep",
            Stop => "stop",
            StreamEcho => "stream_echo",
            Talk => "talk",
            TranscribeRecording => "transcribe_recording",
            TranscribeStart => "transcribe_start",
            TranscribeStop => "transcribe_stop",
            VariableSet => "variable_set",
            WebhookSend => "webhook_send",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier within the flow
    pub id: ActionId,

    /// Explicit successor; overrides list order when set
    #[serde(default, skip_serializing_if = "ActionId::is_empty")]
    pub next_id: ActionId,

    /// Action type
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Type-specific option payload, decoded on dispatch
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub option: serde_json::Value,
}

impl Action {
    /// Create an action with a fresh id
    pub fn new(action_type: ActionType, option: serde_json::Value) -> Self {
        Self {
            id: ActionId::new(),
            next_id: ActionId::EMPTY,
            action_type,
            option,
        }
    }

    /// The pseudo-action a fresh activeflow starts on
    pub fn start() -> Self {
        Self {
            id: ActionId::START,
            next_id: ActionId::EMPTY,
            action_type: ActionType::Empty,
            option: serde_json::Value::Null,
        }
    }

    /// The pseudo-action that terminates the flow
    pub fn finish() -> Self {
        Self {
            id: ActionId::FINISH,
            next_id: ActionId::EMPTY,
            action_type: ActionType::Empty,
            option: serde_json::Value::Null,
        }
    }

    /// Builder: set the explicit successor
    pub fn with_next(mut self, next_id: ActionId) -> Self {
        self.next_id = next_id;
        self
    }

    /// Whether this is the finish pseudo-action
    pub fn is_finish(&self) -> bool {
        self.id == ActionId::FINISH
    }
}
