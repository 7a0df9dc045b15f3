//! Typed action options.
//!
//! Raw options travel as JSON on [`Action::option`](crate::domain::action::Action).
//! They are decoded once, when the action is dequeued, into [`ActionOption`],
//! and substituted through the closed [`OptionValue`] tree beforehand.

use crate::domain::action::{Action, ActionId, ActionType};
use crate::domain::activeflow::FlowId;
use crate::domain::rpc::{CallStatus, SummaryReferenceType};
use crate::CoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Closed value tree an option payload is substituted over
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<OptionValue>),
    /// Keyed map
    Map(BTreeMap<String, OptionValue>),
    /// Number, boolean or null; never substituted
    Scalar(Value),
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => OptionValue::Text(s),
            Value::Array(items) => OptionValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                OptionValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            other => OptionValue::Scalar(other),
        }
    }
}

impl From<OptionValue> for Value {
    fn from(value: OptionValue) -> Self {
        match value {
            OptionValue::Text(s) => Value::String(s),
            OptionValue::Bytes(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
            OptionValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            OptionValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            OptionValue::Scalar(v) => v,
        }
    }
}

/// Postal, phone, SIP or email endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    /// Address kind, e.g. `tel`, `sip`, `email`
    #[serde(rename = "type")]
    pub address_type: String,
    /// Target in the kind's own format
    pub target: String,
    /// Display name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Comparison operator of the condition actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// `==`
    #[default]
    #[serde(rename = "==")]
    Equal,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// `<`
    #[serde(rename = "<")]
    Less,
    /// `<=`
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl ConditionOperator {
    /// Evaluate `lhs OP rhs`
    pub fn compare<T: PartialOrd + ?Sized>(&self, lhs: &T, rhs: &T) -> bool {
        match self {
            ConditionOperator::Equal => lhs == rhs,
            ConditionOperator::NotEqual => lhs != rhs,
            ConditionOperator::Greater => lhs > rhs,
            ConditionOperator::GreaterOrEqual => lhs >= rhs,
            ConditionOperator::Less => lhs < rhs,
            ConditionOperator::LessOrEqual => lhs <= rhs,
        }
    }
}

/// How condition_variable interprets its operands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableValueType {
    /// Lexicographic comparison
    #[default]
    String,
    /// Numeric comparison
    Number,
    /// Compare the variable's length
    Length,
}

/// Option of `agent_call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCallOption {
    /// Agent to hand the reference to
    pub agent_id: Uuid,
}

/// Option of `ai_summary`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSummaryOption {
    /// Flow started when the summary is ready
    pub on_end_flow_id: FlowId,
    /// What to summarize
    pub reference_type: SummaryReferenceType,
    /// Identifier of the summarized thing; the activeflow's reference when nil
    pub reference_id: Uuid,
    /// BCP47 language tag
    pub language: String,
}

/// Option of `ai_talk`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTalkOption {
    /// AI to talk to
    pub ai_id: Uuid,
    /// Resume the previous session of the reference
    pub resume: bool,
    /// Voice gender
    pub gender: String,
    /// BCP47 language tag
    pub language: String,
    /// Session limit in milliseconds; 0 for no limit
    pub duration: u64,
}

/// Option of `ai_task`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTaskOption {
    /// AI running the task
    pub ai_id: Uuid,
}

/// Option of `amd`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmdOption {
    /// `hangup` or `continue` when a machine answered
    pub machine_handle: String,
    /// Continue without waiting for the detection result
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// Option of `branch`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchOption {
    /// Variable to branch on; `call.digits` when empty
    pub variable: String,
    /// Target when no entry of `target_ids` matches
    pub default_target_id: ActionId,
    /// Target per variable value
    pub target_ids: HashMap<String, ActionId>,
}

/// Option of `call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOption {
    /// Caller id of the new calls
    pub source: Option<Address>,
    /// Who to call
    pub destinations: Vec<Address>,
    /// Flow the new calls run; built from `actions` when empty
    pub flow_id: FlowId,
    /// Inline flow used when `flow_id` is empty
    pub actions: Vec<Action>,
    /// Tie the new calls to the referenced call
    pub chained: bool,
    /// Run the flow before the callee answers
    pub early_execution: bool,
}

/// Option of `chatbot_talk`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotTalkOption {
    /// Chatbot to talk to
    pub chatbot_id: Uuid,
    /// Voice gender
    pub gender: String,
    /// BCP47 language tag
    pub language: String,
}

/// Option of `condition_call_digits`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionCallDigitsOption {
    /// Match once at least this many digits were received
    pub length: usize,
    /// Match once this key was received
    pub key: String,
    /// Target when the condition does not hold
    pub false_target_id: ActionId,
}

/// Option of `condition_call_status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionCallStatusOption {
    /// Expected call status
    pub status: Option<CallStatus>,
    /// Target when the condition does not hold
    pub false_target_id: ActionId,
}

/// Option of `condition_datetime`.
///
/// Fields left at their "unset" value are not compared: `month` and `day`
/// when zero, `hour` and `minute` when negative, `weekdays` when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionDatetimeOption {
    /// Operator applied as `option OP now`
    pub condition: ConditionOperator,
    /// 0 - 59
    pub minute: i32,
    /// 0 - 23
    pub hour: i32,
    /// 1 - 31
    pub day: i32,
    /// 1 - 12
    pub month: i32,
    /// Sunday is 0
    pub weekdays: Vec<u32>,
    /// Target when the condition does not hold
    pub false_target_id: ActionId,
}

impl Default for ConditionDatetimeOption {
    fn default() -> Self {
        Self {
            condition: ConditionOperator::default(),
            minute: -1,
            hour: -1,
            day: 0,
            month: 0,
            weekdays: Vec::new(),
            false_target_id: ActionId::EMPTY,
        }
    }
}

/// Option of `condition_variable`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionVariableOption {
    /// Operator applied as `variable OP value`
    pub condition: ConditionOperator,
    /// Variable name
    pub variable: String,
    /// Interpretation of the operands
    pub value_type: VariableValueType,
    /// Operand for `string`
    pub value_string: String,
    /// Operand for `number`
    pub value_number: f32,
    /// Operand for `length`
    pub value_length: usize,
    /// Target when the condition does not hold
    pub false_target_id: ActionId,
}

/// Option of `confbridge_join`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfbridgeJoinOption {
    /// Confbridge to join
    pub confbridge_id: Uuid,
}

/// Option of `conference_join`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceJoinOption {
    /// Conference to join
    pub conference_id: Uuid,
}

/// Option of `connect`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOption {
    /// Caller id of the outgoing legs
    pub source: Address,
    /// Who to dial
    pub destinations: Vec<Address>,
    /// Bridge before the callee answers
    pub early_media: bool,
    /// Hang the caller up with the callee's reason
    pub relay_reason: bool,
}

/// Option of `conversation_send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSendOption {
    /// Conversation to post to
    pub conversation_id: Uuid,
    /// Message text
    pub text: String,
    /// Wait for the send to finish
    pub sync: bool,
}

/// Option of `digits_receive`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitsReceiveOption {
    /// Receive window in milliseconds
    pub duration: u64,
    /// Terminating key
    pub key: String,
    /// Stop after this many digits
    pub length: usize,
}

/// Option of `digits_send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitsSendOption {
    /// Keys to send
    pub digits: String,
    /// Tone duration per key in milliseconds
    pub duration: u64,
    /// Gap between keys in milliseconds
    pub interval: u64,
}

/// Option of `echo` and `stream_echo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoOption {
    /// Echo duration in milliseconds
    pub duration: u64,
}

/// Option of `email_send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSendOption {
    /// Recipients
    pub destinations: Vec<Address>,
    /// Subject line
    pub subject: String,
    /// Body
    pub content: String,
}

/// Option of `external_media_start`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalMediaStartOption {
    /// Media target host
    pub external_host: String,
    /// Codec
    pub format: String,
}

/// Option of `fetch`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOption {
    /// Endpoint returning a list of actions
    pub event_url: String,
    /// HTTP method
    pub event_method: String,
}

/// Option of `fetch_flow`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchFlowOption {
    /// Flow whose actions are pushed
    pub flow_id: FlowId,
}

/// Option of `goto`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GotoOption {
    /// Jump target
    pub target_id: ActionId,
    /// Remaining jumps; the action falls through at zero
    pub loop_count: i64,
}

/// Option of `hangup`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HangupOption {
    /// Hangup reason code
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Reuse the hangup reason of this call
    #[serde(skip_serializing_if = "Uuid::is_nil")]
    pub reference_id: Uuid,
}

/// Option of `message_send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSendOption {
    /// Sender
    pub source: Option<Address>,
    /// Recipients
    pub destinations: Vec<Address>,
    /// Message text
    pub text: String,
}

/// Option of `play`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayOption {
    /// Media URLs, played in order
    pub stream_urls: Vec<String>,
}

/// Option of `queue_join`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueJoinOption {
    /// Queue to join
    pub queue_id: Uuid,
}

/// Option of `recording_start`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingStartOption {
    /// wav, mp3 or ogg
    pub format: String,
    /// Maximum duration in seconds; 0 for no limit
    pub duration: u64,
    /// Beep when recording begins
    pub beep_start: bool,
}

/// Option of `sleep`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepOption {
    /// Milliseconds
    pub duration: u64,
}

/// Option of `talk`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkOption {
    /// SSML or plain text
    pub text: String,
    /// Voice gender
    pub gender: String,
    /// IETF locale name
    pub language: String,
    /// Continue without waiting for playback to end
    #[serde(rename = "async")]
    pub is_async: bool,
}

/// Option of `transcribe_start`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeStartOption {
    /// BCP47 language tag
    pub language: String,
    /// Flow started when the transcription ends
    pub on_end_flow_id: FlowId,
}

/// Option of `transcribe_recording`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeRecordingOption {
    /// BCP47 language tag
    pub language: String,
    /// Flow started when each transcription ends
    pub on_end_flow_id: FlowId,
}

/// Option of `variable_set`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableSetOption {
    /// Variable name
    pub key: String,
    /// Value, substituted before it is stored
    pub value: String,
}

/// Option of `webhook_send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSendOption {
    /// Wait for the send to finish
    pub sync: bool,
    /// Destination URI
    pub uri: String,
    /// HTTP method
    pub method: String,
    /// Content type of `data`
    pub data_type: String,
    /// Request body
    pub data: String,
}

/// A decoded action option, one variant per action type
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ActionOption {
    AgentCall(AgentCallOption),
    AiSummary(AiSummaryOption),
    AiTalk(AiTalkOption),
    AiTask(AiTaskOption),
    Amd(AmdOption),
    Answer,
    Beep,
    Block,
    Branch(BranchOption),
    Call(CallOption),
    ChatbotTalk(ChatbotTalkOption),
    ConditionCallDigits(ConditionCallDigitsOption),
    ConditionCallStatus(ConditionCallStatusOption),
    ConditionDatetime(ConditionDatetimeOption),
    ConditionVariable(ConditionVariableOption),
    ConfbridgeJoin(ConfbridgeJoinOption),
    ConferenceJoin(ConferenceJoinOption),
    Connect(ConnectOption),
    ConversationSend(ConversationSendOption),
    DigitsReceive(DigitsReceiveOption),
    DigitsSend(DigitsSendOption),
    Echo(EchoOption),
    EmailSend(EmailSendOption),
    Empty,
    ExternalMediaStart(ExternalMediaStartOption),
    ExternalMediaStop,
    Fetch(FetchOption),
    FetchFlow(FetchFlowOption),
    Goto(GotoOption),
    Hangup(HangupOption),
    MessageSend(MessageSendOption),
    Play(PlayOption),
    QueueJoin(QueueJoinOption),
    RecordingStart(RecordingStartOption),
    RecordingStop,
    Sleep(SleepOption),
    Stop,
    StreamEcho(EchoOption),
    Talk(TalkOption),
    TranscribeRecording(TranscribeRecordingOption),
    TranscribeStart(TranscribeStartOption),
    TranscribeStop,
    VariableSet(VariableSetOption),
    WebhookSend(WebhookSendOption),
}

fn parse<T: DeserializeOwned + Default>(
    action_type: ActionType,
    value: &Value,
) -> Result<T, CoreError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::OptionDecodeError(format!("{}: {}", action_type, e)))
}

impl ActionOption {
    /// Decode the raw option of an action of the given type
    pub fn decode(action_type: ActionType, value: &Value) -> Result<Self, CoreError> {
        use ActionType as T;
        let t = action_type;
        let option = match action_type {
            T::AgentCall => ActionOption::AgentCall(parse(t, value)?),
            T::AiSummary => ActionOption::AiSummary(parse(t, value)?),
            T::AiTalk => ActionOption::AiTalk(parse(t, value)?),
            T::AiTask => ActionOption::AiTask(parse(t, value)?),
            T::Amd => ActionOption::Amd(parse(t, value)?),
            T::Answer => ActionOption::Answer,
            T::Beep => ActionOption::Beep,
            T::Block => ActionOption::Block,
            T::Branch => ActionOption::Branch(parse(t, value)?),
            T::Call => ActionOption::Call(parse(t, value)?),
            T::ChatbotTalk => ActionOption::ChatbotTalk(parse(t, value)?),
            T::ConditionCallDigits => ActionOption::ConditionCallDigits(parse(t, value)?),
            T::ConditionCallStatus => ActionOption::ConditionCallStatus(parse(t, value)?),
            T::ConditionDatetime => ActionOption::ConditionDatetime(parse(t, value)?),
            T::ConditionVariable => ActionOption::ConditionVariable(parse(t, value)?),
            T::ConfbridgeJoin => ActionOption::ConfbridgeJoin(parse(t, value)?),
            T::ConferenceJoin => ActionOption::ConferenceJoin(parse(t, value)?),
            T::Connect => ActionOption::Connect(parse(t, value)?),
            T::ConversationSend => ActionOption::ConversationSend(parse(t, value)?),
            T::DigitsReceive => ActionOption::DigitsReceive(parse(t, value)?),
            T::DigitsSend => ActionOption::DigitsSend(parse(t, value)?),
            T::Echo => ActionOption::Echo(parse(t, value)?),
            T::EmailSend => ActionOption::EmailSend(parse(t, value)?),
            T::Empty => ActionOption::Empty,
            T::ExternalMediaStart => ActionOption::ExternalMediaStart(parse(t, value)?),
            T::ExternalMediaStop => ActionOption::ExternalMediaStop,
            T::Fetch => ActionOption::Fetch(parse(t, value)?),
            T::FetchFlow => ActionOption::FetchFlow(parse(t, value)?),
            T::Goto => ActionOption::Goto(parse(t, value)?),
            T::Hangup => ActionOption::Hangup(parse(t, value)?),
            T::MessageSend => ActionOption::MessageSend(parse(t, value)?),
            T::Play => ActionOption::Play(parse(t, value)?),
            T::QueueJoin => ActionOption::QueueJoin(parse(t, value)?),
            T::RecordingStart => ActionOption::RecordingStart(parse(t, value)?),
            T::RecordingStop => ActionOption::RecordingStop,
            T::Sleep => ActionOption::Sleep(parse(t, value)?),
            T::Stop => ActionOption::Stop,
            T::StreamEcho => ActionOption::StreamEcho(parse(t, value)?),
            T::Talk => ActionOption::Talk(parse(t, value)?),
            T::TranscribeRecording => ActionOption::TranscribeRecording(parse(t, value)?),
            T::TranscribeStart => ActionOption::TranscribeStart(parse(t, value)?),
            T::TranscribeStop => ActionOption::TranscribeStop,
            T::VariableSet => ActionOption::VariableSet(parse(t, value)?),
            T::WebhookSend => ActionOption::WebhookSend(parse(t, value)?),
        };
        Ok(option)
    }

    /// Decode the option carried by an action
    pub fn from_action(action: &Action) -> Result<Self, CoreError> {
        Self::decode(action.action_type, &action.option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_option_value_from_json() {
        let value: OptionValue = json!({"a": "x", "b": [1, "y"], "c": null}).into();
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), OptionValue::Text("x".to_string()));
        expected.insert(
            "b".to_string(),
            OptionValue::List(vec![
                OptionValue::Scalar(json!(1)),
                OptionValue::Text("y".to_string()),
            ]),
        );
        expected.insert("c".to_string(), OptionValue::Scalar(Value::Null));
        assert_eq!(value, OptionValue::Map(expected));
    }

    #[test]
    fn test_option_value_bytes_to_json() {
        let value: Value = OptionValue::Bytes(b"hello".to_vec()).into();
        assert_eq!(value, json!("hello"));
    }

    #[test]
    fn test_decode_goto() {
        let target = ActionId::new();
        let option = ActionOption::decode(
            ActionType::Goto,
            &json!({"target_id": target, "loop_count": 2}),
        )
        .unwrap();
        assert_eq!(
            option,
            ActionOption::Goto(GotoOption {
                target_id: target,
                loop_count: 2
            })
        );
    }

    #[test]
    fn test_decode_null_uses_defaults() {
        let option = ActionOption::decode(ActionType::Branch, &Value::Null).unwrap();
        assert_eq!(option, ActionOption::Branch(BranchOption::default()));

        let option = ActionOption::decode(ActionType::ConditionDatetime, &json!({})).unwrap();
        match option {
            ActionOption::ConditionDatetime(opt) => {
                assert_eq!(opt.hour, -1);
                assert_eq!(opt.minute, -1);
                assert_eq!(opt.month, 0);
            }
            other => panic!("unexpected option {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_names_type() {
        let err = ActionOption::decode(ActionType::Goto, &json!({"loop_count": "many"}))
            .unwrap_err();
        match err {
            CoreError::OptionDecodeError(msg) => assert!(msg.starts_with("goto:")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_decode_condition_operators() {
        for (raw, op) in [
            ("==", ConditionOperator::Equal),
            ("!=", ConditionOperator::NotEqual),
            (">", ConditionOperator::Greater),
            (">=", ConditionOperator::GreaterOrEqual),
            ("<", ConditionOperator::Less),
            ("<=", ConditionOperator::LessOrEqual),
        ] {
            let option = ActionOption::decode(
                ActionType::ConditionVariable,
                &json!({"condition": raw, "variable": "v", "value_type": "number"}),
            )
            .unwrap();
            match option {
                ActionOption::ConditionVariable(opt) => {
                    assert_eq!(opt.condition, op);
                    assert_eq!(opt.value_type, VariableValueType::Number);
                }
                other => panic!("unexpected option {:?}", other),
            }
        }
    }

    #[test]
    fn test_compare() {
        assert!(ConditionOperator::Greater.compare(&3, &2));
        assert!(!ConditionOperator::Less.compare(&3, &2));
        assert!(ConditionOperator::LessOrEqual.compare("a", "a"));
        assert!(ConditionOperator::NotEqual.compare(&1.5f32, &2.0f32));
    }

    #[test]
    fn test_decode_ai_summary() {
        let flow_id = FlowId::new();
        let reference_id = Uuid::new_v4();
        let option = ActionOption::decode(
            ActionType::AiSummary,
            &json!({
                "on_end_flow_id": flow_id,
                "reference_type": "recording",
                "reference_id": reference_id,
                "language": "en-US"
            }),
        )
        .unwrap();
        assert_eq!(
            option,
            ActionOption::AiSummary(AiSummaryOption {
                on_end_flow_id: flow_id,
                reference_type: SummaryReferenceType::Recording,
                reference_id,
                language: "en-US".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_async_rename() {
        let option =
            ActionOption::decode(ActionType::Talk, &json!({"text": "hi", "async": true})).unwrap();
        match option {
            ActionOption::Talk(opt) => assert!(opt.is_async),
            other => panic!("unexpected option {:?}", other),
        }
    }
}
