use super::PassThroughAction;
use crate::domain::action::ActionType;
use crate::domain::option::{
    AmdOption, ConfbridgeJoinOption, DigitsReceiveOption, DigitsSendOption, EchoOption,
    ExternalMediaStartOption, HangupOption, PlayOption, RecordingStartOption, SleepOption,
    TalkOption,
};

/// Pass-through action whose type carries no option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BareAction(pub ActionType);

impl PassThroughAction for BareAction {
    fn waits_for_reference(&self) -> bool {
        // a no-op marker; nothing for the reference to perform
        self.0 != ActionType::Empty
    }
}

impl PassThroughAction for AmdOption {}
impl PassThroughAction for ConfbridgeJoinOption {}
impl PassThroughAction for DigitsReceiveOption {}
impl PassThroughAction for DigitsSendOption {}
impl PassThroughAction for EchoOption {}
impl PassThroughAction for ExternalMediaStartOption {}
impl PassThroughAction for HangupOption {}
impl PassThroughAction for PlayOption {}
impl PassThroughAction for RecordingStartOption {}
impl PassThroughAction for SleepOption {}
impl PassThroughAction for TalkOption {}
