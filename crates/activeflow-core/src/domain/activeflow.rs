use crate::domain::action::{Action, ActionId, MediaType};
use crate::domain::events::{ActiveflowCreated, ActiveflowUpdated, DomainEvent};
use crate::domain::stack::{StackId, StackMap};
use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

uuid_id!(
    /// Value object: Activeflow ID
    ActiveflowId
);

uuid_id!(
    /// Value object: Flow ID
    FlowId
);

uuid_id!(
    /// Value object: Customer ID
    CustomerId
);

/// Activeflow status. The only transition is `Running` to `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveflowStatus {
    /// Accepting advances
    Running,
    /// Finished; no further advance is accepted
    Ended,
}

/// What kind of thing an activeflow drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Not bound to anything
    #[default]
    None,
    /// A phone call
    Call,
    /// A messaging conversation
    Conversation,
    /// An outbound campaign
    Campaign,
    /// A transcription
    Transcribe,
    /// A recording
    Recording,
    /// Started through the API
    Api,
}

impl ReferenceType {
    /// The media a reference of this type carries
    pub fn media_type(&self) -> MediaType {
        match self {
            ReferenceType::Call => MediaType::Audio,
            ReferenceType::Conversation => MediaType::Text,
            _ => MediaType::None,
        }
    }

    /// The wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::None => "none",
            ReferenceType::Call => "call",
            ReferenceType::Conversation => "conversation",
            ReferenceType::Campaign => "campaign",
            ReferenceType::Transcribe => "transcribe",
            ReferenceType::Recording => "recording",
            ReferenceType::Api => "api",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create an activeflow
#[derive(Debug, Clone)]
pub struct NewActiveflow {
    /// Identifier to use
    pub id: ActiveflowId,
    /// Owning customer
    pub customer_id: CustomerId,
    /// Flow being executed
    pub flow_id: FlowId,
    /// Kind of the driven thing
    pub reference_type: ReferenceType,
    /// Identifier of the driven thing
    pub reference_id: Uuid,
    /// Activeflow that spawned this one
    pub reference_activeflow_id: Option<ActiveflowId>,
    /// Flow started once this one stops
    pub on_complete_flow_id: Option<FlowId>,
    /// The flow's actions, becoming the main stack
    pub actions: Vec<Action>,
}

/// Aggregate: one running execution of a flow
#[derive(Debug, Serialize, Deserialize)]
pub struct Activeflow {
    /// Unique identifier
    pub id: ActiveflowId,

    /// Owning customer
    pub customer_id: CustomerId,

    /// Flow being executed
    pub flow_id: FlowId,

    /// Current status
    pub status: ActiveflowStatus,

    /// Kind of the driven thing
    pub reference_type: ReferenceType,

    /// Identifier of the driven thing
    pub reference_id: Uuid,

    /// Activeflow that spawned this one
    pub reference_activeflow_id: Option<ActiveflowId>,

    /// Flow started once this one stops
    pub on_complete_flow_id: Option<FlowId>,

    /// Call stack
    pub stack_map: StackMap,

    /// Stack of the current action
    pub current_stack_id: StackId,

    /// Action being executed
    pub current_action: Action,

    /// Stack of the jump target, when a jump is pending
    pub forward_stack_id: StackId,

    /// Jump target consumed by the next advance
    pub forward_action_id: ActionId,

    /// Advances so far
    pub execute_count: u64,

    /// Audit trail of executed actions
    pub executed_actions: Vec<Action>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Soft-delete timestamp
    pub deleted_at: Option<DateTime<Utc>>,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Domain events are not cloned
impl Clone for Activeflow {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            customer_id: self.customer_id,
            flow_id: self.flow_id,
            status: self.status,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            reference_activeflow_id: self.reference_activeflow_id,
            on_complete_flow_id: self.on_complete_flow_id,
            stack_map: self.stack_map.clone(),
            current_stack_id: self.current_stack_id,
            current_action: self.current_action.clone(),
            forward_stack_id: self.forward_stack_id,
            forward_action_id: self.forward_action_id,
            execute_count: self.execute_count,
            executed_actions: self.executed_actions.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            events: Vec::new(),
        }
    }
}

impl Activeflow {
    /// Create a running activeflow positioned on the start pseudo-action
    pub fn new(new: NewActiveflow) -> Self {
        let now = Utc::now();
        let mut activeflow = Self {
            id: new.id,
            customer_id: new.customer_id,
            flow_id: new.flow_id,
            status: ActiveflowStatus::Running,
            reference_type: new.reference_type,
            reference_id: new.reference_id,
            reference_activeflow_id: new.reference_activeflow_id,
            on_complete_flow_id: new.on_complete_flow_id,
            stack_map: StackMap::create(new.actions),
            current_stack_id: StackId::MAIN,
            current_action: Action::start(),
            forward_stack_id: StackId::EMPTY,
            forward_action_id: ActionId::EMPTY,
            execute_count: 0,
            executed_actions: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            events: Vec::with_capacity(4),
        };

        let snapshot = activeflow.clone();
        activeflow.record_event(Box::new(ActiveflowCreated {
            activeflow: snapshot,
            timestamp: now,
        }));
        activeflow
    }

    /// Whether the activeflow still accepts advances
    pub fn is_running(&self) -> bool {
        self.status == ActiveflowStatus::Running
    }

    /// Whether a jump is pending
    pub fn has_forward(&self) -> bool {
        !self.forward_action_id.is_empty()
    }

    /// Check that an advance expecting `expected` may proceed.
    ///
    /// `expected` must be the current action id, or `ActionId::CONTINUE` while
    /// the current action is a block.
    pub fn check_advance(&self, expected: &ActionId, max_execute_count: u64) -> Result<(), CoreError> {
        if self.execute_count >= max_execute_count {
            return Err(CoreError::ExecutionLimitExceeded(format!(
                "activeflow {} reached {} advances",
                self.id, self.execute_count
            )));
        }
        if !self.is_running() {
            return Err(CoreError::ActiveflowEnded(self.id.to_string()));
        }

        let continuing = *expected == ActionId::CONTINUE
            && self.current_action.action_type == crate::domain::action::ActionType::Block;
        if self.current_action.id != *expected && !continuing {
            return Err(CoreError::ValidationError(format!(
                "current action {} does not match {}",
                self.current_action.id, expected
            )));
        }
        Ok(())
    }

    /// The action the next advance lands on, honoring a pending jump
    pub fn resolve_next(&mut self) -> Result<(StackId, Action), CoreError> {
        if self.has_forward() {
            let forward_stack = self.forward_stack_id;
            let forward_action = self.forward_action_id;
            self.stack_map.get_action(&forward_stack, &forward_action, true)
        } else {
            let stack_id = self.current_stack_id;
            let current = self.current_action.clone();
            self.stack_map.get_next_action(&stack_id, &current, true)
        }
    }

    /// Move to a new current action
    pub fn advance_to(&mut self, stack_id: StackId, action: Action) -> Result<(), CoreError> {
        self.ensure_running()?;

        let previous = std::mem::replace(&mut self.current_action, action);
        if !previous.id.is_sentinel() {
            self.executed_actions.push(previous);
        }
        self.current_stack_id = stack_id;
        self.forward_stack_id = StackId::EMPTY;
        self.forward_action_id = ActionId::EMPTY;
        self.execute_count += 1;
        self.touch();
        Ok(())
    }

    /// Set the jump target, validated against the current stack's return chain
    pub fn forward_to(&mut self, action_id: &ActionId) -> Result<(), CoreError> {
        self.ensure_running()?;

        let current_stack = self.current_stack_id;
        let (stack_id, action) = self.stack_map.get_action(&current_stack, action_id, false)?;
        self.forward_stack_id = stack_id;
        self.forward_action_id = action.id;
        self.touch();
        Ok(())
    }

    /// Push a stack that returns to the current action, and jump to its first action
    pub fn push_stack(
        &mut self,
        stack_id: Option<StackId>,
        actions: Vec<Action>,
        max_depth: usize,
    ) -> Result<StackId, CoreError> {
        self.ensure_running()?;

        let return_stack = self.current_stack_id;
        let return_action = self.current_action.id;
        let stack = self.stack_map.push_stack_by_actions(
            stack_id,
            actions,
            return_stack,
            return_action,
            max_depth,
        )?;
        let pushed_id = stack.id;
        let first = stack.actions.first().map(|a| a.id);

        if let Some(first) = first {
            self.forward_stack_id = pushed_id;
            self.forward_action_id = first;
        }
        self.touch();
        Ok(pushed_id)
    }

    /// Splice actions right after the current action
    pub fn splice_actions(&mut self, actions: Vec<Action>) -> Result<(), CoreError> {
        self.ensure_running()?;

        let stack_id = self.current_stack_id;
        let after = self.current_action.id;
        self.stack_map.add_actions(&stack_id, &after, actions)?;
        self.touch();
        Ok(())
    }

    /// Replace the stored option of an action in the current return chain
    pub fn rewrite_option(
        &mut self,
        action_id: &ActionId,
        option: serde_json::Value,
    ) -> Result<(), CoreError> {
        let stack_id = self.current_stack_id;
        let action = self.stack_map.get_action_mut(&stack_id, action_id)?;
        action.option = option.clone();
        if self.current_action.id == *action_id {
            self.current_action.option = option;
        }
        Ok(())
    }

    /// Remove a pushed stack. When control sits inside it, control moves to
    /// the stack's return pointer.
    pub fn pop_stack(&mut self, stack_id: &StackId) -> Result<(), CoreError> {
        let stack = self.stack_map.pop_stack(stack_id)?;
        if self.current_stack_id == *stack_id {
            self.current_stack_id = stack.return_stack_id;
            if let Ok((_, action)) = self
                .stack_map
                .get_action(&stack.return_stack_id, &stack.return_action_id, false)
            {
                self.current_action = action;
            }
        }
        if self.forward_stack_id == *stack_id {
            self.forward_stack_id = StackId::EMPTY;
            self.forward_action_id = ActionId::EMPTY;
        }
        self.touch();
        Ok(())
    }

    /// End the activeflow
    pub fn end(&mut self) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.status = ActiveflowStatus::Ended;
        self.touch();
        Ok(())
    }

    /// Mark the activeflow deleted
    pub fn mark_deleted(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Fail unless the activeflow has not ended
    pub fn ensure_running(&self) -> Result<(), CoreError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CoreError::ActiveflowEnded(self.id.to_string()))
        }
    }

    /// Fail unless `action_id` is still the current action
    pub fn ensure_current(&self, action_id: &ActionId) -> Result<(), CoreError> {
        if self.current_action.id == *action_id {
            Ok(())
        } else {
            Err(CoreError::ValidationError(format!(
                "current action moved from {} to {}",
                action_id, self.current_action.id
            )))
        }
    }

    /// Record an "updated" event carrying the current state
    pub fn record_updated(&mut self) {
        let snapshot = self.clone();
        self.record_event(Box::new(ActiveflowUpdated {
            activeflow: snapshot,
            timestamp: self.updated_at,
        }));
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Take all recorded events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ActionType;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn new_activeflow(actions: Vec<Action>) -> Activeflow {
        Activeflow::new(NewActiveflow {
            id: ActiveflowId::new(),
            customer_id: CustomerId::new(),
            flow_id: FlowId::new(),
            reference_type: ReferenceType::Call,
            reference_id: Uuid::new_v4(),
            reference_activeflow_id: None,
            on_complete_flow_id: None,
            actions,
        })
    }

    #[test]
    fn test_new_activeflow() {
        let mut af = new_activeflow(vec![Action::new(ActionType::Answer, Value::Null)]);

        assert_eq!(af.status, ActiveflowStatus::Running);
        assert_eq!(af.current_stack_id, StackId::MAIN);
        assert_eq!(af.current_action.id, ActionId::START);
        assert_eq!(af.execute_count, 0);
        assert!(!af.has_forward());

        let events = af.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "activeflow_created");
        assert!(af.take_events().is_empty());
    }

    #[test]
    fn test_clone_drops_events() {
        let af = new_activeflow(vec![]);
        assert_eq!(af.events.len(), 1);
        assert!(af.clone().events.is_empty());
    }

    #[test]
    fn test_advance_records_audit() {
        let a1 = Action::new(ActionType::Answer, Value::Null);
        let a2 = Action::new(ActionType::Talk, Value::Null);
        let mut af = new_activeflow(vec![a1.clone(), a2.clone()]);

        let (stack_id, next) = af.resolve_next().unwrap();
        af.advance_to(stack_id, next).unwrap();
        assert_eq!(af.current_action, a1);
        assert!(af.executed_actions.is_empty());

        let (stack_id, next) = af.resolve_next().unwrap();
        af.advance_to(stack_id, next).unwrap();
        assert_eq!(af.current_action, a2);
        assert_eq!(af.executed_actions, vec![a1]);
        assert_eq!(af.execute_count, 2);
    }

    #[test]
    fn test_check_advance() {
        let a1 = Action::new(ActionType::Block, Value::Null);
        let mut af = new_activeflow(vec![a1.clone()]);

        assert!(af.check_advance(&ActionId::START, 100).is_ok());
        assert!(matches!(
            af.check_advance(&a1.id, 100),
            Err(CoreError::ValidationError(_))
        ));

        af.advance_to(StackId::MAIN, a1.clone()).unwrap();
        assert!(af.check_advance(&a1.id, 100).is_ok());
        assert!(af.check_advance(&ActionId::CONTINUE, 100).is_ok());
        assert!(matches!(
            af.check_advance(&a1.id, 1),
            Err(CoreError::ExecutionLimitExceeded(_))
        ));

        af.end().unwrap();
        assert!(matches!(
            af.check_advance(&a1.id, 100),
            Err(CoreError::ActiveflowEnded(_))
        ));
    }

    #[test]
    fn test_continue_requires_block() {
        let a1 = Action::new(ActionType::Talk, Value::Null);
        let mut af = new_activeflow(vec![a1.clone()]);
        af.advance_to(StackId::MAIN, a1).unwrap();
        assert!(af.check_advance(&ActionId::CONTINUE, 100).is_err());
    }

    #[test]
    fn test_end_only_once() {
        let mut af = new_activeflow(vec![]);
        af.end().unwrap();
        assert_eq!(af.status, ActiveflowStatus::Ended);
        assert!(af.end().is_err());
        assert!(af.forward_to(&ActionId::new()).is_err());
    }

    #[test]
    fn test_forward_and_push() {
        let a1 = Action::new(ActionType::Answer, Value::Null);
        let a2 = Action::new(ActionType::Talk, Value::Null);
        let mut af = new_activeflow(vec![a1.clone(), a2.clone()]);
        af.advance_to(StackId::MAIN, a1.clone()).unwrap();

        af.forward_to(&a2.id).unwrap();
        assert_eq!(af.forward_stack_id, StackId::MAIN);
        assert_eq!(af.forward_action_id, a2.id);
        assert!(af.forward_to(&ActionId::new()).is_err());

        let pushed = Action::new(ActionType::Play, json!({"stream_urls": ["a.wav"]}));
        let stack_id = af.push_stack(None, vec![pushed.clone()], 32).unwrap();
        assert_eq!(af.forward_stack_id, stack_id);
        assert_eq!(af.forward_action_id, pushed.id);

        let (next_stack, next) = af.resolve_next().unwrap();
        af.advance_to(next_stack, next).unwrap();
        assert_eq!(af.current_action, pushed);

        // the pushed stack returns to a1, so a2 follows
        let (next_stack, next) = af.resolve_next().unwrap();
        assert_eq!(next_stack, StackId::MAIN);
        assert_eq!(next, a2);
    }

    #[test]
    fn test_pop_stack_moves_current_back() {
        let a1 = Action::new(ActionType::Answer, Value::Null);
        let mut af = new_activeflow(vec![a1.clone()]);
        af.advance_to(StackId::MAIN, a1.clone()).unwrap();

        let pushed = Action::new(ActionType::Block, Value::Null);
        let stack_id = af.push_stack(None, vec![pushed.clone()], 32).unwrap();
        let (next_stack, next) = af.resolve_next().unwrap();
        af.advance_to(next_stack, next).unwrap();

        af.pop_stack(&stack_id).unwrap();
        assert_eq!(af.current_stack_id, StackId::MAIN);
        assert_eq!(af.current_action, a1);
    }

    #[test]
    fn test_rewrite_option() {
        let goto = Action::new(ActionType::Goto, json!({"loop_count": 2}));
        let mut af = new_activeflow(vec![goto.clone()]);
        af.advance_to(StackId::MAIN, goto.clone()).unwrap();

        af.rewrite_option(&goto.id, json!({"loop_count": 1})).unwrap();
        assert_eq!(af.current_action.option["loop_count"], 1);
        let (_, stored) = af.stack_map.get_action(&StackId::MAIN, &goto.id, false).unwrap();
        assert_eq!(stored.option["loop_count"], 1);
    }

    #[test]
    fn test_media_type() {
        assert_eq!(ReferenceType::Call.media_type(), MediaType::Audio);
        assert_eq!(ReferenceType::Conversation.media_type(), MediaType::Text);
        assert_eq!(ReferenceType::Api.media_type(), MediaType::None);
    }
}
