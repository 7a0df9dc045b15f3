//! Stack map: the call stack of an activeflow.
//!
//! Every activeflow owns a map of stacks keyed by [`StackId`]. The main stack
//! holds the flow's own actions. Sub-flows (a queue's wait loop, a fetched
//! action list, a connect bridge) are pushed as new stacks whose return
//! pointer names the stack and action to resume once they run out.

use crate::domain::action::{Action, ActionId};
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

uuid_id!(
    /// Value object: Stack ID
    StackId
);

impl StackId {
    /// The stack holding the flow's own actions
    pub const MAIN: Self = Self(Uuid::from_u128(1));
}

/// One frame of the stack map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack identifier
    pub id: StackId,

    /// Actions, in execution order
    pub actions: Vec<Action>,

    /// Stack to resume when this one is exhausted; empty for the main stack
    pub return_stack_id: StackId,

    /// Action in the return stack control resumes after
    pub return_action_id: ActionId,
}

/// All stacks of one activeflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackMap(HashMap<StackId, Stack>);

impl StackMap {
    /// Build a stack map whose main stack holds the given actions
    pub fn create(actions: Vec<Action>) -> Self {
        let mut stacks = HashMap::new();
        stacks.insert(
            StackId::MAIN,
            Stack {
                id: StackId::MAIN,
                actions,
                return_stack_id: StackId::EMPTY,
                return_action_id: ActionId::EMPTY,
            },
        );
        Self(stacks)
    }

    /// Number of stacks
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no stack at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a stack exists
    pub fn contains(&self, stack_id: &StackId) -> bool {
        self.0.contains_key(stack_id)
    }

    /// Look up a stack
    pub fn get_stack(&self, stack_id: &StackId) -> Result<&Stack, CoreError> {
        self.0
            .get(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.to_string()))
    }

    /// Nesting depth of a stack: 1 for a stack without return pointer
    pub fn depth(&self, stack_id: &StackId) -> Result<usize, CoreError> {
        let mut depth = 0;
        let mut current = *stack_id;
        while !current.is_empty() {
            depth += 1;
            if depth > self.0.len() {
                return Err(CoreError::ValidationError(format!(
                    "return chain of stack {} loops",
                    stack_id
                )));
            }
            current = self.get_stack(&current)?.return_stack_id;
        }
        Ok(depth)
    }

    /// Find an action by searching `start_stack_id` and then its return chain.
    ///
    /// With `allow_sentinel` the finish pseudo-action resolves to
    /// [`Action::finish`], and the pushed stacks climbed through on the way to
    /// the match are released. Without it the map is never modified and
    /// pseudo-action ids are not found. The continue marker is never looked
    /// up here; `Activeflow::check_advance` resolves it to the current action.
    pub fn get_action(
        &mut self,
        start_stack_id: &StackId,
        action_id: &ActionId,
        allow_sentinel: bool,
    ) -> Result<(StackId, Action), CoreError> {
        if allow_sentinel && *action_id == ActionId::FINISH {
            return Ok((*start_stack_id, Action::finish()));
        }
        if action_id.is_sentinel() || action_id.is_empty() {
            return Err(CoreError::ActionNotFound(action_id.to_string()));
        }

        let mut passed = Vec::new();
        let mut stack_id = *start_stack_id;
        loop {
            let stack = self.get_stack(&stack_id)?;
            if let Some(action) = stack.actions.iter().find(|a| a.id == *action_id) {
                let action = action.clone();
                if allow_sentinel {
                    for id in passed {
                        self.remove_stack(&id)?;
                    }
                }
                return Ok((stack_id, action));
            }

            if stack.return_stack_id.is_empty() || passed.len() >= self.0.len() {
                return Err(CoreError::ActionNotFound(action_id.to_string()));
            }
            passed.push(stack_id);
            stack_id = stack.return_stack_id;
        }
    }

    /// Mutable access to an action of the stack or its return chain
    pub fn get_action_mut(
        &mut self,
        stack_id: &StackId,
        action_id: &ActionId,
    ) -> Result<&mut Action, CoreError> {
        let mut owner = *stack_id;
        let mut hops = 0;
        loop {
            let stack = self.get_stack(&owner)?;
            if stack.actions.iter().any(|a| a.id == *action_id) {
                break;
            }
            if stack.return_stack_id.is_empty() || hops >= self.0.len() {
                return Err(CoreError::ActionNotFound(action_id.to_string()));
            }
            hops += 1;
            owner = stack.return_stack_id;
        }

        self.0
            .get_mut(&owner)
            .and_then(|stack| stack.actions.iter_mut().find(|a| a.id == *action_id))
            .ok_or_else(|| CoreError::ActionNotFound(action_id.to_string()))
    }

    /// The sequential successor of `current` in `stack_id`.
    ///
    /// Honors `current.next_id`. When the stack runs out, it pops to the
    /// return pointer and continues after the return action (whose own
    /// `next_id` is honored too). An exhausted stack without return pointer
    /// yields [`Action::finish`]. With `allow_sentinel` popped stacks are
    /// removed from the map.
    pub fn get_next_action(
        &mut self,
        stack_id: &StackId,
        current: &Action,
        allow_sentinel: bool,
    ) -> Result<(StackId, Action), CoreError> {
        if current.id == ActionId::START {
            let main = self.get_stack(&StackId::MAIN)?;
            let first = main.actions.first().cloned().unwrap_or_else(Action::finish);
            return Ok((StackId::MAIN, first));
        }
        if !current.next_id.is_empty() {
            return self.get_action(stack_id, &current.next_id, allow_sentinel);
        }

        let mut stack_id = *stack_id;
        let mut after = Some(current.id);
        for _ in 0..=self.0.len() {
            let stack = self.get_stack(&stack_id)?;
            let next_idx = match after {
                Some(id) => {
                    let idx = stack
                        .actions
                        .iter()
                        .position(|a| a.id == id)
                        .ok_or_else(|| CoreError::ActionNotFound(id.to_string()))?;
                    idx + 1
                }
                None => 0,
            };
            if let Some(next) = stack.actions.get(next_idx) {
                return Ok((stack_id, next.clone()));
            }
            if stack.return_stack_id.is_empty() {
                return Ok((stack_id, Action::finish()));
            }

            let return_stack_id = stack.return_stack_id;
            let return_action_id = stack.return_action_id;
            if allow_sentinel {
                self.remove_stack(&stack_id)?;
            }

            if return_action_id.is_empty() {
                // resume from the top of the return stack
                after = None;
            } else {
                let return_action = self
                    .get_stack(&return_stack_id)?
                    .actions
                    .iter()
                    .find(|a| a.id == return_action_id)
                    .cloned()
                    .ok_or_else(|| CoreError::ActionNotFound(return_action_id.to_string()))?;
                if !return_action.next_id.is_empty() {
                    return self.get_action(&return_stack_id, &return_action.next_id, allow_sentinel);
                }
                after = Some(return_action.id);
            }
            stack_id = return_stack_id;
        }

        Err(CoreError::ValidationError(format!(
            "return chain from stack {} loops",
            stack_id
        )))
    }

    /// Push a new stack of actions.
    ///
    /// `stack_id` is generated when `None` or empty. Fails when the id is
    /// already taken or the new stack would nest deeper than `max_depth`.
    pub fn push_stack_by_actions(
        &mut self,
        stack_id: Option<StackId>,
        actions: Vec<Action>,
        return_stack_id: StackId,
        return_action_id: ActionId,
        max_depth: usize,
    ) -> Result<&Stack, CoreError> {
        let id = match stack_id {
            Some(id) if !id.is_empty() => id,
            _ => StackId::new(),
        };
        if self.0.contains_key(&id) {
            return Err(CoreError::ValidationError(format!("stack {} already exists", id)));
        }

        let depth = if return_stack_id.is_empty() {
            1
        } else {
            self.depth(&return_stack_id)? + 1
        };
        if depth > max_depth {
            return Err(CoreError::StackDepthExceeded(format!(
                "depth {} exceeds {}",
                depth, max_depth
            )));
        }

        let stack = self.0.entry(id).or_insert(Stack {
            id,
            actions,
            return_stack_id,
            return_action_id,
        });
        Ok(stack)
    }

    /// Remove a pushed stack, returning it. The main stack cannot be popped.
    pub fn pop_stack(&mut self, stack_id: &StackId) -> Result<Stack, CoreError> {
        self.remove_stack(stack_id)
    }

    /// Splice actions into a stack right after `after_action_id`
    pub fn add_actions(
        &mut self,
        stack_id: &StackId,
        after_action_id: &ActionId,
        actions: Vec<Action>,
    ) -> Result<(), CoreError> {
        let stack = self
            .0
            .get_mut(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.to_string()))?;

        let idx = if *after_action_id == ActionId::START {
            0
        } else {
            stack
                .actions
                .iter()
                .position(|a| a.id == *after_action_id)
                .map(|idx| idx + 1)
                .ok_or_else(|| CoreError::ActionNotFound(after_action_id.to_string()))?
        };
        stack.actions.splice(idx..idx, actions);
        Ok(())
    }

    fn remove_stack(&mut self, stack_id: &StackId) -> Result<Stack, CoreError> {
        if *stack_id == StackId::MAIN {
            return Err(CoreError::ValidationError(
                "the main stack cannot be removed".to_string(),
            ));
        }
        self.0
            .remove(stack_id)
            .ok_or_else(|| CoreError::StackNotFound(stack_id.to_string()))
    }
}
