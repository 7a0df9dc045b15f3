//! The advance loop.
//!
//! One call of [`ActiveflowService::execute_next_action`] advances the
//! activeflow under its lease, executes the landed-on action and keeps
//! going until an action needs the reference layer, the flow finishes, or
//! an error stops it.

use crate::application::activeflow_service::ActiveflowService;
use crate::application::handlers::{
    ActionContext, FireAndReportAction, PassThroughAction, Route, RoutingAction, Subroutine,
    SubroutineAction,
};
use crate::domain::action::{Action, ActionId, ActionShape, ActionType};
use crate::domain::activeflow::{Activeflow, ActiveflowId};
use crate::domain::option::ActionOption;
use crate::domain::variable;
use crate::CoreError;
use activeflow_monitoring::MetricType;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// What the loop does after an action was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Advance past the action
    Next,
    /// Hand the action to the reference layer and return
    Wait,
}

/// Why an action could not be executed
#[derive(Debug)]
enum StepError {
    /// The flow cannot go on and is stopped
    Fatal(CoreError),
    /// Another trigger got there first; the flow is left as it is
    Refused(CoreError),
}

/// Errors that refuse a trigger without harming the flow: a stale or
/// duplicate trigger, a busy lease, or a record that is gone
fn is_refusal(e: &CoreError) -> bool {
    matches!(
        e,
        CoreError::ValidationError(_) | CoreError::LockUnavailable(_) | CoreError::ActiveflowNotFound(_)
    )
}

fn classify(e: CoreError) -> StepError {
    if is_refusal(&e) {
        StepError::Refused(e)
    } else {
        StepError::Fatal(e)
    }
}

impl ActiveflowService {
    /// Start executing an activeflow from its first action
    pub async fn execute(&self, id: &ActiveflowId) -> Result<Action, CoreError> {
        info!(activeflow_id = %id, "Executing activeflow");
        self.execute_next_action(id, &ActionId::START).await
    }

    /// Release a `block` action. `action_id` must be the blocking action.
    pub async fn execute_continue(
        &self,
        id: &ActiveflowId,
        action_id: &ActionId,
    ) -> Result<Action, CoreError> {
        let activeflow = self.store.get(id).await?;
        if activeflow.current_action.id != *action_id {
            return Err(CoreError::ValidationError(format!(
                "current action is {}, not {}",
                activeflow.current_action.id, action_id
            )));
        }
        if activeflow.current_action.action_type != ActionType::Block {
            return Err(CoreError::ValidationError(format!(
                "current action {} is not blocked",
                action_id
            )));
        }

        self.execute_next_action(id, &ActionId::CONTINUE).await
    }

    /// Advance past `expected` and keep executing.
    ///
    /// Returns the action the reference layer has to perform, or the finish
    /// action once the flow is done. A stale `expected` is refused and leaves
    /// the flow untouched; any other failure stops and deletes the flow.
    pub async fn execute_next_action(
        &self,
        id: &ActiveflowId,
        expected: &ActionId,
    ) -> Result<Action, CoreError> {
        let mut expected = *expected;

        for _ in 0..self.config.max_next_action_loop {
            let (activeflow, action) = match self.update_next_action(id, &expected).await {
                Ok(advanced) => advanced,
                Err(e) if is_refusal(&e) => {
                    warn!(activeflow_id = %id, expected = %expected, error = %e, "Advance refused");
                    return Err(e);
                }
                Err(e) => {
                    error!(activeflow_id = %id, expected = %expected, error = %e, "Advance failed, stopping activeflow");
                    self.terminate(id).await;
                    return Err(e);
                }
            };

            if action.is_finish() {
                info!(activeflow_id = %id, execute_count = activeflow.execute_count, "Activeflow finished");
                self.terminate(id).await;
                return Ok(action);
            }

            match self.execute_action(&activeflow, &action).await {
                Ok(Step::Next) => expected = action.id,
                Ok(Step::Wait) => {
                    debug!(activeflow_id = %id, action_id = %action.id, action_type = %action.action_type, "Waiting for the reference");
                    return Ok(action);
                }
                Err(StepError::Refused(e)) => {
                    warn!(activeflow_id = %id, action_id = %action.id, error = %e, "Flow moved on concurrently");
                    return Err(e);
                }
                Err(StepError::Fatal(e)) => {
                    error!(activeflow_id = %id, action_id = %action.id, action_type = %action.action_type, error = %e, "Action failed, stopping activeflow");
                    self.terminate(id).await;
                    return Err(e);
                }
            }
        }

        error!(activeflow_id = %id, limit = self.config.max_next_action_loop, "Advance loop exhausted, stopping activeflow");
        self.terminate(id).await;
        Err(CoreError::ExecutionLimitExceeded(format!(
            "activeflow {} ran {} actions in one advance",
            id, self.config.max_next_action_loop
        )))
    }

    /// Move the activeflow to its next action under the lease, and publish
    /// the update. The returned action has its option substituted.
    async fn update_next_action(
        &self,
        id: &ActiveflowId,
        expected: &ActionId,
    ) -> Result<(Activeflow, Action), CoreError> {
        let (mut activeflow, token) = self.store.get_with_lock(id).await?;
        let res = self.advance_locked(&mut activeflow, expected).await;
        self.store.release(id, &token).await;

        let action = res?;
        self.handle_events(&mut activeflow).await;
        trace!(activeflow_id = %id, action_id = %action.id, action_type = %action.action_type, "Advanced");
        Ok((activeflow, action))
    }

    async fn advance_locked(
        &self,
        activeflow: &mut Activeflow,
        expected: &ActionId,
    ) -> Result<Action, CoreError> {
        activeflow.check_advance(expected, self.config.max_execute_count)?;

        let (stack_id, mut action) = activeflow.resolve_next()?;
        if !action.option.is_null() {
            let bag = self.variables.get(&activeflow.id).await?;
            action.option = variable::substitute_json(&action.option, &bag.variables);
        }

        activeflow.advance_to(stack_id, action.clone())?;
        self.store.update(activeflow).await?;
        activeflow.record_updated();
        Ok(action)
    }

    async fn execute_action(
        &self,
        activeflow: &Activeflow,
        action: &Action,
    ) -> Result<Step, StepError> {
        let media = activeflow.reference_type.media_type();
        if !action.action_type.supports_media(media) {
            debug!(
                activeflow_id = %activeflow.id,
                action_type = %action.action_type,
                reference_type = %activeflow.reference_type,
                "Action unsupported by the reference, skipping"
            );
            return Ok(Step::Next);
        }

        let option = ActionOption::from_action(action).map_err(StepError::Fatal)?;
        let ctx = ActionContext {
            activeflow,
            action,
            rpc: &self.rpc,
            variables: &self.variables,
        };

        let started = Instant::now();
        let step = match action.action_type.shape() {
            ActionShape::Routing => {
                let handler = option.as_routing().ok_or_else(|| shape_mismatch(action))?;
                self.apply_route(&ctx, handler).await
            }
            ActionShape::Subroutine => {
                let handler = option.as_subroutine().ok_or_else(|| shape_mismatch(action))?;
                self.apply_subroutine(&ctx, handler).await
            }
            ActionShape::FireAndReport => {
                let handler = option
                    .as_fire_and_report()
                    .ok_or_else(|| shape_mismatch(action))?;
                self.apply_fire(&ctx, handler).await
            }
            ActionShape::PassThrough => {
                let handler = option.as_pass_through().ok_or_else(|| shape_mismatch(action))?;
                Ok(pass_through(handler))
            }
        };

        self.metrics.record_metric(
            "activeflow_action_execute_duration_ms",
            started.elapsed().as_secs_f64() * 1000.0,
            MetricType::Histogram,
            HashMap::from([(
                "action_type".to_string(),
                action.action_type.as_str().to_string(),
            )]),
        );
        step
    }

    async fn apply_route(
        &self,
        ctx: &ActionContext<'_>,
        handler: &dyn RoutingAction,
    ) -> Result<Step, StepError> {
        let route = handler.route(ctx).await.map_err(StepError::Fatal)?;
        let action_id = ctx.action.id;

        let updated = match route {
            Route::Continue => return Ok(Step::Next),
            Route::Forward(target) => {
                self.store
                    .update_with_lock(&ctx.activeflow.id, move |af| {
                        af.ensure_current(&action_id)?;
                        af.forward_to(&target)
                    })
                    .await
            }
            Route::Loop { target, option } => {
                self.store
                    .update_with_lock(&ctx.activeflow.id, move |af| {
                        af.ensure_current(&action_id)?;
                        af.rewrite_option(&action_id, option)?;
                        af.forward_to(&target)
                    })
                    .await
            }
        };

        let (mut activeflow, ()) = updated.map_err(classify)?;
        debug!(
            activeflow_id = %activeflow.id,
            action_id = %action_id,
            forward_action_id = %activeflow.forward_action_id,
            "Route applied"
        );
        self.handle_events(&mut activeflow).await;
        Ok(Step::Next)
    }

    async fn apply_subroutine(
        &self,
        ctx: &ActionContext<'_>,
        handler: &dyn SubroutineAction,
    ) -> Result<Step, StepError> {
        let Subroutine { stack_id, actions } =
            handler.dispatch(ctx).await.map_err(StepError::Fatal)?;
        if actions.is_empty() {
            return Ok(Step::Next);
        }

        let action_id = ctx.action.id;
        let max_depth = self.config.max_stack_depth;
        let count = actions.len();
        let (mut activeflow, pushed) = self
            .store
            .update_with_lock(&ctx.activeflow.id, move |af| {
                af.ensure_current(&action_id)?;
                af.push_stack(stack_id, actions, max_depth)
            })
            .await
            .map_err(classify)?;
        debug!(activeflow_id = %activeflow.id, stack_id = %pushed, count, "Stack pushed");
        self.handle_events(&mut activeflow).await;

        handler
            .after_push(ctx, &pushed)
            .await
            .map_err(StepError::Fatal)?;
        Ok(Step::Next)
    }

    async fn apply_fire(
        &self,
        ctx: &ActionContext<'_>,
        handler: &dyn FireAndReportAction,
    ) -> Result<Step, StepError> {
        if let Err(e) = handler.fire(ctx).await {
            warn!(
                activeflow_id = %ctx.activeflow.id,
                action_id = %ctx.action.id,
                action_type = %ctx.action.action_type,
                error = %e,
                "Action failed, continuing"
            );
            self.metrics.record_metric(
                "activeflow_action_failed_total",
                1.0,
                MetricType::Counter,
                HashMap::from([(
                    "action_type".to_string(),
                    ctx.action.action_type.as_str().to_string(),
                )]),
            );
        }
        Ok(Step::Next)
    }

    /// Stop and soft-delete, logging failures
    async fn terminate(&self, id: &ActiveflowId) {
        if let Err(e) = self.delete(id).await {
            error!(activeflow_id = %id, error = %e, "Could not stop activeflow");
        }
    }
}

fn shape_mismatch(action: &Action) -> StepError {
    StepError::Fatal(CoreError::OptionDecodeError(format!(
        "{} has no {:?} handler",
        action.action_type,
        action.action_type.shape()
    )))
}

fn pass_through(handler: &dyn PassThroughAction) -> Step {
    if handler.waits_for_reference() {
        Step::Wait
    } else {
        Step::Next
    }
}
