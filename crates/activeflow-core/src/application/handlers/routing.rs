use super::{ActionContext, Route, RoutingAction};
use crate::domain::action::ActionId;
use crate::domain::option::{
    BranchOption, ConditionCallDigitsOption, ConditionCallStatusOption, ConditionDatetimeOption,
    ConditionVariableOption, GotoOption, VariableValueType,
};
use crate::domain::variable::KEY_CALL_DIGITS;
use crate::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

fn route_on(matched: bool, false_target_id: ActionId) -> Route {
    if matched || false_target_id.is_empty() {
        Route::Continue
    } else {
        Route::Forward(false_target_id)
    }
}

#[async_trait]
impl RoutingAction for GotoOption {
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        if self.loop_count <= 0 {
            debug!(activeflow_id = %ctx.activeflow.id, action_id = %ctx.action.id, "Goto loop exhausted");
            return Ok(Route::Continue);
        }

        let option = serde_json::to_value(GotoOption {
            target_id: self.target_id,
            loop_count: self.loop_count - 1,
        })?;
        Ok(Route::Loop {
            target: self.target_id,
            option,
        })
    }
}

#[async_trait]
impl RoutingAction for BranchOption {
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        let key = if self.variable.is_empty() {
            KEY_CALL_DIGITS
        } else {
            self.variable.as_str()
        };

        let variable = ctx.variables.get(&ctx.activeflow.id).await?;
        let value = variable.get(key).unwrap_or_default().to_string();

        // consumed, so a later branch on the same key starts clean
        if let Err(e) = ctx
            .variables
            .set_variable(
                &ctx.activeflow.id,
                HashMap::from([(key.to_string(), String::new())]),
            )
            .await
        {
            warn!(activeflow_id = %ctx.activeflow.id, key, error = %e, "Could not reset branch variable, routing anyway");
        }

        let target = self
            .target_ids
            .get(&value)
            .copied()
            .unwrap_or(self.default_target_id);
        debug!(activeflow_id = %ctx.activeflow.id, key, value = %value, target = %target, "Branching");

        if target.is_empty() {
            Ok(Route::Continue)
        } else {
            Ok(Route::Forward(target))
        }
    }
}

#[async_trait]
impl RoutingAction for ConditionCallDigitsOption {
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        let call_id = ctx.call_id()?;
        let digits = ctx.rpc.call_get_digits(call_id).await?;

        let matched = (self.length != 0 && digits.chars().count() >= self.length)
            || (!self.key.is_empty() && digits.contains(self.key.as_str()));
        Ok(route_on(matched, self.false_target_id))
    }
}

#[async_trait]
impl RoutingAction for ConditionCallStatusOption {
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        let call_id = ctx.call_id()?;
        let call = ctx.rpc.call_get(call_id).await?;

        let matched = self.status == Some(call.status);
        Ok(route_on(matched, self.false_target_id))
    }
}

impl ConditionDatetimeOption {
    /// Whether the condition holds at `now`. Unset fields always hold.
    pub fn matches_at(&self, now: DateTime<Utc>) -> bool {
        if !self.weekdays.is_empty() && !self.weekdays.contains(&now.weekday().num_days_from_sunday()) {
            return false;
        }

        let op = self.condition;
        let fields = [
            (self.month > 0, self.month, now.month() as i32),
            (self.day > 0, self.day, now.day() as i32),
            (self.hour >= 0, self.hour, now.hour() as i32),
            (self.minute >= 0, self.minute, now.minute() as i32),
        ];
        fields
            .iter()
            .filter(|(set, _, _)| *set)
            .all(|(_, expected, actual)| op.compare(expected, actual))
    }
}

#[async_trait]
impl RoutingAction for ConditionDatetimeOption {
    async fn route(&self, _ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        Ok(route_on(self.matches_at(Utc::now()), self.false_target_id))
    }
}

impl ConditionVariableOption {
    /// Whether `value OP operand` holds. `value` is the option's variable
    /// after substitution.
    pub fn matches(&self, value: &str) -> bool {
        let op = self.condition;
        match self.value_type {
            VariableValueType::String => op.compare(value, self.value_string.as_str()),
            VariableValueType::Number => match value.trim().parse::<f32>() {
                Ok(number) => op.compare(&number, &self.value_number),
                Err(_) => false,
            },
            VariableValueType::Length => op.compare(&value.chars().count(), &self.value_length),
        }
    }
}

#[async_trait]
impl RoutingAction for ConditionVariableOption {
    async fn route(&self, ctx: &ActionContext<'_>) -> Result<Route, CoreError> {
        let matched = self.matches(&self.variable);
        debug!(activeflow_id = %ctx.activeflow.id, value = %self.variable, matched, "Evaluated variable condition");
        Ok(route_on(matched, self.false_target_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{call_activeflow, variable_service, variables};
    use crate::domain::action::{Action, ActionType};
    use crate::domain::option::ConditionOperator;
    use crate::domain::repository::MockVariableRepository;
    use crate::domain::rpc::{Call, CallStatus, MockRpcFacade, RpcFacade};
    use crate::domain::variable::Variable;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_goto_decrements_until_exhausted() {
        let target = ActionId::new();
        let af = call_activeflow(vec![]);
        let action = Action::new(ActionType::Goto, serde_json::Value::Null);
        let rpc: Arc<dyn RpcFacade> = Arc::new(MockRpcFacade::new());
        let (vars, _) = variables(HashMap::new());
        let ctx = ActionContext {
            activeflow: &af,
            action: &action,
            rpc: &rpc,
            variables: &vars,
        };

        let route = GotoOption {
            target_id: target,
            loop_count: 2,
        }
        .route(&ctx)
        .await
        .unwrap();
        assert_eq!(
            route,
            Route::Loop {
                target,
                option: serde_json::json!({"target_id": target, "loop_count": 1}),
            }
        );

        let route = GotoOption {
            target_id: target,
            loop_count: 0,
        }
        .route(&ctx)
        .await
        .unwrap();
        assert_eq!(route, Route::Continue);
    }

    #[tokio::test]
    async fn test_branch_reads_and_resets_digits() {
        let one = ActionId::new();
        let fallback = ActionId::new();
        let af = call_activeflow(vec![]);
        let action = Action::new(ActionType::Branch, serde_json::Value::Null);
        let rpc: Arc<dyn RpcFacade> = Arc::new(MockRpcFacade::new());
        let (vars, stored) = variables(HashMap::from([(KEY_CALL_DIGITS.to_string(), "1".to_string())]));
        let ctx = ActionContext {
            activeflow: &af,
            action: &action,
            rpc: &rpc,
            variables: &vars,
        };
        let option = BranchOption {
            variable: String::new(),
            default_target_id: fallback,
            target_ids: HashMap::from([("1".to_string(), one)]),
        };

        assert_eq!(option.route(&ctx).await.unwrap(), Route::Forward(one));
        assert_eq!(stored.lock().unwrap().get(KEY_CALL_DIGITS), Some(""));

        // digits were consumed
        assert_eq!(option.route(&ctx).await.unwrap(), Route::Forward(fallback));
    }

    #[tokio::test]
    async fn test_branch_routes_when_reset_fails() {
        let two = ActionId::new();
        let af = call_activeflow(vec![]);
        let action = Action::new(ActionType::Branch, serde_json::Value::Null);
        let rpc: Arc<dyn RpcFacade> = Arc::new(MockRpcFacade::new());

        let mut repo = MockVariableRepository::new();
        repo.expect_find_by_id().returning(|id| {
            Ok(Some(Variable::new(
                *id,
                HashMap::from([("menu".to_string(), "2".to_string())]),
            )))
        });
        repo.expect_update()
            .times(1)
            .returning(|_| Err(CoreError::StateStoreError("write failed".to_string())));
        let vars = variable_service(repo);
        let ctx = ActionContext {
            activeflow: &af,
            action: &action,
            rpc: &rpc,
            variables: &vars,
        };

        let option = BranchOption {
            variable: "menu".to_string(),
            default_target_id: ActionId::EMPTY,
            target_ids: HashMap::from([("2".to_string(), two)]),
        };
        assert_eq!(option.route(&ctx).await.unwrap(), Route::Forward(two));
    }

    #[tokio::test]
    async fn test_condition_call_digits() {
        let no = ActionId::new();
        let af = call_activeflow(vec![]);
        let call_id = af.reference_id;
        let action = Action::new(ActionType::ConditionCallDigits, serde_json::Value::Null);

        let mut mock = MockRpcFacade::new();
        mock.expect_call_get_digits()
            .withf(move |id| *id == call_id)
            .returning(|_| Ok("12#".to_string()));
        let rpc: Arc<dyn RpcFacade> = Arc::new(mock);
        let (vars, _) = variables(HashMap::new());
        let ctx = ActionContext {
            activeflow: &af,
            action: &action,
            rpc: &rpc,
            variables: &vars,
        };

        let by_key = ConditionCallDigitsOption {
            length: 0,
            key: "#".to_string(),
            false_target_id: no,
        };
        assert_eq!(by_key.route(&ctx).await.unwrap(), Route::Continue);

        let too_long = ConditionCallDigitsOption {
            length: 4,
            key: String::new(),
            false_target_id: no,
        };
        assert_eq!(too_long.route(&ctx).await.unwrap(), Route::Forward(no));
    }

    #[tokio::test]
    async fn test_condition_call_status() {
        let no = ActionId::new();
        let af = call_activeflow(vec![]);
        let action = Action::new(ActionType::ConditionCallStatus, serde_json::Value::Null);

        let mut mock = MockRpcFacade::new();
        mock.expect_call_get().returning(|id| {
            Ok(Call {
                id,
                status: CallStatus::Ringing,
                recording_ids: vec![],
            })
        });
        let rpc: Arc<dyn RpcFacade> = Arc::new(mock);
        let (vars, _) = variables(HashMap::new());
        let ctx = ActionContext {
            activeflow: &af,
            action: &action,
            rpc: &rpc,
            variables: &vars,
        };

        let option = ConditionCallStatusOption {
            status: Some(CallStatus::Progressing),
            false_target_id: no,
        };
        assert_eq!(option.route(&ctx).await.unwrap(), Route::Forward(no));
    }

    #[test]
    fn test_datetime_matches_at() {
        // 2024-03-05 was a Tuesday
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();

        let mut option = ConditionDatetimeOption {
            hour: 9,
            condition: ConditionOperator::LessOrEqual,
            ..ConditionDatetimeOption::default()
        };
        assert!(option.matches_at(now));

        option.weekdays = vec![0, 6];
        assert!(!option.matches_at(now));

        let option = ConditionDatetimeOption {
            month: 3,
            day: 5,
            ..ConditionDatetimeOption::default()
        };
        assert!(option.matches_at(now));

        let option = ConditionDatetimeOption {
            minute: 31,
            ..ConditionDatetimeOption::default()
        };
        assert!(!option.matches_at(now));
    }

    #[test]
    fn test_variable_condition_types() {
        let number = ConditionVariableOption {
            condition: ConditionOperator::Greater,
            value_type: VariableValueType::Number,
            value_number: 10.0,
            ..ConditionVariableOption::default()
        };
        assert!(number.matches("10.5"));
        assert!(!number.matches("9"));
        assert!(!number.matches("ten"));

        let length = ConditionVariableOption {
            condition: ConditionOperator::Equal,
            value_type: VariableValueType::Length,
            value_length: 4,
            ..ConditionVariableOption::default()
        };
        assert!(length.matches("1234"));

        let string = ConditionVariableOption {
            condition: ConditionOperator::NotEqual,
            value_string: "no".to_string(),
            ..ConditionVariableOption::default()
        };
        assert!(string.matches("yes"));
    }
}
