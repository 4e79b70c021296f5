//! Execution records — the mutable context of one run and its immutable result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::automation::ActionType;
use crate::id::AutomationId;
use crate::time::{Timestamp, now};

/// Variables and accumulated results available while one run is in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub user_id: String,
    pub definition_id: String,
    pub triggered_by: String,
    pub variables: Map<String, Value>,
    pub previous_results: Map<String, Value>,
}

impl ExecutionContext {
    /// Seed a context from a trigger payload.
    ///
    /// An object payload becomes the variable bag; any other non-null
    /// payload is exposed as the single variable `payload`.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        definition_id: impl Into<String>,
        triggered_by: impl Into<String>,
        payload: Value,
    ) -> Self {
        let variables = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        Self {
            user_id: user_id.into(),
            definition_id: definition_id.into(),
            triggered_by: triggered_by.into(),
            variables,
            previous_results: Map::new(),
        }
    }

    /// The lookup scope used for interpolation and conditions.
    ///
    /// Variables win over previous-result keys of the same name; the full
    /// result map is also reachable as `previousResults`.
    #[must_use]
    pub fn scope(&self) -> Value {
        let mut scope = self.variables.clone();
        for (key, value) in &self.previous_results {
            scope.entry(key.clone()).or_insert_with(|| value.clone());
        }
        scope.insert(
            "previousResults".to_string(),
            Value::Object(self.previous_results.clone()),
        );
        Value::Object(scope)
    }

    /// Run metadata exposed to scripts and webhook payloads.
    #[must_use]
    pub fn metadata(&self) -> Value {
        serde_json::json!({
            "userId": self.user_id,
            "definitionId": self.definition_id,
            "triggeredBy": self.triggered_by,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        })
    }
}

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_type: ActionType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ActionOutcome {
    #[must_use]
    pub fn succeeded(action_type: ActionType, result: Value, duration_ms: u64) -> Self {
        Self {
            action_type,
            success: true,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    #[must_use]
    pub fn failed(action_type: ActionType, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            action_type,
            success: false,
            result: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// JSON form stored in `previous_results`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Immutable record of one automation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub automation_id: AutomationId,
    pub status: ExecutionStatus,
    pub triggered_by: String,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    pub actions_executed: usize,
    pub outcomes: Vec<ActionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A fresh `RUNNING` record.
    #[must_use]
    pub fn start(automation_id: AutomationId, triggered_by: impl Into<String>) -> Self {
        Self {
            automation_id,
            status: ExecutionStatus::Running,
            triggered_by: triggered_by.into(),
            started_at: now(),
            completed_at: None,
            actions_executed: 0,
            outcomes: Vec::new(),
            error: None,
        }
    }

    /// A terminal `CANCELLED` record carrying a human-readable reason.
    #[must_use]
    pub fn cancelled(
        automation_id: AutomationId,
        triggered_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut result = Self::start(automation_id, triggered_by);
        result.finish(ExecutionStatus::Cancelled, Some(reason.into()));
        result
    }

    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_seed_variables_from_object_payload() {
        let ctx = ExecutionContext::new("u1", "d1", "manual", json!({"item": "42"}));
        assert_eq!(ctx.variables.get("item"), Some(&json!("42")));
    }

    #[test]
    fn should_wrap_scalar_payload() {
        let ctx = ExecutionContext::new("u1", "d1", "manual", json!(7));
        assert_eq!(ctx.variables.get("payload"), Some(&json!(7)));
    }

    #[test]
    fn should_expose_previous_results_in_scope() {
        let mut ctx = ExecutionContext::new("u1", "d1", "manual", json!({"a": 1}));
        ctx.previous_results
            .insert("action_0".to_string(), json!({"success": true}));
        let scope = ctx.scope();
        assert_eq!(scope["a"], json!(1));
        assert_eq!(scope["action_0"]["success"], json!(true));
        assert_eq!(scope["previousResults"]["action_0"]["success"], json!(true));
    }

    #[test]
    fn should_let_variables_shadow_result_keys() {
        let mut ctx = ExecutionContext::new("u1", "d1", "manual", json!({"action_0": "mine"}));
        ctx.previous_results
            .insert("action_0".to_string(), json!({"success": true}));
        assert_eq!(ctx.scope()["action_0"], json!("mine"));
    }

    #[test]
    fn should_build_cancelled_result_with_reason() {
        let result = ExecutionResult::cancelled(AutomationId::new(), "manual", "In cooldown");
        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert_eq!(result.error.as_deref(), Some("In cooldown"));
        assert!(result.completed_at.is_some());
        assert!(result.status.is_terminal());
    }

    #[test]
    fn should_serialize_outcome_without_empty_fields() {
        let outcome = ActionOutcome::succeeded(ActionType::Delay, json!({"delayed": 5}), 5);
        let json = outcome.to_value();
        assert_eq!(json["action_type"], "DELAY");
        assert!(json.get("error").is_none());
    }
}
