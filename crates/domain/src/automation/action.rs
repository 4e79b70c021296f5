//! Action — one unit of effect inside a definition.
//!
//! The action language is recursive: `Condition` and `Loop` own child
//! action lists of the same type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::ConditionGroup;
use super::script::ScriptExpr;

/// An action plus its optional position in the run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Sort key; when absent the action's index in its list is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl ActionConfig {
    #[must_use]
    pub fn new(kind: ActionKind) -> Self {
        Self { order: None, kind }
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }
}

impl From<ActionKind> for ActionConfig {
    fn from(kind: ActionKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request shared by `API_CALL` and `WEBHOOK`.
///
/// Every string (URL, header values, strings nested in the body) is
/// interpolated against the run scope before sending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpActionConfig {
    pub url: String,
    /// `GET` for `API_CALL`, `POST` for `WEBHOOK` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Per-type payload of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Hand an interpolated prompt to the agent collaborator.
    AgentExecute {
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
    ApiCall(HttpActionConfig),
    DeviceControl {
        device_id: String,
        command: String,
        #[serde(default)]
        params: Value,
    },
    SendNotification {
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<String>,
    },
    SendEmail {
        to: String,
        subject: String,
        body: String,
    },
    SendMessage {
        /// Messaging platform, e.g. `"telegram"`.
        channel: String,
        recipient: String,
        text: String,
    },
    Delay {
        delay_ms: u64,
    },
    Condition {
        conditions: ConditionGroup,
        #[serde(default)]
        then_actions: Vec<ActionConfig>,
        #[serde(default)]
        else_actions: Vec<ActionConfig>,
    },
    Loop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iterations: Option<u32>,
        /// Variable path resolving to an array; takes precedence over `iterations`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iterate_over: Option<String>,
        loop_actions: Vec<ActionConfig>,
    },
    Script {
        script: ScriptExpr,
        /// Variable name that receives the script's value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assign_to: Option<String>,
    },
    Webhook(HttpActionConfig),
}

/// Discriminant of [`ActionKind`], recorded on every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AgentExecute,
    ApiCall,
    DeviceControl,
    SendNotification,
    SendEmail,
    SendMessage,
    Delay,
    Condition,
    Loop,
    Script,
    Webhook,
}

impl ActionKind {
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::AgentExecute { .. } => ActionType::AgentExecute,
            Self::ApiCall(_) => ActionType::ApiCall,
            Self::DeviceControl { .. } => ActionType::DeviceControl,
            Self::SendNotification { .. } => ActionType::SendNotification,
            Self::SendEmail { .. } => ActionType::SendEmail,
            Self::SendMessage { .. } => ActionType::SendMessage,
            Self::Delay { .. } => ActionType::Delay,
            Self::Condition { .. } => ActionType::Condition,
            Self::Loop { .. } => ActionType::Loop,
            Self::Script { .. } => ActionType::Script,
            Self::Webhook(_) => ActionType::Webhook,
        }
    }
}

impl ActionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentExecute => "AGENT_EXECUTE",
            Self::ApiCall => "API_CALL",
            Self::DeviceControl => "DEVICE_CONTROL",
            Self::SendNotification => "SEND_NOTIFICATION",
            Self::SendEmail => "SEND_EMAIL",
            Self::SendMessage => "SEND_MESSAGE",
            Self::Delay => "DELAY",
            Self::Condition => "CONDITION",
            Self::Loop => "LOOP",
            Self::Script => "SCRIPT",
            Self::Webhook => "WEBHOOK",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return `actions` in run order: by `order`, falling back to list index.
///
/// The sort is stable, so equal keys keep their list order.
#[must_use]
pub fn sorted_by_order(actions: &[ActionConfig]) -> Vec<&ActionConfig> {
    let mut indexed: Vec<(u32, &ActionConfig)> = actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let fallback = u32::try_from(index).unwrap_or(u32::MAX);
            (action.order.unwrap_or(fallback), action)
        })
        .collect();
    indexed.sort_by_key(|(key, _)| *key);
    indexed.into_iter().map(|(_, action)| action).collect()
}
