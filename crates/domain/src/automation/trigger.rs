//! Trigger — the event class that starts a run, and the event shape routed
//! against it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::event::{Event, EventType};
use crate::id::AutomationId;
use crate::time::Timestamp;

/// Describes what should start an automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerConfig {
    /// Fires once at a fixed instant.
    Time { execute_at: Timestamp },
    /// Fires on a 5-field cron pattern (e.g. `"0 8 * * *"`).
    Cron {
        cron_expression: String,
        /// IANA timezone name; UTC when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },
    /// Fires when a named event is published on the bus.
    Event { event_name: String },
    /// Fires when the webhook collaborator receives a request on this path.
    Webhook { webhook_path: String },
    /// Fires when a device reports a property change.
    DeviceState {
        device_id: String,
        state_property: String,
        /// Optional: only match this exact value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state_value: Option<Value>,
    },
    /// Fires only when invoked directly by id.
    Manual,
}

/// Discriminant of [`TriggerConfig`], shared with [`TriggerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Time,
    Cron,
    Event,
    Webhook,
    DeviceState,
    Manual,
}

impl TriggerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "TIME",
            Self::Cron => "CRON",
            Self::Event => "EVENT",
            Self::Webhook => "WEBHOOK",
            Self::DeviceState => "DEVICE_STATE",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TriggerConfig {
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Time { .. } => TriggerType::Time,
            Self::Cron { .. } => TriggerType::Cron,
            Self::Event { .. } => TriggerType::Event,
            Self::Webhook { .. } => TriggerType::Webhook,
            Self::DeviceState { .. } => TriggerType::DeviceState,
            Self::Manual => TriggerType::Manual,
        }
    }

    /// Check that the active variant's required fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingTriggerField`] naming the first
    /// blank field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = |field| {
            Err(ValidationError::MissingTriggerField {
                trigger: self.trigger_type().as_str(),
                field,
            })
        };
        match self {
            Self::Cron {
                cron_expression, ..
            } if cron_expression.trim().is_empty() => missing("cron_expression"),
            Self::Event { event_name } if event_name.trim().is_empty() => missing("event_name"),
            Self::Webhook { webhook_path } if webhook_path.trim().is_empty() => {
                missing("webhook_path")
            }
            Self::DeviceState { device_id, .. } if device_id.trim().is_empty() => {
                missing("device_id")
            }
            Self::DeviceState { state_property, .. } if state_property.trim().is_empty() => {
                missing("state_property")
            }
            _ => Ok(()),
        }
    }

    /// Check whether this trigger, owned by automation `owner`, matches `event`.
    ///
    /// `Manual` never matches: manual runs are started by id. Scheduled
    /// (`Cron`/`Time`) events only match the automation they target.
    #[must_use]
    pub fn matches(&self, owner: AutomationId, event: &TriggerEvent) -> bool {
        if self.trigger_type() != event.trigger_type {
            return false;
        }
        match self {
            Self::Time { .. } | Self::Cron { .. } => event.automation_id == Some(owner),
            Self::Event { event_name } => event.event_name.as_deref() == Some(event_name),
            Self::Webhook { webhook_path } => event.webhook_path.as_deref() == Some(webhook_path),
            Self::DeviceState {
                device_id,
                state_property,
                state_value,
            } => {
                if event.device_id.as_deref() != Some(device_id)
                    || event.state_property.as_deref() != Some(state_property)
                {
                    return false;
                }
                match (state_value, &event.state_value) {
                    (None, _) => true,
                    (Some(expected), Some(actual)) => loosely_equal(expected, actual),
                    (Some(_), None) => false,
                }
            }
            Self::Manual => false,
        }
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text(a) == text(b)
}

impl std::fmt::Display for TriggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Time { execute_at } => write!(f, "time({})", execute_at.to_rfc3339()),
            Self::Cron {
                cron_expression, ..
            } => write!(f, "cron({cron_expression})"),
            Self::Event { event_name } => write!(f, "event({event_name})"),
            Self::Webhook { webhook_path } => write!(f, "webhook({webhook_path})"),
            Self::DeviceState {
                device_id,
                state_property,
                ..
            } => write!(f, "device_state({device_id}.{state_property})"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// The single event shape the trigger router consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub trigger_type: TriggerType,
    /// Target of a scheduler fire; `None` for broadcast events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<AutomationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_path: Option<String>,
    /// Payload seeded into the run's variables.
    #[serde(default)]
    pub data: Value,
}

impl TriggerEvent {
    fn bare(trigger_type: TriggerType, data: Value) -> Self {
        Self {
            trigger_type,
            automation_id: None,
            event_name: None,
            device_id: None,
            state_property: None,
            state_value: None,
            webhook_path: None,
            data,
        }
    }

    #[must_use]
    pub fn named(event_name: impl Into<String>, data: Value) -> Self {
        Self {
            event_name: Some(event_name.into()),
            ..Self::bare(TriggerType::Event, data)
        }
    }

    #[must_use]
    pub fn device_state(
        device_id: impl Into<String>,
        state_property: impl Into<String>,
        state_value: Option<Value>,
        data: Value,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            state_property: Some(state_property.into()),
            state_value,
            ..Self::bare(TriggerType::DeviceState, data)
        }
    }

    #[must_use]
    pub fn webhook(webhook_path: impl Into<String>, data: Value) -> Self {
        Self {
            webhook_path: Some(webhook_path.into()),
            ..Self::bare(TriggerType::Webhook, data)
        }
    }

    /// A scheduler fire (`Cron` or `Time`) aimed at one automation.
    #[must_use]
    pub fn scheduled(trigger_type: TriggerType, automation_id: AutomationId, data: Value) -> Self {
        Self {
            automation_id: Some(automation_id),
            ..Self::bare(trigger_type, data)
        }
    }

    #[must_use]
    pub fn manual(automation_id: AutomationId, data: Value) -> Self {
        Self {
            automation_id: Some(automation_id),
            ..Self::bare(TriggerType::Manual, data)
        }
    }

    /// Human-readable origin recorded on execution results.
    #[must_use]
    pub fn triggered_by(&self) -> String {
        match self.trigger_type {
            TriggerType::Event => format!("event:{}", self.event_name.as_deref().unwrap_or("")),
            TriggerType::Webhook => {
                format!("webhook:{}", self.webhook_path.as_deref().unwrap_or(""))
            }
            TriggerType::DeviceState => format!(
                "device:{}.{}",
                self.device_id.as_deref().unwrap_or(""),
                self.state_property.as_deref().unwrap_or("")
            ),
            TriggerType::Cron => "cron".to_string(),
            TriggerType::Time => "time".to_string(),
            TriggerType::Manual => "manual".to_string(),
        }
    }

    /// Convert an inbound bus event into a trigger event.
    ///
    /// Lifecycle and effect events never convert, and neither do named
    /// events under a reserved prefix. Inbound payload shapes:
    /// - `DeviceStateChanged`: `{"device_id", "property", "value", ...}`
    /// - `WebhookReceived`: `{"path", "body"}`
    #[must_use]
    pub fn from_bus_event(event: &Event) -> Option<Self> {
        match &event.event_type {
            EventType::Named(name) if !EventType::is_reserved_name(name) => {
                Some(Self::named(name.clone(), event.data.clone()))
            }
            EventType::DeviceStateChanged => {
                let device_id = event.data.get("device_id")?.as_str()?;
                let property = event.data.get("property")?.as_str()?;
                let value = event.data.get("value").cloned();
                Some(Self::device_state(
                    device_id,
                    property,
                    value,
                    event.data.clone(),
                ))
            }
            EventType::WebhookReceived => {
                let path = event.data.get("path")?.as_str()?;
                let body = event.data.get("body").cloned().unwrap_or(Value::Null);
                Some(Self::webhook(path, body))
            }
            _ => None,
        }
    }
}
