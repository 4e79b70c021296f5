//! Event — an immutable record carried by the in-process bus.
//!
//! The bus is typed: inbound kinds (published by collaborators) are the only
//! ones the trigger router ever converts into runs. Lifecycle and effect
//! kinds are emitted by the core itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::EventId;
use crate::time::{Timestamp, now};

/// Name prefixes owned by the core; named events using them are never routed.
pub const RESERVED_PREFIXES: &[&str] = &[
    "automation.",
    "workflow.",
    "device.control",
    "notification.",
    "email.",
    "message.",
];

/// Classification of a bus event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EventType {
    // Inbound
    /// A named application event (EVENT triggers).
    Named(String),
    DeviceStateChanged,
    WebhookReceived,

    // Lifecycle
    AutomationTriggered,
    AutomationCompleted,
    AutomationFailed,
    AutomationCancelled,
    WorkflowProgress,
    WorkflowCompleted,
    WorkflowFailed,

    // Effects (consumed by gateway collaborators)
    DeviceControl,
    NotificationRequested,
    EmailRequested,
    MessageRequested,
}

impl EventType {
    /// Dotted wire name, e.g. `automation.completed`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::DeviceStateChanged => "device.state_changed",
            Self::WebhookReceived => "webhook.received",
            Self::AutomationTriggered => "automation.triggered",
            Self::AutomationCompleted => "automation.completed",
            Self::AutomationFailed => "automation.failed",
            Self::AutomationCancelled => "automation.cancelled",
            Self::WorkflowProgress => "workflow.progress",
            Self::WorkflowCompleted => "workflow.completed",
            Self::WorkflowFailed => "workflow.failed",
            Self::DeviceControl => "device.control",
            Self::NotificationRequested => "notification.send",
            Self::EmailRequested => "email.send",
            Self::MessageRequested => "message.send",
        }
    }

    /// Whether `name` falls under one of the [`RESERVED_PREFIXES`].
    #[must_use]
    pub fn is_reserved_name(name: &str) -> bool {
        RESERVED_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    /// Inbound kinds are the ones collaborators publish into the core.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Self::Named(_) | Self::DeviceStateChanged | Self::WebhookReceived
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub data: Value,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            timestamp: now(),
            data,
        }
    }
}
