//! Typed identifier newtypes backed by UUIDs.
//!
//! Workflow *node* ids are user-authored strings and are not covered here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`AutomationDefinition`](crate::automation::AutomationDefinition).
    AutomationId
);

define_id!(
    /// Unique identifier for a [`ParsedWorkflow`](crate::workflow::ParsedWorkflow).
    WorkflowId
);

define_id!(
    /// Unique identifier for one [`WorkflowExecution`](crate::workflow::WorkflowExecution).
    ExecutionId
);

define_id!(
    /// Unique identifier for a bus [`Event`](crate::event::Event).
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        assert_ne!(AutomationId::new(), AutomationId::new());
    }

    #[test]
    fn should_serialize_as_bare_uuid_string() {
        let uuid = uuid::Uuid::new_v4();
        let id = WorkflowId::from(uuid);
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(uuid.to_string()));
    }

    #[test]
    fn should_parse_displayed_id() {
        let id = ExecutionId::new();
        let parsed: ExecutionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        assert!(AutomationId::from_str("not-a-uuid").is_err());
    }
}
