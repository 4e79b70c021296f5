//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`FlowHubError`] via `#[from]` (or an explicit `From` impl for boxed
//! adapter errors).

/// Top-level error shared by every port and service.
#[derive(Debug, thiserror::Error)]
pub enum FlowHubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("schedule error")]
    Schedule(#[from] ScheduleError),

    /// A persistence adapter failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An outbound collaborator (HTTP, agent) failed.
    #[error("gateway error")]
    Gateway(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FlowHubError {
    /// Render the error together with its source chain, `a: b: c`.
    ///
    /// Execution records store errors as text.
    #[must_use]
    pub fn to_chain_string(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("at least one action is required")]
    NoActions,

    #[error("trigger {trigger} requires a non-empty `{field}`")]
    MissingTriggerField {
        trigger: &'static str,
        field: &'static str,
    },

    #[error("definition {0} is not active")]
    Inactive(String),

    #[error("workflow must contain exactly one trigger node, found {0}")]
    TriggerNodeCount(usize),

    #[error("workflow must contain at least one end node")]
    NoEndNode,

    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),

    #[error("node `{node}` points to unknown node `{next}`")]
    UnknownNextNode { node: String, next: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A schedule could not be built from a trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("cron expression must have 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),

    #[error("cron expression `{0}` has no upcoming occurrence")]
    Exhausted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_flowhub_error() {
        let err: FlowHubError = ValidationError::EmptyName.into();
        assert!(matches!(err, FlowHubError::Validation(ValidationError::EmptyName)));
    }

    #[test]
    fn should_render_source_chain() {
        let err: FlowHubError = NotFoundError {
            entity: "Automation",
            id: "42".to_string(),
        }
        .into();
        assert_eq!(err.to_chain_string(), "not found: Automation 42 not found");
    }

    #[test]
    fn should_display_missing_trigger_field() {
        let err = ValidationError::MissingTriggerField {
            trigger: "EVENT",
            field: "event_name",
        };
        assert_eq!(
            err.to_string(),
            "trigger EVENT requires a non-empty `event_name`"
        );
    }
}
