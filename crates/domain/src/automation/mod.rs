//! Automation — trigger → condition group → ordered action tree.
//!
//! An [`AutomationDefinition`] has one [`TriggerConfig`] that decides when
//! it runs, an optional [`ConditionGroup`] that must hold, and an ordered
//! list of [`ActionConfig`]s. Run policy (cooldown, run ceiling) is carried
//! on the definition and enforced by the app layer.

mod action;
mod condition;
mod script;
mod trigger;

pub use action::{
    ActionConfig, ActionKind, ActionType, HttpActionConfig, HttpMethod, sorted_by_order,
};
pub use condition::{ConditionConfig, ConditionGroup, ConditionOperator, LogicOperator};
pub use script::{BinaryOperator, ScriptExpr};
pub use trigger::{TriggerConfig, TriggerEvent, TriggerType};

use serde::{Deserialize, Serialize};

use crate::error::{FlowHubError, ValidationError};
use crate::id::AutomationId;
use crate::time::Timestamp;

/// A flat rule: when the trigger fires and the conditions hold, run the actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDefinition {
    pub id: AutomationId,
    pub name: String,
    pub trigger: TriggerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionGroup>,
    pub actions: Vec<ActionConfig>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Minimum seconds between two runs; `0` disables the cooldown.
    #[serde(default)]
    pub cooldown_seconds: u64,
    /// Run ceiling; `0` means unlimited.
    #[serde(default)]
    pub max_runs: u32,
    #[serde(default)]
    pub run_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Timestamp>,
}

fn default_active() -> bool {
    true
}

impl AutomationDefinition {
    /// Create a builder for constructing an [`AutomationDefinition`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `actions` is empty ([`ValidationError::NoActions`])
    /// - the trigger is missing a required field
    pub fn validate(&self) -> Result<(), FlowHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        self.trigger.validate()?;
        Ok(())
    }

    /// Whether the run ceiling has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_runs > 0 && self.run_count >= self.max_runs
    }
}

/// Step-by-step builder for [`AutomationDefinition`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    trigger: Option<TriggerConfig>,
    conditions: Option<ConditionGroup>,
    actions: Vec<ActionConfig>,
    is_active: Option<bool>,
    cooldown_seconds: u64,
    max_runs: u32,
    run_count: u32,
    last_run: Option<Timestamp>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn conditions(mut self, group: ConditionGroup) -> Self {
        self.conditions = Some(group);
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<ActionConfig>) -> Self {
        self.actions.push(action.into());
        self
    }

    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    #[must_use]
    pub fn cooldown_seconds(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn max_runs(mut self, max_runs: u32) -> Self {
        self.max_runs = max_runs;
        self
    }

    #[must_use]
    pub fn run_count(mut self, run_count: u32) -> Self {
        self.run_count = run_count;
        self
    }

    #[must_use]
    pub fn last_run(mut self, ts: Timestamp) -> Self {
        self.last_run = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationDefinition`].
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<AutomationDefinition, FlowHubError> {
        let definition = AutomationDefinition {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            trigger: self.trigger.unwrap_or(TriggerConfig::Manual),
            conditions: self.conditions,
            actions: self.actions,
            is_active: self.is_active.unwrap_or(true),
            cooldown_seconds: self.cooldown_seconds,
            max_runs: self.max_runs,
            run_count: self.run_count,
            last_run: self.last_run,
        };
        definition.validate()?;
        Ok(definition)
    }
}
