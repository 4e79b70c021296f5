//! Condition groups — comparisons combined with AND / OR.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the results of a group's conditions are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

/// Comparison applied between a condition's resolved operands.
///
/// Unknown operator names deserialize into [`ConditionOperator::Unknown`]
/// so a stored definition with a typo still loads; the evaluator treats it
/// as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    IsTrue,
    IsFalse,
    IsNull,
    IsNotNull,
    Unknown(String),
}

impl ConditionOperator {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::MatchesRegex => "MATCHES_REGEX",
            Self::IsTrue => "IS_TRUE",
            Self::IsFalse => "IS_FALSE",
            Self::IsNull => "IS_NULL",
            Self::IsNotNull => "IS_NOT_NULL",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ConditionOperator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "EQUALS" => Self::Equals,
            "NOT_EQUALS" => Self::NotEquals,
            "GREATER_THAN" => Self::GreaterThan,
            "LESS_THAN" => Self::LessThan,
            "CONTAINS" => Self::Contains,
            "STARTS_WITH" => Self::StartsWith,
            "ENDS_WITH" => Self::EndsWith,
            "MATCHES_REGEX" => Self::MatchesRegex,
            "IS_TRUE" => Self::IsTrue,
            "IS_FALSE" => Self::IsFalse,
            "IS_NULL" => Self::IsNull,
            "IS_NOT_NULL" => Self::IsNotNull,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        match op {
            ConditionOperator::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One comparison: `left <operator> right`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Variable path (`$a.b`, `a.b`) or a bare literal.
    pub left: String,
    pub operator: ConditionOperator,
    /// Absent for unary operators (`IS_TRUE`, `IS_NULL`, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Value>,
}

impl ConditionConfig {
    #[must_use]
    pub fn new(left: impl Into<String>, operator: ConditionOperator, right: Option<Value>) -> Self {
        Self {
            left: left.into(),
            operator,
            right,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub logic: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
}

impl ConditionGroup {
    #[must_use]
    pub fn all(conditions: Vec<ConditionConfig>) -> Self {
        Self {
            logic: LogicOperator::And,
            conditions,
        }
    }

    #[must_use]
    pub fn any(conditions: Vec<ConditionConfig>) -> Self {
        Self {
            logic: LogicOperator::Or,
            conditions,
        }
    }
}

impl std::fmt::Display for ConditionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.right {
            Some(right) => write!(f, "{} {} {right}", self.left, self.operator),
            None => write!(f, "{} {}", self.left, self.operator),
        }
    }
}
