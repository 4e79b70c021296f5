//! Restricted expression language for `SCRIPT` actions.
//!
//! Scripts are data, not code: a small JSON-encoded AST evaluated by the
//! app layer against a read-only scope exposing `variables`,
//! `previousResults` and `context`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptExpr {
    Literal {
        value: Value,
    },
    /// Dotted path rooted at `variables`, `previousResults` or `context`;
    /// any other first segment is looked up in `variables`.
    Path {
        path: String,
    },
    /// `${...}` string template over the run scope.
    Template {
        template: String,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<ScriptExpr>,
        right: Box<ScriptExpr>,
    },
    Not {
        expr: Box<ScriptExpr>,
    },
    All {
        exprs: Vec<ScriptExpr>,
    },
    Any {
        exprs: Vec<ScriptExpr>,
    },
    Concat {
        parts: Vec<ScriptExpr>,
    },
    /// Length of a string, array or object.
    Length {
        expr: Box<ScriptExpr>,
    },
    Object {
        fields: BTreeMap<String, ScriptExpr>,
    },
    Array {
        items: Vec<ScriptExpr>,
    },
    If {
        condition: Box<ScriptExpr>,
        then: Box<ScriptExpr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<ScriptExpr>>,
    },
}

impl ScriptExpr {
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path { path: path.into() }
    }

    #[must_use]
    pub fn binary(operator: BinaryOperator, left: Self, right: Self) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}
