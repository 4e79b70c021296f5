//! Evaluator for the restricted `SCRIPT` expression language.
//!
//! Expressions see a read-only view of the run: `variables`,
//! `previousResults` and `context` (run metadata). Evaluation is pure; the
//! executor decides what to do with the value.

use flowhub_domain::automation::{BinaryOperator, ScriptExpr};
use flowhub_domain::execution::ExecutionContext;
use serde_json::{Map, Number, Value, json};

use crate::evaluator::is_truthy;
use crate::resolver::{interpolate, lookup, stringify};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("`{operator}` is not defined for {left} and {right}")]
    TypeMismatch {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("`length` is not defined for {0}")]
    NoLength(&'static str),

    #[error("arithmetic result is not a finite number")]
    NotFinite,
}

/// Evaluate `expr` against the state of a run.
///
/// # Errors
///
/// Returns a [`ScriptError`] on type mismatches, division by zero or a
/// non-finite arithmetic result. Undefined paths evaluate to `null`.
pub fn evaluate_script(
    expr: &ScriptExpr,
    context: &ExecutionContext,
) -> Result<Value, ScriptError> {
    let root = json!({
        "variables": context.variables,
        "previousResults": context.previous_results,
        "context": context.metadata(),
    });
    let scope = context.scope();
    Evaluator {
        root: &root,
        scope: &scope,
    }
    .eval(expr)
}

struct Evaluator<'a> {
    root: &'a Value,
    scope: &'a Value,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &ScriptExpr) -> Result<Value, ScriptError> {
        match expr {
            ScriptExpr::Literal { value } => Ok(value.clone()),
            ScriptExpr::Path { path } => Ok(self.path(path)),
            ScriptExpr::Template { template } => {
                Ok(Value::String(interpolate(template, self.scope)))
            }
            ScriptExpr::Binary {
                operator,
                left,
                right,
            } => binary(*operator, &self.eval(left)?, &self.eval(right)?),
            ScriptExpr::Not { expr } => Ok(Value::Bool(!is_truthy(Some(&self.eval(expr)?)))),
            ScriptExpr::All { exprs } => {
                for expr in exprs {
                    if !is_truthy(Some(&self.eval(expr)?)) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            ScriptExpr::Any { exprs } => {
                for expr in exprs {
                    if is_truthy(Some(&self.eval(expr)?)) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            ScriptExpr::Concat { parts } => {
                let mut out = String::new();
                for part in parts {
                    let value = self.eval(part)?;
                    if !value.is_null() {
                        out.push_str(&stringify(&value));
                    }
                }
                Ok(Value::String(out))
            }
            ScriptExpr::Length { expr } => match self.eval(expr)? {
                Value::String(s) => Ok(json!(s.chars().count())),
                Value::Array(items) => Ok(json!(items.len())),
                Value::Object(map) => Ok(json!(map.len())),
                other => Err(ScriptError::NoLength(kind(&other))),
            },
            ScriptExpr::Object { fields } => {
                let mut map = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    map.insert(key.clone(), self.eval(field)?);
                }
                Ok(Value::Object(map))
            }
            ScriptExpr::Array { items } => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ScriptExpr::If {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(Some(&self.eval(condition)?)) {
                    self.eval(then)
                } else {
                    otherwise
                        .as_ref()
                        .map_or(Ok(Value::Null), |expr| self.eval(expr))
                }
            }
        }
    }

    fn path(&self, path: &str) -> Value {
        let path = path.trim().trim_start_matches('$');
        let rooted = ["variables", "previousResults", "context"]
            .iter()
            .any(|root| path == *root || path.starts_with(&format!("{root}.")));
        let found = if rooted {
            lookup(path, self.root)
        } else {
            lookup(path, &self.root["variables"])
        };
        found.cloned().unwrap_or(Value::Null)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn operator_name(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Add => "add",
        BinaryOperator::Sub => "sub",
        BinaryOperator::Mul => "mul",
        BinaryOperator::Div => "div",
        BinaryOperator::Rem => "rem",
        BinaryOperator::Eq => "eq",
        BinaryOperator::Ne => "ne",
        BinaryOperator::Gt => "gt",
        BinaryOperator::Ge => "ge",
        BinaryOperator::Lt => "lt",
        BinaryOperator::Le => "le",
    }
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    let mismatch = || ScriptError::TypeMismatch {
        operator: operator_name(operator),
        left: kind(left),
        right: kind(right),
    };
    match operator {
        BinaryOperator::Eq => Ok(Value::Bool(left == right)),
        BinaryOperator::Ne => Ok(Value::Bool(left != right)),
        BinaryOperator::Add if left.is_string() || right.is_string() => Ok(Value::String(
            format!("{}{}", stringify(left), stringify(right)),
        )),
        BinaryOperator::Gt | BinaryOperator::Ge | BinaryOperator::Lt | BinaryOperator::Le => {
            let ordering = match (left, right) {
                (Value::String(l), Value::String(r)) => l.cmp(r),
                (Value::Number(l), Value::Number(r)) => {
                    let (l, r) = (
                        l.as_f64().ok_or_else(mismatch)?,
                        r.as_f64().ok_or_else(mismatch)?,
                    );
                    l.partial_cmp(&r).ok_or_else(mismatch)?
                }
                _ => return Err(mismatch()),
            };
            Ok(Value::Bool(match operator {
                BinaryOperator::Gt => ordering.is_gt(),
                BinaryOperator::Ge => ordering.is_ge(),
                BinaryOperator::Lt => ordering.is_lt(),
                _ => ordering.is_le(),
            }))
        }
        _ => {
            let (Value::Number(l), Value::Number(r)) = (left, right) else {
                return Err(mismatch());
            };
            arithmetic(operator, l, r).ok_or(ScriptError::NotFinite)?
        }
    }
}

/// Integer arithmetic when both sides are integers and the result stays
/// exact, float arithmetic otherwise.
fn arithmetic(
    operator: BinaryOperator,
    l: &Number,
    r: &Number,
) -> Option<Result<Value, ScriptError>> {
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        let exact = match operator {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            BinaryOperator::Div | BinaryOperator::Rem if b == 0 => {
                return Some(Err(ScriptError::DivisionByZero));
            }
            BinaryOperator::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            BinaryOperator::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(value) = exact {
            return Some(Ok(Value::from(value)));
        }
    }
    let (a, b) = (l.as_f64()?, r.as_f64()?);
    let result = match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div | BinaryOperator::Rem if b == 0.0 => {
            return Some(Err(ScriptError::DivisionByZero));
        }
        BinaryOperator::Div => a / b,
        BinaryOperator::Rem => a % b,
        _ => return None,
    };
    Number::from_f64(result).map(|n| Ok(Value::Number(n)))
}
