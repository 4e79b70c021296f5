//! Condition evaluation over a run scope.

use flowhub_domain::automation::{ConditionConfig, ConditionGroup, ConditionOperator, LogicOperator};
use regex::Regex;
use serde_json::Value;

use crate::resolver::{lookup, resolve, stringify};

/// Evaluate a group. An empty group holds.
#[must_use]
pub fn evaluate_group(group: &ConditionGroup, scope: &Value) -> bool {
    if group.conditions.is_empty() {
        return true;
    }
    match group.logic {
        LogicOperator::And => group.conditions.iter().all(|c| evaluate(c, scope)),
        LogicOperator::Or => group.conditions.iter().any(|c| evaluate(c, scope)),
    }
}

/// Evaluate one comparison. Never fails: anything not comparable is `false`.
#[must_use]
pub fn evaluate(condition: &ConditionConfig, scope: &Value) -> bool {
    let left = resolve(&condition.left, scope);
    let right = condition
        .right
        .as_ref()
        .and_then(|right| resolve_right(right, scope));

    match &condition.operator {
        ConditionOperator::Equals => loosely_equal(left.as_ref(), right.as_ref()),
        ConditionOperator::NotEquals => !loosely_equal(left.as_ref(), right.as_ref()),
        ConditionOperator::GreaterThan => {
            compare(left.as_ref(), right.as_ref()).is_some_and(|(l, r)| l > r)
        }
        ConditionOperator::LessThan => {
            compare(left.as_ref(), right.as_ref()).is_some_and(|(l, r)| l < r)
        }
        ConditionOperator::Contains => contains(left.as_ref(), right.as_ref()),
        ConditionOperator::StartsWith => {
            text_pair(left.as_ref(), right.as_ref()).is_some_and(|(l, r)| l.starts_with(&r))
        }
        ConditionOperator::EndsWith => {
            text_pair(left.as_ref(), right.as_ref()).is_some_and(|(l, r)| l.ends_with(&r))
        }
        ConditionOperator::MatchesRegex => matches_regex(left.as_ref(), right.as_ref()),
        ConditionOperator::IsTrue => is_truthy(left.as_ref()),
        ConditionOperator::IsFalse => !is_truthy(left.as_ref()),
        ConditionOperator::IsNull => is_null(left.as_ref()),
        ConditionOperator::IsNotNull => !is_null(left.as_ref()),
        ConditionOperator::Unknown(name) => {
            tracing::warn!(
                operator = %name,
                condition = %condition,
                "unknown condition operator, evaluating as false"
            );
            false
        }
    }
}

/// String right operands are resolved like left ones, except that a bare
/// dotted string which walks to nothing (`"3.5"`, `"example.com"`) stays a
/// literal.
fn resolve_right(right: &Value, scope: &Value) -> Option<Value> {
    match right {
        Value::String(raw) if raw.starts_with('$') => resolve(raw, scope),
        Value::String(raw) => Some(
            lookup(raw, scope)
                .filter(|_| raw.contains('.'))
                .cloned()
                .unwrap_or_else(|| right.clone()),
        ),
        other => Some(other.clone()),
    }
}

fn loosely_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    left == right || stringify(left) == stringify(right)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Option<(f64, f64)> {
    Some((as_number(left?)?, as_number(right?)?))
}

fn text_pair(left: Option<&Value>, right: Option<&Value>) -> Option<(String, String)> {
    let left = left.filter(|v| !v.is_null())?;
    let right = right.filter(|v| !v.is_null())?;
    Some((stringify(left), stringify(right)))
}

fn contains(left: Option<&Value>, right: Option<&Value>) -> bool {
    if let Some(Value::Array(items)) = left {
        return items
            .iter()
            .any(|item| loosely_equal(Some(item), right));
    }
    text_pair(left, right).is_some_and(|(l, r)| l.contains(&r))
}

fn matches_regex(left: Option<&Value>, right: Option<&Value>) -> bool {
    let Some((text, pattern)) = text_pair(left, right) else {
        return false;
    };
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(&text),
        Err(err) => {
            tracing::warn!(%err, %pattern, "invalid condition regex, evaluating as false");
            false
        }
    }
}

pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !(s.is_empty() || s == "false" || s == "0"),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn is_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(left: &str, operator: ConditionOperator, right: Option<Value>) -> ConditionConfig {
        ConditionConfig::new(left, operator, right)
    }

    fn is_true(left: &str) -> ConditionConfig {
        cond(left, ConditionOperator::IsTrue, None)
    }

    #[test]
    fn should_combine_with_and() {
        let scope = json!({"t": true, "f": false});
        assert!(evaluate_group(
            &ConditionGroup::all(vec![is_true("$t"), is_true("$t")]),
            &scope
        ));
        assert!(!evaluate_group(
            &ConditionGroup::all(vec![is_true("$t"), is_true("$f")]),
            &scope
        ));
    }

    #[test]
    fn should_combine_with_or() {
        let scope = json!({"t": true, "f": false});
        assert!(evaluate_group(
            &ConditionGroup::any(vec![is_true("$f"), is_true("$t")]),
            &scope
        ));
        assert!(!evaluate_group(
            &ConditionGroup::any(vec![is_true("$f"), is_true("$f")]),
            &scope
        ));
    }

    #[test]
    fn should_hold_when_group_is_empty() {
        assert!(evaluate_group(&ConditionGroup::default(), &json!({})));
        assert!(evaluate_group(&ConditionGroup::any(vec![]), &json!({})));
    }

    #[test]
    fn should_compare_numbers_with_coercion() {
        let scope = json!({"temp": "21.5", "limit": 20});
        assert!(evaluate(
            &cond("$temp", ConditionOperator::GreaterThan, Some(json!("$limit"))),
            &scope
        ));
        assert!(evaluate(
            &cond("$temp", ConditionOperator::LessThan, Some(json!("30.0"))),
            &scope
        ));
        assert!(!evaluate(
            &cond("$temp", ConditionOperator::GreaterThan, Some(json!("warm"))),
            &scope
        ));
    }

    #[test]
    fn should_treat_equal_string_forms_as_equal() {
        let scope = json!({"count": 3});
        assert!(evaluate(
            &cond("$count", ConditionOperator::Equals, Some(json!("3"))),
            &scope
        ));
        assert!(evaluate(
            &cond("$count", ConditionOperator::NotEquals, Some(json!(4))),
            &scope
        ));
    }

    #[test]
    fn should_match_strings_and_arrays() {
        let scope = json!({"host": "api.example.com", "tags": ["a", "b"]});
        assert!(evaluate(
            &cond("$host", ConditionOperator::Contains, Some(json!("example.com"))),
            &scope
        ));
        assert!(evaluate(
            &cond("$host", ConditionOperator::StartsWith, Some(json!("api"))),
            &scope
        ));
        assert!(evaluate(
            &cond("$host", ConditionOperator::EndsWith, Some(json!(".com"))),
            &scope
        ));
        assert!(evaluate(
            &cond("$tags", ConditionOperator::Contains, Some(json!("b"))),
            &scope
        ));
    }

    #[test]
    fn should_evaluate_regex_and_reject_invalid_patterns() {
        let scope = json!({"code": "AB-123"});
        assert!(evaluate(
            &cond("$code", ConditionOperator::MatchesRegex, Some(json!(r"^[A-Z]{2}-\d+$"))),
            &scope
        ));
        assert!(!evaluate(
            &cond("$code", ConditionOperator::MatchesRegex, Some(json!("("))),
            &scope
        ));
    }

    #[test]
    fn should_apply_truthiness_rules() {
        let scope = json!({"zero": 0, "text": "false", "empty": "", "list": [], "one": "yes"});
        assert!(!evaluate(&is_true("$zero"), &scope));
        assert!(!evaluate(&is_true("$text"), &scope));
        assert!(!evaluate(&is_true("$empty"), &scope));
        assert!(!evaluate(&is_true("$missing"), &scope));
        assert!(evaluate(&is_true("$list"), &scope));
        assert!(evaluate(&is_true("$one"), &scope));
        assert!(evaluate(
            &cond("$zero", ConditionOperator::IsFalse, None),
            &scope
        ));
    }

    #[test]
    fn should_treat_undefined_as_null() {
        let scope = json!({"set": 1, "nothing": null});
        assert!(evaluate(&cond("$nothing", ConditionOperator::IsNull, None), &scope));
        assert!(evaluate(&cond("$missing.deep", ConditionOperator::IsNull, None), &scope));
        assert!(evaluate(&cond("$set", ConditionOperator::IsNotNull, None), &scope));
    }

    #[test]
    fn should_evaluate_unknown_operator_as_false() {
        let c = cond(
            "a",
            ConditionOperator::Unknown("ROUGHLY".to_string()),
            Some(json!("a")),
        );
        assert!(!evaluate(&c, &json!({})));
    }
}
