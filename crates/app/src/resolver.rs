//! Variable resolution and `${...}` template interpolation.
//!
//! Pure functions over a JSON scope (usually [`ExecutionContext::scope`]).
//!
//! [`ExecutionContext::scope`]: flowhub_domain::execution::ExecutionContext::scope

use serde_json::Value;

/// Resolve a condition operand.
///
/// A path with neither a leading `$` nor a `.` is a literal and comes back
/// as a string. Anything else is walked through `scope`; `None` means
/// undefined.
#[must_use]
pub fn resolve(path: &str, scope: &Value) -> Option<Value> {
    if !path.starts_with('$') && !path.contains('.') {
        return Some(Value::String(path.to_string()));
    }
    lookup(path, scope).cloned()
}

/// Walk a dotted path (optional leading `$`) through `scope`.
///
/// Numeric segments index arrays. Stops at the first missing or null
/// intermediate.
#[must_use]
pub fn lookup<'a>(path: &str, scope: &'a Value) -> Option<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    let mut current = scope;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Replace every `${path}` in `template` with the value found at `path`.
///
/// Undefined placeholders are left verbatim.
#[must_use]
pub fn interpolate(template: &str, scope: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let placeholder = &rest[start..start + 2 + len + 1];
        let path = &rest[start + 2..start + 2 + len];
        out.push_str(&rest[..start]);
        match lookup(path, scope) {
            Some(value) => out.push_str(&stringify(value)),
            None => out.push_str(placeholder),
        }
        rest = &rest[start + placeholder.len()..];
    }
    out.push_str(rest);
    out
}

/// Apply [`interpolate`] to every string nested in `value`.
#[must_use]
pub fn interpolate_value(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, scope)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, scope))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), interpolate_value(item, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Text form used when a value is spliced into a string.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_interpolate_nested_path() {
        assert_eq!(interpolate("${a.b}", &json!({"a": {"b": "x"}})), "x");
    }

    #[test]
    fn should_leave_placeholder_when_path_is_undefined() {
        assert_eq!(interpolate("${missing}", &json!({})), "${missing}");
    }

    #[test]
    fn should_insert_non_strings_as_json_text() {
        let scope = json!({"n": 3, "flag": true, "obj": {"k": 1}});
        assert_eq!(
            interpolate("${n}/${flag}/${obj}", &scope),
            r#"3/true/{"k":1}"#
        );
    }

    #[test]
    fn should_keep_unterminated_placeholder_text() {
        assert_eq!(interpolate("a ${b", &json!({"b": 1})), "a ${b");
        assert_eq!(interpolate("${b}${b}", &json!({"b": 1})), "11");
    }

    #[test]
    fn should_index_arrays_with_numeric_segments() {
        let scope = json!({"items": [{"name": "first"}, {"name": "second"}]});
        assert_eq!(interpolate("${items.1.name}", &scope), "second");
    }

    #[test]
    fn should_return_literal_when_path_has_no_marker() {
        assert_eq!(resolve("on", &json!({"on": 1})), Some(json!("on")));
    }

    #[test]
    fn should_walk_path_when_dollar_or_dot_present() {
        let scope = json!({"temp": 21, "room": {"name": "kitchen"}});
        assert_eq!(resolve("$temp", &scope), Some(json!(21)));
        assert_eq!(resolve("room.name", &scope), Some(json!("kitchen")));
    }

    #[test]
    fn should_short_circuit_on_null_intermediate() {
        let scope = json!({"a": null});
        assert_eq!(resolve("$a.b.c", &scope), None);
        assert_eq!(resolve("$a", &scope), Some(Value::Null));
    }

    #[test]
    fn should_interpolate_every_string_in_a_json_value() {
        let scope = json!({"id": "42"});
        let body = json!({"path": "/items/${id}", "tags": ["${id}", 7], "n": 1});
        assert_eq!(
            interpolate_value(&body, &scope),
            json!({"path": "/items/42", "tags": ["42", 7], "n": 1})
        );
    }
}
