//! Operand resolution for `kind:match` checks.
//!
//! An operand is one of:
//! - `True` / `False` (exact case)
//! - an integer or finite float literal
//! - a single- or double-quoted string literal
//! - a `{{.field}}` lookup into the attribute map it is resolved against
//!
//! Anything else does not resolve, and an unresolved operand never matches.

use std::borrow::Cow;

use serde_json::{Number, Value};

/// Resolve an operand spec against `map`.
///
/// Returns `None` when the operand is not a recognized form or when the
/// looked-up field is absent or null.
pub fn resolve<'a>(spec: &str, map: &'a Value) -> Option<Cow<'a, Value>> {
    match spec {
        "True" => return Some(Cow::Owned(Value::Bool(true))),
        "False" => return Some(Cow::Owned(Value::Bool(false))),
        _ => {}
    }

    if let Ok(n) = spec.parse::<i64>() {
        return Some(Cow::Owned(Value::from(n)));
    }
    if let Ok(n) = spec.parse::<u64>() {
        return Some(Cow::Owned(Value::from(n)));
    }
    if let Ok(f) = spec.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Some(Cow::Owned(Value::Number(n)));
        }
    }

    if let Some(s) = unquote(spec) {
        return Some(Cow::Owned(Value::String(s.to_string())));
    }

    if let Some(field) = template_field(spec) {
        return map.get(field).filter(|v| !v.is_null()).map(Cow::Borrowed);
    }

    None
}

/// Compare `kind` (resolved against credentials) with `matcher` (resolved
/// against the target).
pub fn operands_match(kind: &str, matcher: &str, target: &Value, creds: &Value) -> bool {
    let (Some(left), Some(right)) = (resolve(kind, creds), resolve(matcher, target)) else {
        return false;
    };
    normalized(&left) == normalized(&right)
}

/// Strip one pair of matching single or double quotes.
pub(crate) fn unquote(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    let first = text.as_bytes()[0];
    let last = text.as_bytes()[text.len() - 1];
    if (first == b'"' || first == b'\'') && first == last {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// `{{.project_id}}` -> `project_id`. No nesting, no pipelines.
fn template_field(spec: &str) -> Option<&str> {
    let field = spec.strip_prefix("{{.")?.strip_suffix("}}")?;
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}

/// String form used for cross-type equality: a bool `true` equals the
/// string `"true"`, and `1` equals `1.0`.
fn normalized(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
            }
        }
        other => other.to_string(),
    }
}
