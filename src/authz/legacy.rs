//! Nested-list rule form: `[["role:admin"], ["{{.project_id}}:{{.project_id}}", "role:member"]]`.
//!
//! The outer list is a disjunction, each inner list a conjunction.

use serde_json::Value;

use crate::authz::check::Check;
use crate::authz::parser::parse_check;

/// Parse a nested-list rule. Null and the empty list allow; shapes other
/// than strings and lists of strings deny.
pub fn parse_list_rule(rule: &Value) -> Check {
    let items = match rule {
        Value::Null => return Check::True,
        Value::Array(items) => items,
        other => {
            tracing::warn!(found = describe(other), "Unsupported list rule, denying");
            return Check::False;
        }
    };

    let mut branches = Vec::new();
    for item in items {
        match item {
            Value::Null => {}
            Value::String(text) => branches.push(parse_check(text)),
            Value::Array(inner) => {
                if let Some(branch) = parse_conjunction(inner) {
                    branches.push(branch);
                }
            }
            other => {
                tracing::warn!(found = describe(other), "Unsupported list rule branch, denying");
                branches.push(Check::False);
            }
        }
    }

    match branches.len() {
        0 => Check::True,
        1 => branches.remove(0),
        _ => Check::Or(branches),
    }
}

/// One inner list. `None` for an empty list, which contributes no branch.
fn parse_conjunction(items: &[Value]) -> Option<Check> {
    let mut checks = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(text) => checks.push(parse_check(text)),
            None => {
                tracing::warn!(found = describe(item), "Non-string entry in list rule, denying");
                return Some(Check::False);
            }
        }
    }

    match checks.len() {
        0 => None,
        1 => checks.pop(),
        _ => Some(Check::And(checks)),
    }
}

pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
