//! The executable check tree.
//!
//! Every rule, once parsed, is a [`Check`]. Evaluation is pure: it reads the
//! target, the credentials and the rule store, and returns `true` only when
//! the tree positively allows the request.

use std::fmt;

use serde_json::Value;

use crate::authz::resolve;
use crate::authz::store::RuleStore;

/// Longest chain of `rule:` references followed before denying.
pub const MAX_RULE_DEPTH: usize = 32;

/// Most `rule:` references followed in one evaluation. A rule reached along
/// several paths is evaluated once per path, so this bounds the total work
/// where the depth limit alone does not. Exceeding it denies the whole call.
pub const MAX_RULE_STEPS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// `!`
    False,
    /// `@`
    True,
    Not(Box<Check>),
    And(Vec<Check>),
    Or(Vec<Check>),
    /// `rule:<name>`, a reference to another named rule.
    Rule(String),
    /// `role:<name>`, satisfied when `creds["roles"]` contains the name.
    Role(String),
    /// `<kind>:<match>`; `kind` resolves against the credentials and
    /// `matcher` against the target.
    Generic { kind: String, matcher: String },
}

impl Check {
    /// Evaluate against `target` and `creds`, following `rule:` references
    /// into `store`.
    pub fn check(&self, target: &Value, creds: &Value, store: &RuleStore) -> bool {
        let mut ev = Evaluation::new(target, creds, store);
        let allowed = self.eval(&mut ev);
        allowed && !ev.exhausted
    }

    fn eval<'a>(&'a self, ev: &mut Evaluation<'a>) -> bool {
        match self {
            Check::False => false,
            Check::True => true,
            Check::Not(inner) => !inner.eval(ev),
            Check::And(children) => children.iter().all(|c| c.eval(ev)),
            Check::Or(children) => children.iter().any(|c| c.eval(ev)),
            Check::Rule(name) => {
                let store = ev.store;
                match store.get(name) {
                    Some(rule) => ev.enter(name, rule),
                    None => {
                        tracing::debug!(rule = %name, "Referenced rule is not defined");
                        false
                    }
                }
            }
            Check::Role(name) => has_role(ev.creds, name),
            Check::Generic { kind, matcher } => {
                resolve::operands_match(kind, matcher, ev.target, ev.creds)
            }
        }
    }

    /// Append `other` as a child, flattening into an existing `And`.
    pub(crate) fn and_with(self, other: Check) -> Check {
        match self {
            Check::And(mut children) => {
                children.push(other);
                Check::And(children)
            }
            first => Check::And(vec![first, other]),
        }
    }
}

/// Evaluate the rule stored under `name`, counting it as the first step of
/// the reference chain so that a self-reference is caught immediately.
pub(crate) fn check_named(
    name: &str,
    rule: &Check,
    target: &Value,
    creds: &Value,
    store: &RuleStore,
) -> bool {
    let mut ev = Evaluation::new(target, creds, store);
    let allowed = ev.enter(name, rule);
    allowed && !ev.exhausted
}

fn has_role(creds: &Value, role: &str) -> bool {
    creds
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
        .unwrap_or(false)
}

/// Per-call evaluation state: the inputs, the chain of rule names currently
/// being evaluated and the number of references followed so far.
struct Evaluation<'a> {
    target: &'a Value,
    creds: &'a Value,
    store: &'a RuleStore,
    path: Vec<&'a str>,
    steps: usize,
    exhausted: bool,
}

impl<'a> Evaluation<'a> {
    fn new(target: &'a Value, creds: &'a Value, store: &'a RuleStore) -> Self {
        Self {
            target,
            creds,
            store,
            path: Vec::new(),
            steps: 0,
            exhausted: false,
        }
    }

    fn enter(&mut self, name: &'a str, rule: &'a Check) -> bool {
        if self.exhausted {
            return false;
        }
        self.steps += 1;
        if self.steps > MAX_RULE_STEPS {
            tracing::warn!(rule = %name, steps = MAX_RULE_STEPS, "Rule evaluation exceeded its step budget, denying");
            self.exhausted = true;
            return false;
        }
        if self.path.contains(&name) {
            tracing::warn!(rule = %name, chain = ?self.path, "Cyclic rule reference, denying");
            return false;
        }
        if self.path.len() >= MAX_RULE_DEPTH {
            tracing::warn!(rule = %name, depth = self.path.len(), "Rule reference chain too deep, denying");
            return false;
        }
        self.path.push(name);
        let allowed = rule.eval(self);
        self.path.pop();
        allowed
    }
}

/// Canonical DSL text. Leaves are written verbatim, so a nested-list leaf
/// containing whitespace (`"role:a b"`) renders as text that the DSL parser
/// splits into two tokens; such output is for display, not for re-parsing.
impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::False => write!(f, "!"),
            Check::True => write!(f, "@"),
            Check::Not(inner) => write!(f, "not {inner}"),
            Check::And(children) => write_joined(f, children, "and", "@"),
            Check::Or(children) => write_joined(f, children, "or", "!"),
            Check::Rule(name) => write!(f, "rule:{name}"),
            Check::Role(name) => write!(f, "role:{name}"),
            Check::Generic { kind, matcher } => write!(f, "{kind}:{matcher}"),
        }
    }
}

/// `(a and b and c)`; an empty node renders as its identity element.
fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Check], op: &str, empty: &str) -> fmt::Result {
    if children.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}
