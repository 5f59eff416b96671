//! Rule DSL parser.
//!
//! Grammar, loosely:
//! - leaves: `@`, `!`, `rule:<name>`, `role:<name>`, `<kind>:<match>`
//! - `not` binds tightest, then `and`, then `or`
//! - parentheses group; runs of the same operator flatten into one node
//!
//! The parser is a shift-reduce state machine over two parallel stacks:
//! symbol kinds and their values. Every shift is followed by greedy
//! reduction of the stack suffix until no rule applies.

use serde_json::Value;

use crate::authz::check::Check;
use crate::authz::errors::PolicyError;
use crate::authz::legacy::{describe, parse_list_rule};
use crate::authz::tokenizer::{tokenize, Token, TokenKind};

/// Build a leaf check from a single word of rule text.
pub fn parse_check(text: &str) -> Check {
    match text {
        "!" => return Check::False,
        "@" => return Check::True,
        _ => {}
    }
    if let Some(name) = text.strip_prefix("rule:") {
        return Check::Rule(name.to_string());
    }
    if let Some(name) = text.strip_prefix("role:") {
        return Check::Role(name.to_string());
    }
    if let Some((kind, matcher)) = text.split_once(':') {
        return Check::Generic {
            kind: kind.to_string(),
            matcher: matcher.to_string(),
        };
    }

    tracing::warn!(check = %text, "Unrecognized check, denying");
    Check::False
}

/// Parse a DSL rule string. Empty text allows; text that does not reduce to
/// a single expression denies.
pub fn parse_text_rule(rule: &str) -> Check {
    if rule.trim().is_empty() {
        return Check::True;
    }

    let mut state = ParseState::default();
    for token in tokenize(rule) {
        state.shift(token);
    }
    match state.finish() {
        Some(check) => check,
        None => {
            tracing::warn!(rule = %rule, "Failed to parse rule, denying");
            Check::False
        }
    }
}

/// Parse one rule value from a policy document: a DSL string or the
/// nested-list form.
pub fn parse_rule(name: &str, value: &Value) -> Result<Check, PolicyError> {
    match value {
        Value::String(text) => Ok(parse_text_rule(text)),
        Value::Array(_) | Value::Null => Ok(parse_list_rule(value)),
        other => Err(PolicyError::UnsupportedRuleValue {
            name: name.to_string(),
            found: describe(other),
        }),
    }
}

// ─── State machine ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    LParen,
    RParen,
    And,
    Or,
    Not,
    String,
    Check,
    AndExpr,
    OrExpr,
}

impl From<TokenKind> for Symbol {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::LParen => Symbol::LParen,
            TokenKind::RParen => Symbol::RParen,
            TokenKind::And => Symbol::And,
            TokenKind::Or => Symbol::Or,
            TokenKind::Not => Symbol::Not,
            TokenKind::Check => Symbol::Check,
            TokenKind::String => Symbol::String,
        }
    }
}

#[derive(Debug)]
enum StackValue {
    Text(String),
    Check(Check),
}

#[derive(Debug, Clone, Copy)]
enum Reduction {
    /// `( x )` -> check
    Unwrap,
    /// `not check` -> check
    Negate,
    /// `check and check` -> and_expr
    MakeAnd,
    /// `and_expr and check` -> and_expr
    ExtendAnd,
    /// `or_expr and check` -> or_expr, binding the `and` to the last branch
    MixOrAnd,
    /// `check or check`, `and_expr or check` -> or_expr
    MakeOr,
    /// `or_expr or check` -> or_expr
    ExtendOr,
}

use Symbol as S;

/// Tried in order against the top of the stack; first match wins.
const REDUCTIONS: &[(&[Symbol], Reduction)] = &[
    (&[S::LParen, S::Check, S::RParen], Reduction::Unwrap),
    (&[S::LParen, S::AndExpr, S::RParen], Reduction::Unwrap),
    (&[S::LParen, S::OrExpr, S::RParen], Reduction::Unwrap),
    (&[S::Not, S::Check], Reduction::Negate),
    (&[S::Check, S::And, S::Check], Reduction::MakeAnd),
    (&[S::AndExpr, S::And, S::Check], Reduction::ExtendAnd),
    (&[S::OrExpr, S::And, S::Check], Reduction::MixOrAnd),
    (&[S::Check, S::Or, S::Check], Reduction::MakeOr),
    (&[S::AndExpr, S::Or, S::Check], Reduction::MakeOr),
    (&[S::OrExpr, S::Or, S::Check], Reduction::ExtendOr),
];

#[derive(Debug, Default)]
struct ParseState {
    symbols: Vec<Symbol>,
    values: Vec<StackValue>,
}

impl ParseState {
    fn shift(&mut self, token: Token) {
        let value = match token.check {
            Some(check) => StackValue::Check(check),
            None => StackValue::Text(token.text),
        };
        self.push(token.kind.into(), value);
        self.reduce();
    }

    fn push(&mut self, symbol: Symbol, value: StackValue) {
        self.symbols.push(symbol);
        self.values.push(value);
    }

    fn reduce(&mut self) {
        while let Some(reduction) = self.next_reduction() {
            self.apply(reduction);
        }
    }

    fn next_reduction(&self) -> Option<Reduction> {
        REDUCTIONS
            .iter()
            .find(|(pattern, _)| self.symbols.ends_with(pattern))
            .map(|(_, reduction)| *reduction)
    }

    fn apply(&mut self, reduction: Reduction) {
        match reduction {
            Reduction::Unwrap => {
                self.discard(); // )
                let inner = self.pop_check();
                self.discard(); // (
                self.push(S::Check, StackValue::Check(inner));
            }
            Reduction::Negate => {
                let inner = self.pop_check();
                self.discard();
                self.push(S::Check, StackValue::Check(Check::Not(Box::new(inner))));
            }
            Reduction::MakeAnd => {
                let right = self.pop_check();
                self.discard();
                let left = self.pop_check();
                self.push(S::AndExpr, StackValue::Check(Check::And(vec![left, right])));
            }
            Reduction::ExtendAnd => {
                let right = self.pop_check();
                self.discard();
                let left = self.pop_check();
                self.push(S::AndExpr, StackValue::Check(left.and_with(right)));
            }
            Reduction::MixOrAnd => {
                let right = self.pop_check();
                self.discard();
                let mut branches = match self.pop_check() {
                    Check::Or(branches) => branches,
                    other => vec![other],
                };
                let joined = match branches.pop() {
                    Some(last) => last.and_with(right),
                    None => right,
                };
                branches.push(joined);
                self.push(S::OrExpr, StackValue::Check(Check::Or(branches)));
            }
            Reduction::MakeOr => {
                let right = self.pop_check();
                self.discard();
                let left = self.pop_check();
                self.push(S::OrExpr, StackValue::Check(Check::Or(vec![left, right])));
            }
            Reduction::ExtendOr => {
                let right = self.pop_check();
                self.discard();
                let mut branches = match self.pop_check() {
                    Check::Or(branches) => branches,
                    other => vec![other],
                };
                branches.push(right);
                self.push(S::OrExpr, StackValue::Check(Check::Or(branches)));
            }
        }
    }

    fn discard(&mut self) {
        self.symbols.pop();
        self.values.pop();
    }

    /// Pop a value the matched pattern guarantees to be a check.
    fn pop_check(&mut self) -> Check {
        self.symbols.pop();
        match self.values.pop() {
            Some(StackValue::Check(check)) => check,
            _ => Check::False,
        }
    }

    /// The single remaining expression, if the input reduced to one.
    fn finish(mut self) -> Option<Check> {
        if self.symbols.len() != 1 {
            return None;
        }
        match self.symbols[0] {
            S::Check | S::AndExpr | S::OrExpr => match self.values.pop() {
                Some(StackValue::Check(check)) => Some(check),
                _ => None,
            },
            _ => None,
        }
    }
}
