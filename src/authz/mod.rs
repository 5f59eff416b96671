//! Rule compilation and enforcement.
//!
//! Rules are written as DSL strings (`role:admin or rule:owner`) or in the
//! nested-list JSON form, compiled into [`Check`] trees, kept in a
//! [`RuleStore`], and evaluated through a [`PolicyEnforcer`].

pub mod check;
pub mod enforcer;
pub mod errors;
pub mod legacy;
pub mod loader;
pub mod parser;
pub mod resolve;
pub mod store;
pub mod tokenizer;

pub use check::Check;
pub use enforcer::{Enforceable, PolicyEnforcer};
pub use errors::PolicyError;
pub use loader::LoadSummary;
pub use parser::{parse_check, parse_rule, parse_text_rule};
pub use store::RuleStore;
