//! Rulegate - policy-as-code authorization engine
//!
//! Compiles authorization rules into check trees and answers "is this
//! allowed?" for a target and a set of credentials, denying whenever a rule
//! is missing, malformed or cannot be resolved.

pub mod authz;
pub mod settings;

pub use authz::{Check, Enforceable, PolicyEnforcer, PolicyError, RuleStore};
pub use settings::{PolicyOpts, Settings};
