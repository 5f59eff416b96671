use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PolicyError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(rulegate::authz::policy_load),
        help("Check that the file exists and is readable")
    )]
    PolicyLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy document: {0}")]
    #[diagnostic(
        code(rulegate::authz::invalid_document),
        help("A policy document is a JSON object mapping rule names to rule strings or lists")
    )]
    InvalidDocument(String),

    #[error("Unsupported value for rule `{name}`: expected a string or a list, got {found}")]
    #[diagnostic(
        code(rulegate::authz::unsupported_rule),
        help("Write the rule as \"role:admin or rule:owner\" or as [[\"role:admin\"], [\"rule:owner\"]]")
    )]
    UnsupportedRuleValue { name: String, found: &'static str },

    #[error("Not authorized by rule `{rule}`")]
    #[diagnostic(code(rulegate::authz::not_authorized))]
    NotAuthorized { rule: String },
}
