use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::authz::check::Check;
use crate::authz::errors::PolicyError;
use crate::authz::loader::{self, LoadSummary};
use crate::authz::store::RuleStore;
use crate::settings::PolicyOpts;

/// What to enforce: a rule name looked up in the store, or a check built by
/// the caller.
#[derive(Debug, Clone, Copy)]
pub enum Enforceable<'a> {
    Name(&'a str),
    Check(&'a Check),
}

impl<'a> From<&'a str> for Enforceable<'a> {
    fn from(name: &'a str) -> Self {
        Enforceable::Name(name)
    }
}

impl<'a> From<&'a String> for Enforceable<'a> {
    fn from(name: &'a String) -> Self {
        Enforceable::Name(name)
    }
}

impl<'a> From<&'a Check> for Enforceable<'a> {
    fn from(check: &'a Check) -> Self {
        Enforceable::Check(check)
    }
}

/// Answers authorization questions against the current rule set.
///
/// The rules live in an immutable [`RuleStore`] snapshot. Loads build a new
/// store and swap it in; evaluations already running keep the snapshot they
/// started with.
#[derive(Debug)]
pub struct PolicyEnforcer {
    store: RwLock<Arc<RuleStore>>,
    /// Sources of the last load. Also serializes loads.
    opts: Mutex<Option<PolicyOpts>>,
}

impl PolicyEnforcer {
    /// An enforcer with no rules; call [`load_rules`](Self::load_rules) to
    /// populate it.
    pub fn new() -> Self {
        Self::from_store(RuleStore::default())
    }

    /// An enforcer over a store built by the caller.
    pub fn from_store(store: RuleStore) -> Self {
        Self {
            store: RwLock::new(Arc::new(store)),
            opts: Mutex::new(None),
        }
    }

    /// Build an enforcer and load rules from `opts`.
    pub fn from_opts(opts: &PolicyOpts) -> Result<Self, PolicyError> {
        let enforcer = Self::new();
        enforcer.load_rules(opts)?;
        Ok(enforcer)
    }

    /// The current rule set.
    pub fn snapshot(&self) -> Arc<RuleStore> {
        Arc::clone(&self.store.read())
    }

    /// Evaluate a named rule (with default-rule fallback) or a caller-built
    /// check. Any failure to find or evaluate a rule denies.
    pub fn enforce<'a>(&self, rule: impl Into<Enforceable<'a>>, target: &Value, creds: &Value) -> bool {
        let store = self.snapshot();
        let rule = rule.into();
        let allowed = match rule {
            Enforceable::Name(name) => store.rule_check(name, target, creds),
            Enforceable::Check(check) => check.check(target, creds, &store),
        };
        tracing::trace!(rule = %describe(rule), allowed, "Policy decision");
        allowed
    }

    pub fn rule_check(&self, name: &str, target: &Value, creds: &Value) -> bool {
        self.snapshot().rule_check(name, target, creds)
    }

    /// Like [`enforce`](Self::enforce), but a denial is an error.
    pub fn authorize<'a>(
        &self,
        rule: impl Into<Enforceable<'a>>,
        target: &Value,
        creds: &Value,
    ) -> Result<(), PolicyError> {
        let rule = rule.into();
        if self.enforce(rule, target, creds) {
            Ok(())
        } else {
            Err(PolicyError::NotAuthorized {
                rule: describe(rule),
            })
        }
    }

    /// Load the policy file and directories from `opts` on top of the
    /// current rules, then swap the result in. On error the current rules
    /// stay in place.
    pub fn load_rules(&self, opts: &PolicyOpts) -> Result<LoadSummary, PolicyError> {
        let mut last = self.opts.lock();
        let current = self.snapshot();
        let (store, summary) = loader::load_rules(Some(&current), opts)?;
        *self.store.write() = Arc::new(store);
        *last = Some(opts.clone());
        Ok(summary)
    }

    /// Re-read the sources of the last [`load_rules`](Self::load_rules) into
    /// a fresh store, dropping rules that no longer exist in them.
    pub fn reload(&self) -> Result<LoadSummary, PolicyError> {
        let last = self.opts.lock();
        let Some(opts) = last.as_ref() else {
            tracing::debug!("No policy sources loaded yet, nothing to reload");
            return Ok(LoadSummary {
                rules: self.snapshot().len(),
                ..LoadSummary::default()
            });
        };
        let (store, summary) = loader::load_rules(None, opts)?;
        *self.store.write() = Arc::new(store);
        Ok(summary)
    }

    /// Replace the rule set wholesale.
    pub fn set_rules(&self, store: RuleStore) {
        let _guard = self.opts.lock();
        *self.store.write() = Arc::new(store);
    }

    /// Drop every rule. Everything denies until rules are loaded again.
    pub fn clear(&self) {
        self.set_rules(RuleStore::default());
    }
}

impl Default for PolicyEnforcer {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(rule: Enforceable<'_>) -> String {
    match rule {
        Enforceable::Name(name) => name.to_string(),
        Enforceable::Check(check) => check.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage_enforcer() -> PolicyEnforcer {
        let store = RuleStore::new_from_json(
            br#"{
                "storage_put": "{{.is_admin}}:True or role:admin",
                "storage_get": "role:operator"
            }"#,
        )
        .unwrap();
        PolicyEnforcer::from_store(store)
    }

    #[test]
    fn test_enforce_by_name() {
        let enforcer = storage_enforcer();
        let creds = json!({ "roles": ["operator"] });
        assert!(enforcer.enforce("storage_get", &Value::Null, &creds));
        assert!(!enforcer.enforce("storage_put", &Value::Null, &creds));

        let admin = json!({ "roles": [], "is_admin": true });
        assert!(enforcer.enforce("storage_put", &Value::Null, &admin));
    }

    #[test]
    fn test_enforce_string_and_check() {
        let enforcer = storage_enforcer();
        let creds = json!({ "roles": ["operator"] });
        let name = String::from("storage_get");
        assert!(enforcer.enforce(&name, &Value::Null, &creds));

        let check = Check::Or(vec![Check::Rule("storage_put".into()), Check::Role("operator".into())]);
        assert!(enforcer.enforce(&check, &Value::Null, &creds));
        assert!(!enforcer.enforce(&Check::False, &Value::Null, &creds));
    }

    #[test]
    fn test_unknown_rule_without_default_denies() {
        let enforcer = storage_enforcer();
        assert!(!enforcer.rule_check("nonexistent", &Value::Null, &json!({ "roles": ["operator"] })));
    }

    #[test]
    fn test_authorize_reports_rule() {
        let enforcer = storage_enforcer();
        let creds = json!({ "roles": ["operator"] });
        assert!(enforcer.authorize("storage_get", &Value::Null, &creds).is_ok());
        match enforcer.authorize("storage_put", &Value::Null, &creds) {
            Err(PolicyError::NotAuthorized { rule }) => assert_eq!(rule, "storage_put"),
            other => panic!("expected NotAuthorized, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let enforcer = storage_enforcer();
        let before = enforcer.snapshot();
        enforcer.clear();
        assert!(before.contains("storage_get"));
        assert!(enforcer.snapshot().is_empty());
        assert!(!enforcer.enforce("storage_get", &Value::Null, &json!({ "roles": ["operator"] })));
    }

    #[test]
    fn test_reload_without_sources_keeps_rules() {
        let enforcer = storage_enforcer();
        let summary = enforcer.reload().unwrap();
        assert_eq!(summary.rules, 2);
        assert!(enforcer.snapshot().contains("storage_put"));
    }

    #[test]
    fn test_enforcer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyEnforcer>();
    }
}
