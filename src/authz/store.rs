use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::authz::check::{self, Check};
use crate::authz::errors::PolicyError;
use crate::authz::parser::parse_rule;

/// Named rules plus the rule used when a requested name is not defined.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: HashMap<String, Check>,
    default_rule: String,
}

impl RuleStore {
    /// Build a store from a JSON policy document.
    pub fn new_from_json(bytes: &[u8]) -> Result<Self, PolicyError> {
        let mut store = Self::default();
        store.update_from_json(bytes)?;
        Ok(store)
    }

    /// Build a store from already-decoded rule values.
    pub fn new_from_map(map: &Map<String, Value>) -> Self {
        let mut store = Self::default();
        store.update_from_map(map);
        store
    }

    /// Merge a JSON policy document into this store. Rules with the same name
    /// are replaced. The store is left untouched if the document is invalid.
    pub fn update_from_json(&mut self, bytes: &[u8]) -> Result<(), PolicyError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| PolicyError::InvalidDocument(e.to_string()))?;
        let Value::Object(map) = document else {
            return Err(PolicyError::InvalidDocument(
                "top-level value must be a JSON object".into(),
            ));
        };
        self.update_from_map(&map);
        Ok(())
    }

    /// Merge decoded rule values into this store. Values of an unsupported
    /// type are logged and skipped; the rest still load.
    pub fn update_from_map(&mut self, map: &Map<String, Value>) {
        for (name, value) in map {
            match parse_rule(name, value) {
                Ok(check) => {
                    self.rules.insert(name.clone(), check);
                }
                Err(e) => {
                    tracing::warn!(rule = %name, error = %e, "Skipping rule");
                }
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, check: Check) {
        self.rules.insert(name.into(), check);
    }

    pub fn get(&self, name: &str) -> Option<&Check> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_rule(&self) -> &str {
        &self.default_rule
    }

    pub fn set_default_rule(&mut self, name: impl Into<String>) {
        self.default_rule = name.into();
    }

    /// Evaluate the rule called `name`, falling back to the default rule when
    /// it is not defined. Denies when neither exists.
    pub fn rule_check(&self, name: &str, target: &Value, creds: &Value) -> bool {
        if let Some(rule) = self.rules.get(name) {
            return check::check_named(name, rule, target, creds, self);
        }
        if !self.default_rule.is_empty() {
            if let Some(rule) = self.rules.get(&self.default_rule) {
                tracing::debug!(rule = %name, default = %self.default_rule, "Rule not defined, using default rule");
                return check::check_named(&self.default_rule, rule, target, creds, self);
            }
        }
        tracing::debug!(rule = %name, "Rule not defined and no default rule, denying");
        false
    }

    /// Every rule in canonical text form, as a JSON object with sorted keys.
    pub fn to_json(&self) -> Value {
        let rendered: BTreeMap<&str, String> = self
            .rules
            .iter()
            .map(|(name, check)| (name.as_str(), check.to_string()))
            .collect();
        let mut map = Map::new();
        for (name, text) in rendered {
            map.insert(name.to_string(), Value::String(text));
        }
        Value::Object(map)
    }
}
