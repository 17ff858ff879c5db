//! Which rules of a rulebook are active at the engine's current time.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::Rule;
use crate::engine::Engine;
use crate::error::{WorldError, WorldResult};
use crate::function::ActionFn;
use crate::keys::{Subject, WorldEntity};

/// Something that can be assigned to a name in a [`RuleMappingMut`].
#[derive(Clone)]
pub enum RuleSpec {
    /// A complete rule, which must carry the name it is assigned to.
    Rule(Rule),
    /// The name of a rule, created empty if it does not exist yet.
    Named(String),
    /// A single action; a new rule is built around it.
    Action(ActionFn),
    /// Switch the rule on or off.
    Active(bool),
}

impl From<Rule> for RuleSpec {
    fn from(rule: Rule) -> Self {
        RuleSpec::Rule(rule)
    }
}

impl From<&str> for RuleSpec {
    fn from(name: &str) -> Self {
        RuleSpec::Named(name.to_string())
    }
}

impl From<bool> for RuleSpec {
    fn from(active: bool) -> Self {
        RuleSpec::Active(active)
    }
}

/// Read view of a rulebook's active rules.
///
/// A rule is active when the latest activation record for it, found by the
/// active-branches walk, is `true`. Active rules come in rulebook order;
/// rules activated here but missing from the book follow by name.
#[derive(Clone)]
pub struct RuleMapping<'e> {
    engine: &'e Engine,
    rulebook: String,
}

impl<'e> RuleMapping<'e> {
    pub(crate) fn new(engine: &'e Engine, rulebook: impl Into<String>) -> Self {
        Self {
            engine,
            rulebook: rulebook.into(),
        }
    }

    pub fn rulebook(&self) -> &str {
        &self.rulebook
    }

    /// Names of the active rules.
    pub fn names(&self) -> WorldResult<Vec<String>> {
        let mut active: Vec<String> = self
            .engine
            .live_keys(&activation_entity(&self.rulebook))?
            .into_iter()
            .filter(|name| self.engine.has_rule(name))
            .collect();
        let book = self.engine.rule_store().rulebook(&self.rulebook);
        active.sort_by_cached_key(|name| {
            let position = book.and_then(|b| b.position(name)).unwrap_or(usize::MAX);
            (position, name.clone())
        });
        Ok(active)
    }

    pub fn contains(&self, rule: &str) -> WorldResult<bool> {
        if !self.engine.has_rule(rule) {
            return Ok(false);
        }
        self.engine
            .read_live(&activation_entity(&self.rulebook), rule)
    }

    /// The rule, if it is active right now.
    pub fn get(&self, rule: &str) -> WorldResult<&'e Rule> {
        if !self.contains(rule)? {
            return Err(WorldError::not_found(format!(
                "rule {rule} is not active in rulebook {}",
                self.rulebook
            )));
        }
        let engine: &'e Engine = self.engine;
        engine.rule(rule)
    }

    pub fn len(&self) -> WorldResult<usize> {
        Ok(self.names()?.len())
    }

    pub fn is_empty(&self) -> WorldResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Mutable view of a rulebook's activations. Every change is recorded at the
/// engine's current time.
pub struct RuleMappingMut<'e> {
    engine: &'e mut Engine,
    rulebook: String,
}

impl<'e> RuleMappingMut<'e> {
    pub(crate) fn new(engine: &'e mut Engine, rulebook: impl Into<String>) -> Self {
        Self {
            engine,
            rulebook: rulebook.into(),
        }
    }

    pub fn view(&self) -> RuleMapping<'_> {
        RuleMapping::new(self.engine, self.rulebook.clone())
    }

    /// Activate an existing rule, appending it to the rulebook if needed.
    pub fn activate(&mut self, rule: &str) -> WorldResult<()> {
        self.engine.rule(rule)?;
        let mut book = self.engine.rulebook_mut(&self.rulebook);
        if !book.contains(rule) {
            book.push(rule)?;
        }
        self.engine
            .write(activation_entity(&self.rulebook), rule, Value::Bool(true))?;
        debug!(rulebook = %self.rulebook, rule, "activated rule");
        Ok(())
    }

    /// Deactivate a rule from now on. The rulebook keeps its place for it.
    pub fn deactivate(&mut self, rule: &str) -> WorldResult<()> {
        self.engine.rule(rule)?;
        self.engine
            .write(activation_entity(&self.rulebook), rule, Value::Bool(false))?;
        debug!(rulebook = %self.rulebook, rule, "deactivated rule");
        Ok(())
    }

    pub fn assign(&mut self, key: &str, spec: impl Into<RuleSpec>) -> WorldResult<()> {
        match spec.into() {
            RuleSpec::Rule(rule) => {
                if rule.name() != key {
                    return Err(WorldError::conflict(format!(
                        "rule {} does not go by the name {key}",
                        rule.name()
                    )));
                }
                if !self.engine.has_rule(key) {
                    self.engine.add_rule(rule)?;
                }
                self.activate(key)
            }
            RuleSpec::Named(name) => {
                if !self.engine.has_rule(&name) {
                    self.engine.new_rule(&name)?;
                }
                self.activate(&name)
            }
            RuleSpec::Action(action) => {
                if self.engine.has_rule(key) {
                    return Err(WorldError::conflict(format!(
                        "already have a rule named {key}"
                    )));
                }
                let function = self.engine.actions().unused_name(key);
                self.engine.define_action_fn(&function, action);
                self.engine.add_rule(Rule::new(key).with_action(function))?;
                self.activate(key)
            }
            RuleSpec::Active(true) => self.activate(key),
            RuleSpec::Active(false) => self.deactivate(key),
        }
    }

    /// Assign a dynamically typed value: a string names a rule, a bool
    /// switches `key` on or off.
    pub fn assign_value(&mut self, key: &str, value: &Value) -> WorldResult<()> {
        match value {
            Value::String(name) => self.assign(key, RuleSpec::Named(name.clone())),
            Value::Bool(active) => self.assign(key, RuleSpec::Active(*active)),
            other => Err(WorldError::type_mismatch(format!(
                "cannot use {other} as a rule"
            ))),
        }
    }

    /// Build and activate a rule around one action. Without a name the rule
    /// is called `rule`, suffixed until it is unique.
    pub fn add_action_rule<F>(&mut self, name: Option<&str>, action: F) -> WorldResult<String>
    where
        F: Fn(&mut Engine, &Subject) -> WorldResult<Value> + Send + Sync + 'static,
    {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.engine.unused_rule_name("rule"),
        };
        self.assign(&name, RuleSpec::Action(Arc::new(action)))?;
        Ok(name)
    }
}

fn activation_entity(rulebook: &str) -> WorldEntity {
    WorldEntity::ActiveRules(rulebook.to_string())
}
