//! Rules, rulebooks, and rule activation.
//!
//! ## Structure
//!
//! - **Rule**: trigger, prereq, and action function names, plus the protocol
//!   for evaluating them against a subject
//! - **RuleBook**: an ordered list of rule names, shared across time
//! - **RuleMapping**: versioned activation of the rules in one rulebook
//! - **RuleFollower**: the versioned rulebook binding of one entity collection

mod definition;
mod follower;
mod mapping;
mod rulebook;

pub use definition::Rule;
pub use follower::{RuleFollower, RuleFollowerMut};
pub use mapping::{RuleMapping, RuleMappingMut, RuleSpec};
pub use rulebook::{RuleBook, RuleBookEditor};

use std::collections::BTreeMap;
use tracing::debug;

use crate::engine::Engine;
use crate::error::{WorldError, WorldResult};
use crate::function::unused_name;

/// Every rule and rulebook known to an engine. Neither is versioned.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: BTreeMap<String, Rule>,
    rulebooks: BTreeMap<String, RuleBook>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rulebook(&self, name: &str) -> Option<&RuleBook> {
        self.rulebooks.get(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn rulebook_names(&self) -> impl Iterator<Item = &str> {
        self.rulebooks.keys().map(String::as_str)
    }

    /// Editor for `name`, creating an empty rulebook if there is none.
    pub fn edit(&mut self, name: &str) -> RuleBookEditor<'_> {
        let book = self
            .rulebooks
            .entry(name.to_string())
            .or_insert_with(|| RuleBook::new(name));
        RuleBookEditor::new(book, &self.rules)
    }
}

impl Engine {
    pub fn rule_store(&self) -> &RuleStore {
        &self.rules
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.rules.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> WorldResult<&Rule> {
        self.rules
            .rule(name)
            .ok_or_else(|| WorldError::not_found(format!("rule {name}")))
    }

    /// Unchecked access for editing function lists. Names that do not resolve
    /// fail when the rule is invoked.
    pub fn rule_mut(&mut self, name: &str) -> WorldResult<&mut Rule> {
        self.rules
            .rules
            .get_mut(name)
            .ok_or_else(|| WorldError::not_found(format!("rule {name}")))
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules.rule_names().map(str::to_string).collect()
    }

    /// Create an empty rule.
    pub fn new_rule(&mut self, name: &str) -> WorldResult<()> {
        self.add_rule(Rule::new(name))
    }

    /// Register a rule. Its name must be unused and every function it names
    /// must already be registered.
    pub fn add_rule(&mut self, rule: Rule) -> WorldResult<()> {
        if self.has_rule(rule.name()) {
            return Err(WorldError::conflict(format!("rule {}", rule.name())));
        }
        for trigger in rule.triggers() {
            self.triggers().resolve(trigger)?;
        }
        for prereq in rule.prereqs() {
            self.prereqs().resolve(prereq)?;
        }
        for action in rule.actions() {
            self.actions().resolve(action)?;
        }
        debug!(rule = rule.name(), "created rule");
        self.rules.rules.insert(rule.name().to_string(), rule);
        Ok(())
    }

    /// Copy a rule's function lists under a new name.
    pub fn duplicate_rule(&mut self, name: &str, new_name: &str) -> WorldResult<()> {
        let copy = self.rule(name)?.duplicate(new_name);
        self.add_rule(copy)
    }

    /// Forget a rule and take it out of every rulebook.
    pub fn del_rule(&mut self, name: &str) -> WorldResult<Rule> {
        let rule = self
            .rules
            .rules
            .remove(name)
            .ok_or_else(|| WorldError::not_found(format!("rule {name}")))?;
        for book in self.rules.rulebooks.values_mut() {
            book.remove_rule(name);
        }
        debug!(rule = name, "deleted rule");
        Ok(rule)
    }

    pub fn add_trigger(&mut self, rule: &str, trigger: &str) -> WorldResult<()> {
        self.triggers().resolve(trigger)?;
        self.rule_mut(rule)?.push_trigger(trigger);
        Ok(())
    }

    pub fn add_prereq(&mut self, rule: &str, prereq: &str) -> WorldResult<()> {
        self.prereqs().resolve(prereq)?;
        self.rule_mut(rule)?.push_prereq(prereq);
        Ok(())
    }

    pub fn add_action(&mut self, rule: &str, action: &str) -> WorldResult<()> {
        self.actions().resolve(action)?;
        self.rule_mut(rule)?.push_action(action);
        Ok(())
    }

    pub fn rulebook(&self, name: &str) -> WorldResult<&RuleBook> {
        self.rules
            .rulebook(name)
            .ok_or_else(|| WorldError::not_found(format!("rulebook {name}")))
    }

    /// Editor for a rulebook, created empty if it does not exist.
    pub fn rulebook_mut(&mut self, name: &str) -> RuleBookEditor<'_> {
        self.rules.edit(name)
    }

    pub(crate) fn unused_rule_name(&self, base: &str) -> String {
        unused_name(base, |name| self.has_rule(name))
    }
}
