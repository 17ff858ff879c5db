//! Ordered rule lists.
//!
//! Rulebooks are structural: their order is shared by every branch and tick.
//! Only the activation of a rule within a book is versioned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

use super::Rule;
use crate::error::{WorldError, WorldResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    name: String,
    rules: Vec<String>,
}

impl RuleBook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.rules.get(index).map(String::as_str)
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.position(rule).is_some()
    }

    pub fn position(&self, rule: &str) -> Option<usize> {
        self.rules.iter().position(|name| name == rule)
    }

    pub fn push(&mut self, rule: &str) -> WorldResult<()> {
        self.check_absent(rule)?;
        self.rules.push(rule.to_string());
        Ok(())
    }

    /// Insert at `index`, shifting later rules back. `index` may equal the length.
    pub fn insert(&mut self, index: usize, rule: &str) -> WorldResult<()> {
        if index > self.rules.len() {
            return Err(self.bad_index(index));
        }
        self.check_absent(rule)?;
        self.rules.insert(index, rule.to_string());
        Ok(())
    }

    /// Replace the rule at `index`, returning the one it replaced.
    pub fn set(&mut self, index: usize, rule: &str) -> WorldResult<String> {
        match self.position(rule) {
            Some(at) if at == index => return Ok(rule.to_string()),
            Some(_) => return Err(self.duplicate(rule)),
            None => {}
        }
        let slot = self
            .rules
            .get_mut(index)
            .ok_or_else(|| WorldError::not_found(format!("index {index} of rulebook {}", self.name)))?;
        Ok(std::mem::replace(slot, rule.to_string()))
    }

    pub fn remove(&mut self, index: usize) -> WorldResult<String> {
        if index >= self.rules.len() {
            return Err(self.bad_index(index));
        }
        Ok(self.rules.remove(index))
    }

    /// Remove `rule` wherever it is. Returns whether it was present.
    pub fn remove_rule(&mut self, rule: &str) -> bool {
        match self.position(rule) {
            Some(index) => {
                self.rules.remove(index);
                true
            }
            None => false,
        }
    }

    fn check_absent(&self, rule: &str) -> WorldResult<()> {
        if self.contains(rule) {
            return Err(self.duplicate(rule));
        }
        Ok(())
    }

    fn duplicate(&self, rule: &str) -> WorldError {
        WorldError::conflict(format!("rulebook {} already holds {rule}", self.name))
    }

    fn bad_index(&self, index: usize) -> WorldError {
        WorldError::not_found(format!("index {index} of rulebook {}", self.name))
    }
}

/// Mutable access to a rulebook that only admits rules the engine knows.
pub struct RuleBookEditor<'a> {
    book: &'a mut RuleBook,
    rules: &'a BTreeMap<String, Rule>,
}

impl<'a> RuleBookEditor<'a> {
    pub(crate) fn new(book: &'a mut RuleBook, rules: &'a BTreeMap<String, Rule>) -> Self {
        Self { book, rules }
    }

    pub fn push(&mut self, rule: &str) -> WorldResult<()> {
        self.check_known(rule)?;
        self.book.push(rule)
    }

    pub fn insert(&mut self, index: usize, rule: &str) -> WorldResult<()> {
        self.check_known(rule)?;
        self.book.insert(index, rule)
    }

    pub fn set(&mut self, index: usize, rule: &str) -> WorldResult<String> {
        self.check_known(rule)?;
        self.book.set(index, rule)
    }

    pub fn remove(&mut self, index: usize) -> WorldResult<String> {
        self.book.remove(index)
    }

    pub fn remove_rule(&mut self, rule: &str) -> bool {
        self.book.remove_rule(rule)
    }

    fn check_known(&self, rule: &str) -> WorldResult<()> {
        if !self.rules.contains_key(rule) {
            return Err(WorldError::not_found(format!("rule {rule}")));
        }
        Ok(())
    }
}

impl Deref for RuleBookEditor<'_> {
    type Target = RuleBook;

    fn deref(&self) -> &RuleBook {
        self.book
    }
}
