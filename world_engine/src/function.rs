//! Named registries of rule, comparator, and sense functions.
//!
//! Rules refer to functions by name only, so a rule can be stored, copied, and
//! listed without holding any closures.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{WorldError, WorldResult};
use crate::facade::Facade;
use crate::keys::Subject;

/// Decides whether a rule is considered this turn.
pub type TriggerFn = Arc<dyn Fn(&mut Engine, &Subject) -> WorldResult<bool> + Send + Sync>;

/// Must hold for a triggered rule to act.
pub type PrereqFn = Arc<dyn Fn(&mut Engine, &Subject) -> WorldResult<bool> + Send + Sync>;

/// Changes the world. A non-null return value is reported in the turn report.
pub type ActionFn = Arc<dyn Fn(&mut Engine, &Subject) -> WorldResult<Value> + Send + Sync>;

/// `comparator(stat, threshold)` returns true for entities that should be culled.
pub type ComparatorFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Receives the observing character's name and a facade of the observed
/// character, and returns the facade as the observer perceives it.
pub type SenseFn =
    Arc<dyn for<'a> Fn(&'a Engine, &str, Facade<'a>) -> WorldResult<Facade<'a>> + Send + Sync>;

/// Functions of one kind, by name.
#[derive(Clone)]
pub struct FunctionStore<F> {
    kind: &'static str,
    functions: BTreeMap<String, F>,
}

impl<F: Clone> FunctionStore<F> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            functions: BTreeMap::new(),
        }
    }

    /// Register `function` under `name`, replacing any earlier definition.
    pub fn define(&mut self, name: impl Into<String>, function: F) {
        self.functions.insert(name.into(), function);
    }

    pub fn resolve(&self, name: &str) -> WorldResult<F> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| WorldError::not_found(format!("{} function {name}", self.kind)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<F> {
        self.functions.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// `base` if it is free, otherwise the first free `base0`, `base1`, ...
    pub fn unused_name(&self, base: &str) -> String {
        unused_name(base, |name| self.contains(name))
    }
}

impl<F> fmt::Debug for FunctionStore<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionStore")
            .field("kind", &self.kind)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn unused_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (0u64..)
        .map(|i| format!("{base}{i}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FunctionStore<ComparatorFn> {
        FunctionStore::new("comparator")
    }

    #[test]
    fn test_resolve_missing_is_not_found() {
        let err = store().resolve("nope").err().unwrap();
        assert!(matches!(err, WorldError::NotFound(msg) if msg.contains("comparator")));
    }

    #[test]
    fn test_define_replaces() {
        let mut store = store();
        store.define("cmp", Arc::new(|_: &Value, _: &Value| false) as ComparatorFn);
        store.define("cmp", Arc::new(|_: &Value, _: &Value| true) as ComparatorFn);

        let cmp = store.resolve("cmp").unwrap();
        assert!(cmp(&Value::Null, &Value::Null));
        assert_eq!(store.names().count(), 1);
    }

    #[test]
    fn test_unused_name_suffixes() {
        let mut store = store();
        assert_eq!(store.unused_name("move"), "move");
        store.define("move", Arc::new(|_: &Value, _: &Value| true) as ComparatorFn);
        assert_eq!(store.unused_name("move"), "move0");
        store.define("move0", Arc::new(|_: &Value, _: &Value| true) as ComparatorFn);
        assert_eq!(store.unused_name("move"), "move1");
    }
}
