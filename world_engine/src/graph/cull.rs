//! Deleting every node or portal whose stat passes a comparison.

use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

use super::{CharacterMut, CharacterView};
use crate::engine::Engine;
use crate::error::{found, WorldResult};
use crate::function::ComparatorFn;

/// How a stat is compared with the threshold. `stat <op> threshold` culls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    /// A comparator function registered with the engine.
    Named(String),
}

impl From<&str> for Comparator {
    fn from(name: &str) -> Self {
        match name {
            "ge" | ">=" => Comparator::Ge,
            "gt" | ">" => Comparator::Gt,
            "le" | "<=" => Comparator::Le,
            "lt" | "<" => Comparator::Lt,
            "eq" | "==" => Comparator::Eq,
            other => Comparator::Named(other.to_string()),
        }
    }
}

enum Resolved {
    Builtin(fn(Ordering) -> bool),
    Eq,
    Function(ComparatorFn),
}

impl Comparator {
    fn resolve(&self, engine: &Engine) -> WorldResult<Resolved> {
        Ok(match self {
            Comparator::Ge => Resolved::Builtin(Ordering::is_ge),
            Comparator::Gt => Resolved::Builtin(Ordering::is_gt),
            Comparator::Le => Resolved::Builtin(Ordering::is_le),
            Comparator::Lt => Resolved::Builtin(Ordering::is_lt),
            Comparator::Eq => Resolved::Eq,
            Comparator::Named(name) => Resolved::Function(engine.comparators().resolve(name)?),
        })
    }
}

impl Resolved {
    fn test(&self, stat: &Value, threshold: &Value) -> bool {
        match self {
            Resolved::Builtin(accepts) => compare(stat, threshold).is_some_and(accepts),
            Resolved::Eq => stat == threshold,
            Resolved::Function(function) => function(stat, threshold),
        }
    }
}

/// Numbers compare numerically and strings lexically; other pairs are unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl CharacterMut<'_> {
    /// Delete every node whose `stat` passes `comparator` against `threshold`.
    /// Nodes without the stat are kept. Returns the deleted names.
    pub fn cull_nodes(
        &mut self,
        stat: &str,
        threshold: &Value,
        comparator: impl Into<Comparator>,
    ) -> WorldResult<Vec<String>> {
        let comparator: Comparator = comparator.into();
        let test = comparator.resolve(self.engine)?;
        let doomed = {
            let view = self.view();
            let mut doomed = Vec::new();
            for node in view.nodes()? {
                if let Some(value) = found(view.node_stat(&node, stat))? {
                    if test.test(&value, threshold) {
                        doomed.push(node);
                    }
                }
            }
            doomed
        };
        for node in &doomed {
            self.del_node(node)?;
        }
        debug!(character = %self.name, stat, culled = doomed.len(), "culled nodes");
        Ok(doomed)
    }

    /// Delete every portal whose `stat` passes `comparator` against `threshold`.
    pub fn cull_portals(
        &mut self,
        stat: &str,
        threshold: &Value,
        comparator: impl Into<Comparator>,
    ) -> WorldResult<Vec<(String, String)>> {
        let comparator: Comparator = comparator.into();
        let test = comparator.resolve(self.engine)?;
        let doomed = {
            let view = self.view();
            let mut doomed = Vec::new();
            for (origin, destination) in view.portals()? {
                if let Some(value) = found(view.portal_stat(&origin, &destination, stat))? {
                    if test.test(&value, threshold) {
                        doomed.push((origin, destination));
                    }
                }
            }
            doomed
        };
        for (origin, destination) in &doomed {
            self.del_portal(origin, destination)?;
        }
        debug!(character = %self.name, stat, culled = doomed.len(), "culled portals");
        Ok(doomed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::WorldError;
    use crate::keys::RulebookOverrides;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        let mut physical = engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap();
        for (name, hp) in [("a", 1), ("b", 5), ("c", 9)] {
            physical.add_place(name).unwrap();
            physical.set_node_stat(name, "hp", json!(hp)).unwrap();
        }
        physical.add_place("bare").unwrap();
        engine
    }

    #[test]
    fn test_cull_nodes_with_builtin() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        let culled = physical.cull_nodes("hp", &json!(5), "lt").unwrap();

        assert_eq!(culled, vec!["a"]);
        assert_eq!(physical.view().nodes().unwrap(), vec!["b", "bare", "c"]);
    }

    #[test]
    fn test_cull_nodes_with_registered_comparator() {
        let mut engine = engine();
        engine.define_comparator("odd", |stat, _| stat.as_i64().is_some_and(|n| n % 2 == 1));
        let culled = engine
            .character_mut("physical")
            .unwrap()
            .cull_nodes("hp", &Value::Null, "odd")
            .unwrap();
        assert_eq!(culled, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_comparator_is_not_found() {
        let mut engine = engine();
        let result = engine
            .character_mut("physical")
            .unwrap()
            .cull_nodes("hp", &json!(1), "sideways");
        assert!(matches!(result, Err(WorldError::NotFound(_))));
    }

    #[test]
    fn test_cull_portals() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portal("a", "b", false).unwrap();
        physical.add_portal("b", "c", false).unwrap();
        physical.set_portal_stat("a", "b", "toll", json!(3)).unwrap();
        physical.set_portal_stat("b", "c", "toll", json!(0)).unwrap();

        let culled = physical.cull_portals("toll", &json!(1), Comparator::Ge).unwrap();
        assert_eq!(culled, vec![("a".to_string(), "b".to_string())]);
        assert_eq!(physical.view().portals().unwrap().len(), 1);
    }

    #[test]
    fn test_mixed_kinds_never_order() {
        assert_eq!(compare(&json!(1), &json!("1")), None);
        assert_eq!(compare(&json!(2.5), &json!(2)), Some(Ordering::Greater));
    }
}
