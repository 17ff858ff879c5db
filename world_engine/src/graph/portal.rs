//! Portals: directed edges between the nodes of one character.
//!
//! A symmetrical portal also creates the reverse edge as a mirror. The mirror
//! exists in its own right for successor and predecessor queries, but its
//! stats are the stats of the edge it mirrors.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::{reject_null, Character, CharacterMut, CharacterView};
use crate::error::{WorldError, WorldResult};
use crate::keys::{Stats, WorldEntity};

/// Read handle on one portal at the engine's current time.
#[derive(Clone)]
pub struct Portal<'e> {
    character: Character<'e>,
    origin: String,
    destination: String,
}

impl<'e> Portal<'e> {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn stat(&self, key: &str) -> WorldResult<Value> {
        self.character
            .portal_stat(&self.origin, &self.destination, key)
    }

    pub fn stats(&self) -> WorldResult<Stats> {
        let mut stats = Stats::new();
        for key in self
            .character
            .portal_stat_keys(&self.origin, &self.destination)?
        {
            let value = self.stat(&key)?;
            stats.insert(key, value);
        }
        Ok(stats)
    }

    /// Whether this edge only mirrors the reverse one.
    pub fn is_mirror(&self) -> WorldResult<bool> {
        self.character.is_mirror(&self.origin, &self.destination)
    }

    /// The portal going the other way, if there is one.
    pub fn reciprocal(&self) -> WorldResult<Option<Portal<'e>>> {
        if !self.character.has_portal(&self.destination, &self.origin)? {
            return Ok(None);
        }
        Ok(Some(Portal {
            character: self.character.clone(),
            origin: self.destination.clone(),
            destination: self.origin.clone(),
        }))
    }
}

impl<'e> Character<'e> {
    pub fn portal(&self, origin: &str, destination: &str) -> WorldResult<Portal<'e>> {
        self.require_portal(origin, destination)?;
        Ok(self.portal_handle(origin, destination))
    }

    /// Portals leaving `origin`, keyed by destination.
    pub fn portals_from(&self, origin: &str) -> WorldResult<BTreeMap<String, Portal<'e>>> {
        Ok(self
            .successors(origin)?
            .into_iter()
            .map(|destination| {
                let portal = self.portal_handle(origin, &destination);
                (destination, portal)
            })
            .collect())
    }

    /// Portals entering `destination`, keyed by origin.
    pub fn portals_to(&self, destination: &str) -> WorldResult<BTreeMap<String, Portal<'e>>> {
        Ok(self
            .predecessors(destination)?
            .into_iter()
            .map(|origin| {
                let portal = self.portal_handle(&origin, destination);
                (origin, portal)
            })
            .collect())
    }

    pub fn is_mirror(&self, origin: &str, destination: &str) -> WorldResult<bool> {
        self.engine
            .read_live(&self.mirrors_entity(origin), destination)
    }

    fn portal_handle(&self, origin: &str, destination: &str) -> Portal<'e> {
        Portal {
            character: self.clone(),
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }

    /// The edge whose stats `origin -> destination` reads and writes.
    pub(super) fn stat_target(&self, origin: &str, destination: &str) -> WorldResult<(String, String)> {
        if self.is_mirror(origin, destination)? {
            Ok((destination.to_string(), origin.to_string()))
        } else {
            Ok((origin.to_string(), destination.to_string()))
        }
    }
}

impl CharacterMut<'_> {
    /// Connect two nodes, creating either as a place if it does not exist.
    ///
    /// With `symmetrical`, a missing reverse edge is created as a mirror that
    /// shares this portal's stats. A reverse edge that already exists is left
    /// as it is and keeps its own stats.
    pub fn add_portal(&mut self, origin: &str, destination: &str, symmetrical: bool) -> WorldResult<()> {
        self.add_portal_with(origin, destination, symmetrical, Stats::new())
    }

    pub fn add_portal_with(
        &mut self,
        origin: &str,
        destination: &str,
        symmetrical: bool,
        stats: Stats,
    ) -> WorldResult<()> {
        for node in [origin, destination] {
            if !self.view().has_node(node)? {
                self.write_node(node, true)?;
            }
        }
        let (was_mirror, reverse_exists) = {
            let view = self.view();
            (
                view.is_mirror(origin, destination)?,
                view.has_portal(destination, origin)?,
            )
        };
        self.write_edge(origin, destination, true)?;
        if was_mirror {
            let entity = self.view().mirrors_entity(origin);
            self.engine.write(entity, destination, Value::Bool(false))?;
        }
        if symmetrical && !reverse_exists {
            self.write_edge(destination, origin, true)?;
            let entity = self.view().mirrors_entity(destination);
            self.engine.write(entity, origin, Value::Bool(true))?;
        }
        for (key, value) in stats {
            self.set_portal_stat(origin, destination, &key, value)?;
        }
        debug!(character = %self.name, origin, destination, symmetrical, "added portal");
        Ok(())
    }

    /// Add plain portals from `(origin, destination)` pairs.
    pub fn add_portals_from<I, O, D>(&mut self, portals: I, symmetrical: bool) -> WorldResult<()>
    where
        I: IntoIterator<Item = (O, D)>,
        O: AsRef<str>,
        D: AsRef<str>,
    {
        for (origin, destination) in portals {
            self.add_portal(origin.as_ref(), destination.as_ref(), symmetrical)?;
        }
        Ok(())
    }

    pub fn del_portal(&mut self, origin: &str, destination: &str) -> WorldResult<()> {
        self.view().require_portal(origin, destination)?;
        self.tombstone_portal(origin, destination)?;
        debug!(character = %self.name, origin, destination, "deleted portal");
        Ok(())
    }

    /// Set a portal stat. `origin` and `destination` are not stats.
    pub fn set_portal_stat(
        &mut self,
        origin: &str,
        destination: &str,
        key: &str,
        value: Value,
    ) -> WorldResult<()> {
        if key == "origin" || key == "destination" {
            return Err(WorldError::type_mismatch(format!(
                "{key} of a portal cannot be changed"
            )));
        }
        reject_null(&value, key)?;
        let entity = self.portal_stat_entity(origin, destination)?;
        self.engine.write(entity, key, value)
    }

    pub fn del_portal_stat(&mut self, origin: &str, destination: &str, key: &str) -> WorldResult<()> {
        self.view().portal_stat(origin, destination, key)?;
        let entity = self.portal_stat_entity(origin, destination)?;
        self.engine.write(entity, key, Value::Null)
    }

    pub(super) fn tombstone_portal(&mut self, origin: &str, destination: &str) -> WorldResult<()> {
        let was_mirror = self.view().is_mirror(origin, destination)?;
        self.write_edge(origin, destination, false)?;
        if was_mirror {
            let entity = self.view().mirrors_entity(origin);
            self.engine.write(entity, destination, Value::Bool(false))?;
        }
        Ok(())
    }

    fn write_edge(&mut self, origin: &str, destination: &str, exists: bool) -> WorldResult<()> {
        let (successors, predecessors) = {
            let view = self.view();
            (
                view.successors_entity(origin),
                view.predecessors_entity(destination),
            )
        };
        self.engine
            .write(successors, destination, Value::Bool(exists))?;
        self.engine
            .write(predecessors, origin, Value::Bool(exists))
    }

    fn portal_stat_entity(&self, origin: &str, destination: &str) -> WorldResult<WorldEntity> {
        let view = self.view();
        view.require_portal(origin, destination)?;
        let (o, d) = view.stat_target(origin, destination)?;
        Ok(view.portal_stats_entity(&o, &d))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::error::WorldError;
    use crate::graph::CharacterView;
    use crate::keys::RulebookOverrides;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap();
        engine
    }

    #[test]
    fn test_add_portal_creates_missing_nodes() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portal("A", "B", false).unwrap();

        let view = physical.view();
        assert_eq!(view.places().unwrap(), vec!["A", "B"]);
        assert_eq!(view.successors("A").unwrap(), vec!["B"]);
        assert_eq!(view.predecessors("B").unwrap(), vec!["A"]);
        assert!(!view.has_portal("B", "A").unwrap());
    }

    #[test]
    fn test_mirror_shares_stats() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portal("A", "B", true).unwrap();
        physical.set_portal_stat("B", "A", "length", json!(4)).unwrap();

        let view = physical.view();
        let mirror = view.portal("B", "A").unwrap();
        assert!(mirror.is_mirror().unwrap());
        assert_eq!(view.portal("A", "B").unwrap().stat("length").unwrap(), json!(4));
        assert_eq!(mirror.reciprocal().unwrap().unwrap().destination(), "A");
    }

    #[test]
    fn test_symmetry_keeps_existing_reverse_portal() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portal("B", "A", false).unwrap();
        physical.set_portal_stat("B", "A", "length", json!(9)).unwrap();
        physical.add_portal("A", "B", true).unwrap();

        let view = physical.view();
        assert!(!view.is_mirror("B", "A").unwrap());
        assert!(matches!(
            view.portal_stat("A", "B", "length"),
            Err(WorldError::NotFound(_))
        ));
    }

    #[test]
    fn test_portal_endpoints_are_not_stats() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portal("A", "B", false).unwrap();
        assert!(matches!(
            physical.set_portal_stat("A", "B", "origin", json!("C")),
            Err(WorldError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_del_portal() {
        let mut engine = engine();
        let mut physical = engine.character_mut("physical").unwrap();
        physical.add_portals_from([("A", "B"), ("B", "C")], false).unwrap();
        physical.del_portal("A", "B").unwrap();

        let view = physical.view();
        assert_eq!(view.portals().unwrap(), vec![("B".to_string(), "C".to_string())]);
        assert!(view.portals_from("A").unwrap().is_empty());
        assert_eq!(view.portals_to("C").unwrap().len(), 1);
        assert!(matches!(
            physical.del_portal("A", "B"),
            Err(WorldError::NotFound(_))
        ));
    }
}
