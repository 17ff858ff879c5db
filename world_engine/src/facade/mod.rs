//! Facades: copy-on-write views of a character.
//!
//! A facade reads through to the character (or facade) it wraps, except where
//! it has local changes. Every write lands in the facade's own overlays, so no
//! sequence of facade operations can touch the world. Facades are built for
//! one use, such as the result of a sense, and are never persisted.

mod overlay;

pub use overlay::{Layer, Overlay};

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{WorldError, WorldResult};
use crate::graph::{reject_null, CharacterView};
use crate::keys::ThingLocation;

type Edge = (String, String);

pub struct Facade<'a> {
    inner: Box<dyn CharacterView + 'a>,
    stats: Overlay<String, Value>,
    nodes: Overlay<String, ()>,
    /// `Some` makes the node a thing, `None` a place.
    locations: Overlay<String, Option<ThingLocation>>,
    node_stats: BTreeMap<String, Overlay<String, Value>>,
    portals: Overlay<Edge, ()>,
    portal_stats: BTreeMap<Edge, Overlay<String, Value>>,
}

impl<'a> Facade<'a> {
    pub fn new(inner: impl CharacterView + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            stats: Overlay::new(),
            nodes: Overlay::new(),
            locations: Overlay::new(),
            node_stats: BTreeMap::new(),
            portals: Overlay::new(),
            portal_stats: BTreeMap::new(),
        }
    }

    /// Another facade on top of this one.
    pub fn facade(&self) -> Facade<'_> {
        Facade::new(self)
    }

    /// Whether anything has been changed locally.
    pub fn is_pristine(&self) -> bool {
        self.stats.is_empty()
            && self.nodes.is_empty()
            && self.locations.is_empty()
            && self.node_stats.values().all(Overlay::is_empty)
            && self.portals.is_empty()
            && self.portal_stats.values().all(Overlay::is_empty)
    }

    pub fn set_stat(&mut self, key: &str, value: Value) -> WorldResult<()> {
        reject_null(&value, key)?;
        self.stats.put(key.to_string(), value);
        Ok(())
    }

    pub fn del_stat(&mut self, key: &str) {
        self.stats.mask(key.to_string());
    }

    pub fn add_place(&mut self, name: &str) {
        self.nodes.put(name.to_string(), ());
        self.locations.put(name.to_string(), None);
    }

    /// Add a thing, creating its location as a place if this facade lacks it.
    pub fn add_thing(&mut self, name: &str, location: &str, next_location: Option<&str>) -> WorldResult<()> {
        self.ensure_node(location)?;
        self.nodes.put(name.to_string(), ());
        self.locations.put(
            name.to_string(),
            Some(ThingLocation::new(location, next_location)),
        );
        Ok(())
    }

    pub fn set_location(&mut self, thing: &str, location: &str) -> WorldResult<()> {
        let mut loc = self.current_location(thing)?;
        self.ensure_node(location)?;
        loc.location = location.to_string();
        self.locations.put(thing.to_string(), Some(loc));
        Ok(())
    }

    pub fn set_next_location(&mut self, thing: &str, next_location: Option<&str>) -> WorldResult<()> {
        let mut loc = self.current_location(thing)?;
        loc.next_location = next_location.map(str::to_string);
        self.locations.put(thing.to_string(), Some(loc));
        Ok(())
    }

    pub fn del_node(&mut self, name: &str) -> WorldResult<()> {
        self.nodes.mask(name.to_string());
        self.locations.mask(name.to_string());
        self.node_stats.remove(name);
        Ok(())
    }

    pub fn set_node_stat(&mut self, node: &str, key: &str, value: Value) -> WorldResult<()> {
        if key == "name" {
            return Err(WorldError::type_mismatch(format!(
                "name of {node} cannot be changed"
            )));
        }
        reject_null(&value, key)?;
        self.require_node(node)?;
        self.node_stats
            .entry(node.to_string())
            .or_default()
            .put(key.to_string(), value);
        Ok(())
    }

    pub fn del_node_stat(&mut self, node: &str, key: &str) {
        self.node_stats
            .entry(node.to_string())
            .or_default()
            .mask(key.to_string());
    }

    pub fn add_portal(&mut self, origin: &str, destination: &str) -> WorldResult<()> {
        self.ensure_node(origin)?;
        self.ensure_node(destination)?;
        self.portals
            .put((origin.to_string(), destination.to_string()), ());
        Ok(())
    }

    pub fn del_portal(&mut self, origin: &str, destination: &str) -> WorldResult<()> {
        let edge = (origin.to_string(), destination.to_string());
        // a mirror's stats belong to the edge it mirrors
        if self.stat_edge(origin, destination)? == edge {
            self.portal_stats.remove(&edge);
        }
        self.portals.mask(edge);
        Ok(())
    }

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
        self.require_portal(origin, destination)?;
        let edge = self.stat_edge(origin, destination)?;
        self.portal_stats
            .entry(edge)
            .or_default()
            .put(key.to_string(), value);
        Ok(())
    }

    pub fn del_portal_stat(&mut self, origin: &str, destination: &str, key: &str) -> WorldResult<()> {
        let edge = self.stat_edge(origin, destination)?;
        self.portal_stats
            .entry(edge)
            .or_default()
            .mask(key.to_string());
        Ok(())
    }

    fn ensure_node(&mut self, node: &str) -> WorldResult<()> {
        if !self.has_node(node)? {
            self.add_place(node);
        }
        Ok(())
    }

    fn current_location(&self, thing: &str) -> WorldResult<ThingLocation> {
        self.thing_location(thing)?
            .ok_or_else(|| WorldError::not_found(format!("thing {thing} in {}", self.name())))
    }

    fn require_node(&self, node: &str) -> WorldResult<()> {
        if !self.has_node(node)? {
            return Err(WorldError::not_found(format!("node {node} in {}", self.name())));
        }
        Ok(())
    }

    fn require_portal(&self, origin: &str, destination: &str) -> WorldResult<()> {
        if !self.has_portal(origin, destination)? {
            return Err(WorldError::not_found(format!(
                "portal {origin}->{destination} in {}",
                self.name()
            )));
        }
        Ok(())
    }
}

impl CharacterView for Facade<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn stat(&self, key: &str) -> WorldResult<Value> {
        match self.stats.lookup(key) {
            Layer::Patched(value) => Ok(value.clone()),
            Layer::Masked => Err(WorldError::not_found(format!("stat {key} of {}", self.name()))),
            Layer::Inner => self.inner.stat(key),
        }
    }

    fn stat_keys(&self) -> WorldResult<Vec<String>> {
        Ok(self.stats.merge_keys(self.inner.stat_keys()?))
    }

    fn nodes(&self) -> WorldResult<Vec<String>> {
        Ok(self.nodes.merge_keys(self.inner.nodes()?))
    }

    fn has_node(&self, node: &str) -> WorldResult<bool> {
        match self.nodes.lookup(node) {
            Layer::Patched(_) => Ok(true),
            Layer::Masked => Ok(false),
            Layer::Inner => self.inner.has_node(node),
        }
    }

    fn thing_location(&self, node: &str) -> WorldResult<Option<ThingLocation>> {
        if !self.has_node(node)? {
            return Ok(None);
        }
        match self.locations.lookup(node) {
            Layer::Patched(loc) => Ok(loc.clone()),
            Layer::Masked => Ok(None),
            Layer::Inner => self.inner.thing_location(node),
        }
    }

    fn node_stat(&self, node: &str, key: &str) -> WorldResult<Value> {
        self.require_node(node)?;
        let layer = self
            .node_stats
            .get(node)
            .map_or(Layer::Inner, |stats| stats.lookup(key));
        match layer {
            Layer::Patched(value) => Ok(value.clone()),
            Layer::Masked => Err(WorldError::not_found(format!(
                "stat {key} of {node} in {}",
                self.name()
            ))),
            Layer::Inner => self.inner.node_stat(node, key),
        }
    }

    fn node_stat_keys(&self, node: &str) -> WorldResult<Vec<String>> {
        self.require_node(node)?;
        let inner = if self.inner.has_node(node)? {
            self.inner.node_stat_keys(node)?
        } else {
            Vec::new()
        };
        Ok(match self.node_stats.get(node) {
            Some(stats) => stats.merge_keys(inner),
            None => inner,
        })
    }

    fn portals(&self) -> WorldResult<Vec<(String, String)>> {
        let mut portals = Vec::new();
        for (origin, destination) in self.portals.merge_keys(self.inner.portals()?) {
            if self.has_node(&origin)? && self.has_node(&destination)? {
                portals.push((origin, destination));
            }
        }
        Ok(portals)
    }

    fn has_portal(&self, origin: &str, destination: &str) -> WorldResult<bool> {
        if !self.has_node(origin)? || !self.has_node(destination)? {
            return Ok(false);
        }
        match self
            .portals
            .lookup(&(origin.to_string(), destination.to_string()))
        {
            Layer::Patched(_) => Ok(true),
            Layer::Masked => Ok(false),
            Layer::Inner => self.inner.has_portal(origin, destination),
        }
    }

    fn stat_edge(&self, origin: &str, destination: &str) -> WorldResult<(String, String)> {
        self.inner.stat_edge(origin, destination)
    }

    fn portal_stat(&self, origin: &str, destination: &str, key: &str) -> WorldResult<Value> {
        self.require_portal(origin, destination)?;
        let layer = self
            .portal_stats
            .get(&self.stat_edge(origin, destination)?)
            .map_or(Layer::Inner, |stats| stats.lookup(key));
        match layer {
            Layer::Patched(value) => Ok(value.clone()),
            Layer::Masked => Err(WorldError::not_found(format!(
                "stat {key} of portal {origin}->{destination} in {}",
                self.name()
            ))),
            Layer::Inner => self.inner.portal_stat(origin, destination, key),
        }
    }

    fn portal_stat_keys(&self, origin: &str, destination: &str) -> WorldResult<Vec<String>> {
        self.require_portal(origin, destination)?;
        let inner = if self.inner.has_portal(origin, destination)? {
            self.inner.portal_stat_keys(origin, destination)?
        } else {
            Vec::new()
        };
        Ok(match self.portal_stats.get(&self.stat_edge(origin, destination)?) {
            Some(stats) => stats.merge_keys(inner),
            None => inner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::keys::RulebookOverrides;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        let mut physical = engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap();
        physical.add_places_from(["A", "B"]).unwrap();
        physical.add_portal("A", "B", false).unwrap();
        physical.add_thing("t", "A", None).unwrap();
        physical.set_node_stat("t", "hp", json!(10)).unwrap();
        physical.set_stat("weather", json!("rain")).unwrap();
        engine
    }

    #[test]
    fn test_writes_stay_in_the_facade() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        facade.set_node_stat("t", "hp", json!(1)).unwrap();
        facade.set_stat("weather", json!("sun")).unwrap();
        facade.set_location("t", "B").unwrap();

        assert_eq!(facade.node_stat("t", "hp").unwrap(), json!(1));
        assert_eq!(facade.location("t").unwrap(), "B");

        let physical = engine.character("physical").unwrap();
        assert_eq!(physical.node_stat("t", "hp").unwrap(), json!(10));
        assert_eq!(physical.stat("weather").unwrap(), json!("rain"));
        assert_eq!(physical.location("t").unwrap(), "A");
    }

    #[test]
    fn test_delete_hides_patched_and_inner_values() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        facade.set_node_stat("t", "hp", json!(1)).unwrap();
        facade.del_node_stat("t", "hp");

        assert!(matches!(facade.node_stat("t", "hp"), Err(WorldError::NotFound(_))));
        assert!(facade.node_stat_keys("t").unwrap().is_empty());
        assert_eq!(
            engine.character("physical").unwrap().node_stat("t", "hp").unwrap(),
            json!(10)
        );
    }

    #[test]
    fn test_deleted_node_takes_its_portals() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        facade.del_node("B").unwrap();

        assert_eq!(facade.nodes().unwrap(), vec!["A", "t"]);
        assert!(facade.portals().unwrap().is_empty());
        assert!(!facade.has_portal("A", "B").unwrap());
        assert!(engine.character("physical").unwrap().has_node("B").unwrap());
    }

    #[test]
    fn test_facade_of_facade_only_changes_itself() {
        let engine = engine();
        let mut lower = engine.facade("physical").unwrap();
        lower.set_node_stat("t", "hp", json!(5)).unwrap();

        {
            let mut upper = lower.facade();
            assert_eq!(upper.node_stat("t", "hp").unwrap(), json!(5));
            upper.set_node_stat("t", "hp", json!(2)).unwrap();
            upper.add_place("C");
            upper.add_portal("B", "C").unwrap();

            assert_eq!(upper.node_stat("t", "hp").unwrap(), json!(2));
            assert!(upper.has_portal("B", "C").unwrap());
        }

        assert_eq!(lower.node_stat("t", "hp").unwrap(), json!(5));
        assert!(!lower.has_node("C").unwrap());
    }

    #[test]
    fn test_reclassify_in_facade() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        facade.add_place("t");
        facade.add_thing("A", "B", None).unwrap();

        assert!(facade.has_place("t").unwrap());
        assert!(facade.has_thing("A").unwrap());
        assert_eq!(facade.things().unwrap(), vec!["A"]);
        assert_eq!(engine.character("physical").unwrap().things().unwrap(), vec!["t"]);
    }

    #[test]
    fn test_fixed_keys_are_type_mismatch() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        assert!(matches!(
            facade.set_node_stat("t", "name", json!("u")),
            Err(WorldError::TypeMismatch(_))
        ));
        assert!(matches!(
            facade.set_portal_stat("A", "B", "destination", json!("t")),
            Err(WorldError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_mirror_portal_shares_stats_in_facade() {
        let mut engine = engine();
        engine
            .character_mut("physical")
            .unwrap()
            .add_portal("B", "t", true)
            .unwrap();
        let mut facade = engine.facade("physical").unwrap();

        facade.set_portal_stat("t", "B", "length", json!(4)).unwrap();
        assert_eq!(facade.portal_stat("B", "t", "length").unwrap(), json!(4));
        assert_eq!(facade.portal_stat_keys("B", "t").unwrap(), vec!["length"]);

        facade.del_portal_stat("B", "t", "length").unwrap();
        assert!(matches!(
            facade.portal_stat("t", "B", "length"),
            Err(WorldError::NotFound(_))
        ));

        facade.set_portal_stat("B", "t", "length", json!(2)).unwrap();
        facade.del_portal("t", "B").unwrap();
        assert_eq!(facade.portal_stat("B", "t", "length").unwrap(), json!(2));
        assert!(engine
            .character("physical")
            .unwrap()
            .portal_stat_keys("B", "t")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_new_facade_is_pristine() {
        let engine = engine();
        let mut facade = engine.facade("physical").unwrap();
        assert!(facade.is_pristine());
        facade.del_stat("weather");
        assert!(!facade.is_pristine());
        assert!(matches!(facade.stat("weather"), Err(WorldError::NotFound(_))));
    }
}
