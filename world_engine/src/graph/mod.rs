//! Character graphs.
//!
//! A [`Character`] is a read view of one named graph at the engine's current
//! time; a [`CharacterMut`] writes to it at that time. Neither holds any state
//! of its own beyond the name, so they are cheap to make on every access.

mod avatar;
mod cull;
mod node;
mod portal;
mod sense;
mod view;

pub use cull::Comparator;
pub use portal::Portal;
pub use view::{CharacterView, Container, NodeKind};

use serde_json::Value;

use crate::engine::Engine;
use crate::error::{WorldError, WorldResult};
use crate::facade::Facade;
use crate::keys::{BookType, ThingLocation, WorldEntity};
use crate::rule::{RuleFollower, RuleFollowerMut};

#[derive(Clone)]
pub struct Character<'e> {
    engine: &'e Engine,
    name: String,
}

impl<'e> Character<'e> {
    pub(crate) fn new(engine: &'e Engine, name: &str) -> Self {
        Self {
            engine,
            name: name.to_string(),
        }
    }

    pub fn engine(&self) -> &'e Engine {
        self.engine
    }

    /// The rule-following capability of one of this character's collections.
    pub fn follower(&self, book: BookType) -> RuleFollower<'e> {
        RuleFollower::new(self.engine, self.name.clone(), book)
    }

    /// A copy-on-write view of this character.
    pub fn facade(&self) -> Facade<'e> {
        Facade::new(self.clone())
    }

    fn nodes_entity(&self) -> WorldEntity {
        WorldEntity::Nodes(self.name.clone())
    }

    fn things_entity(&self) -> WorldEntity {
        WorldEntity::Things(self.name.clone())
    }

    fn node_stats_entity(&self, node: &str) -> WorldEntity {
        WorldEntity::NodeStats {
            character: self.name.clone(),
            node: node.to_string(),
        }
    }

    fn successors_entity(&self, origin: &str) -> WorldEntity {
        WorldEntity::Successors {
            character: self.name.clone(),
            origin: origin.to_string(),
        }
    }

    fn predecessors_entity(&self, destination: &str) -> WorldEntity {
        WorldEntity::Predecessors {
            character: self.name.clone(),
            destination: destination.to_string(),
        }
    }

    fn mirrors_entity(&self, origin: &str) -> WorldEntity {
        WorldEntity::PortalMirrors {
            character: self.name.clone(),
            origin: origin.to_string(),
        }
    }

    fn portal_stats_entity(&self, origin: &str, destination: &str) -> WorldEntity {
        WorldEntity::PortalStats {
            character: self.name.clone(),
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }

    fn require_node(&self, node: &str) -> WorldResult<()> {
        if !self.has_node(node)? {
            return Err(WorldError::not_found(format!("node {node} in {}", self.name)));
        }
        Ok(())
    }

    fn require_portal(&self, origin: &str, destination: &str) -> WorldResult<()> {
        if !self.has_portal(origin, destination)? {
            return Err(WorldError::not_found(format!(
                "portal {origin}->{destination} in {}",
                self.name
            )));
        }
        Ok(())
    }
}

impl CharacterView for Character<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self, key: &str) -> WorldResult<Value> {
        self.engine
            .read_stat(&WorldEntity::GraphStats(self.name.clone()), key)?
            .ok_or_else(|| WorldError::not_found(format!("stat {key} of {}", self.name)))
    }

    fn stat_keys(&self) -> WorldResult<Vec<String>> {
        self.engine
            .stat_keys(&WorldEntity::GraphStats(self.name.clone()))
    }

    fn nodes(&self) -> WorldResult<Vec<String>> {
        self.engine.live_keys(&self.nodes_entity())
    }

    fn has_node(&self, node: &str) -> WorldResult<bool> {
        self.engine.read_live(&self.nodes_entity(), node)
    }

    fn thing_location(&self, node: &str) -> WorldResult<Option<ThingLocation>> {
        if !self.has_node(node)? {
            return Ok(None);
        }
        self.engine
            .read_stat(&self.things_entity(), node)?
            .map(ThingLocation::from_value)
            .transpose()
    }

    fn node_stat(&self, node: &str, key: &str) -> WorldResult<Value> {
        self.require_node(node)?;
        self.engine
            .read_stat(&self.node_stats_entity(node), key)?
            .ok_or_else(|| WorldError::not_found(format!("stat {key} of {node} in {}", self.name)))
    }

    fn node_stat_keys(&self, node: &str) -> WorldResult<Vec<String>> {
        self.require_node(node)?;
        self.engine.stat_keys(&self.node_stats_entity(node))
    }

    fn portals(&self) -> WorldResult<Vec<(String, String)>> {
        let mut portals = Vec::new();
        for origin in self.nodes()? {
            for destination in self.successors(&origin)? {
                portals.push((origin.clone(), destination));
            }
        }
        Ok(portals)
    }

    fn has_portal(&self, origin: &str, destination: &str) -> WorldResult<bool> {
        self.engine
            .read_live(&self.successors_entity(origin), destination)
    }

    fn portal_stat(&self, origin: &str, destination: &str, key: &str) -> WorldResult<Value> {
        self.require_portal(origin, destination)?;
        let (o, d) = self.stat_target(origin, destination)?;
        self.engine
            .read_stat(&self.portal_stats_entity(&o, &d), key)?
            .ok_or_else(|| {
                WorldError::not_found(format!(
                    "stat {key} of portal {origin}->{destination} in {}",
                    self.name
                ))
            })
    }

    fn portal_stat_keys(&self, origin: &str, destination: &str) -> WorldResult<Vec<String>> {
        self.require_portal(origin, destination)?;
        let (o, d) = self.stat_target(origin, destination)?;
        self.engine.stat_keys(&self.portal_stats_entity(&o, &d))
    }

    fn stat_edge(&self, origin: &str, destination: &str) -> WorldResult<(String, String)> {
        self.stat_target(origin, destination)
    }

    fn things(&self) -> WorldResult<Vec<String>> {
        let mut things = Vec::new();
        for node in self.engine.live_keys(&self.things_entity())? {
            if self.has_node(&node)? {
                things.push(node);
            }
        }
        Ok(things)
    }

    fn successors(&self, origin: &str) -> WorldResult<Vec<String>> {
        self.engine.live_keys(&self.successors_entity(origin))
    }

    fn predecessors(&self, destination: &str) -> WorldResult<Vec<String>> {
        self.engine
            .live_keys(&self.predecessors_entity(destination))
    }
}

/// Writes to one character at the engine's current time.
pub struct CharacterMut<'e> {
    engine: &'e mut Engine,
    name: String,
}

impl<'e> CharacterMut<'e> {
    pub(crate) fn new(engine: &'e mut Engine, name: &str) -> Self {
        Self {
            engine,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> Character<'_> {
        Character::new(self.engine, &self.name)
    }

    pub fn follower_mut(&mut self, book: BookType) -> RuleFollowerMut<'_> {
        RuleFollowerMut::new(self.engine, self.name.clone(), book)
    }

    /// Set a graph stat. `null` is reserved for deletion.
    pub fn set_stat(&mut self, key: &str, value: Value) -> WorldResult<()> {
        reject_null(&value, key)?;
        self.engine
            .write(WorldEntity::GraphStats(self.name.clone()), key, value)
    }

    pub fn del_stat(&mut self, key: &str) -> WorldResult<()> {
        self.view().stat(key)?;
        self.engine
            .write(WorldEntity::GraphStats(self.name.clone()), key, Value::Null)
    }
}

pub(crate) fn reject_null(value: &Value, key: &str) -> WorldResult<()> {
    if value.is_null() {
        return Err(WorldError::type_mismatch(format!(
            "null is not a value for {key}; delete the stat instead"
        )));
    }
    Ok(())
}
