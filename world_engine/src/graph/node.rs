//! Places and things.
//!
//! A node is a thing while a location record for it is live in the things
//! index, and a place otherwise. Switching between the two only touches that
//! index, never the node's existence record, stats, or portals.

use serde_json::Value;
use tracing::debug;

use super::{reject_null, CharacterMut, CharacterView};
use crate::error::{WorldError, WorldResult};
use crate::keys::{Stats, ThingLocation, WorldEntity};

impl CharacterMut<'_> {
    pub fn add_place(&mut self, name: &str) -> WorldResult<()> {
        self.add_place_with(name, Stats::new())
    }

    pub fn add_place_with(&mut self, name: &str, stats: Stats) -> WorldResult<()> {
        self.write_node(name, true)?;
        for (key, value) in stats {
            self.set_node_stat(name, &key, value)?;
        }
        Ok(())
    }

    pub fn add_places_from<I, S>(&mut self, names: I) -> WorldResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add_place(name.as_ref())?;
        }
        Ok(())
    }

    /// Create a thing at `location`, which must already exist.
    pub fn add_thing(
        &mut self,
        name: &str,
        location: &str,
        next_location: Option<&str>,
    ) -> WorldResult<()> {
        self.add_thing_with(name, location, next_location, Stats::new())
    }

    pub fn add_thing_with(
        &mut self,
        name: &str,
        location: &str,
        next_location: Option<&str>,
        stats: Stats,
    ) -> WorldResult<()> {
        self.check_destinations(location, next_location)?;
        self.write_node(name, true)?;
        self.write_location(name, &ThingLocation::new(location, next_location))?;
        for (key, value) in stats {
            self.set_node_stat(name, &key, value)?;
        }
        Ok(())
    }

    /// Create things from `(name, location)` pairs.
    pub fn add_things_from<I, N, L>(&mut self, things: I) -> WorldResult<()>
    where
        I: IntoIterator<Item = (N, L)>,
        N: AsRef<str>,
        L: AsRef<str>,
    {
        for (name, location) in things {
            self.add_thing(name.as_ref(), location.as_ref(), None)?;
        }
        Ok(())
    }

    /// Make `name` a thing described entirely by `attrs`.
    ///
    /// `attrs` must hold a string `location`; `next_location` is optional.
    /// Every other entry becomes a stat, and stats not mentioned are deleted.
    pub fn assign_thing(&mut self, name: &str, mut attrs: Stats) -> WorldResult<()> {
        let location = match attrs.remove("location") {
            Some(Value::String(location)) => location,
            Some(other) => {
                return Err(WorldError::type_mismatch(format!(
                    "location of {name} must be a node name, not {other}"
                )))
            }
            None => {
                return Err(WorldError::type_mismatch(format!(
                    "thing {name} needs a location"
                )))
            }
        };
        let next_location = match attrs.remove("next_location") {
            None | Some(Value::Null) => None,
            Some(Value::String(next)) => Some(next),
            Some(other) => {
                return Err(WorldError::type_mismatch(format!(
                    "next_location of {name} must be a node name, not {other}"
                )))
            }
        };
        let stale: Vec<String> = if self.view().has_node(name)? {
            self.view()
                .node_stat_keys(name)?
                .into_iter()
                .filter(|key| !attrs.contains_key(key))
                .collect()
        } else {
            Vec::new()
        };
        self.add_thing_with(name, &location, next_location.as_deref(), attrs)?;
        for key in stale {
            self.del_node_stat(name, &key)?;
        }
        Ok(())
    }

    /// Turn an existing node into a thing at `location`.
    pub fn place_to_thing(
        &mut self,
        name: &str,
        location: &str,
        next_location: Option<&str>,
    ) -> WorldResult<()> {
        self.view().require_node(name)?;
        self.check_destinations(location, next_location)?;
        self.write_location(name, &ThingLocation::new(location, next_location))?;
        debug!(character = %self.name, node = name, location, "node became a thing");
        Ok(())
    }

    /// Turn a thing back into a place. The node and its portals are untouched.
    pub fn thing_to_place(&mut self, name: &str) -> WorldResult<()> {
        self.current_location(name)?;
        self.engine
            .write(WorldEntity::Things(self.name.clone()), name, Value::Null)?;
        debug!(character = %self.name, node = name, "thing became a place");
        Ok(())
    }

    /// Move a thing. Where it was headed is kept.
    pub fn set_location(&mut self, thing: &str, location: &str) -> WorldResult<()> {
        let mut loc = self.current_location(thing)?;
        self.view().require_node(location)?;
        loc.location = location.to_string();
        self.write_location(thing, &loc)
    }

    pub fn set_next_location(&mut self, thing: &str, next_location: Option<&str>) -> WorldResult<()> {
        let mut loc = self.current_location(thing)?;
        if let Some(next) = next_location {
            self.view().require_node(next)?;
        }
        loc.next_location = next_location.map(str::to_string);
        self.write_location(thing, &loc)
    }

    pub fn set_node_stat(&mut self, node: &str, key: &str, value: Value) -> WorldResult<()> {
        if key == "name" {
            return Err(WorldError::type_mismatch(format!(
                "name of {node} cannot be changed"
            )));
        }
        reject_null(&value, key)?;
        self.view().require_node(node)?;
        let entity = self.view().node_stats_entity(node);
        self.engine.write(entity, key, value)
    }

    pub fn del_node_stat(&mut self, node: &str, key: &str) -> WorldResult<()> {
        self.view().node_stat(node, key)?;
        let entity = self.view().node_stats_entity(node);
        self.engine.write(entity, key, Value::Null)
    }

    /// Delete a node together with its thing record and every portal touching it.
    pub fn del_node(&mut self, name: &str) -> WorldResult<()> {
        let (outgoing, incoming, is_thing) = {
            let view = self.view();
            view.require_node(name)?;
            (
                view.successors(name)?,
                view.predecessors(name)?,
                view.thing_location(name)?.is_some(),
            )
        };
        for destination in outgoing {
            self.tombstone_portal(name, &destination)?;
        }
        for origin in incoming {
            self.tombstone_portal(&origin, name)?;
        }
        if is_thing {
            self.engine
                .write(WorldEntity::Things(self.name.clone()), name, Value::Null)?;
        }
        self.write_node(name, false)?;
        debug!(character = %self.name, node = name, "deleted node");
        Ok(())
    }

    pub(super) fn write_node(&mut self, name: &str, exists: bool) -> WorldResult<()> {
        self.engine
            .write(WorldEntity::Nodes(self.name.clone()), name, Value::Bool(exists))
    }

    fn write_location(&mut self, name: &str, loc: &ThingLocation) -> WorldResult<()> {
        let value = loc.to_value()?;
        self.engine
            .write(WorldEntity::Things(self.name.clone()), name, value)
    }

    fn current_location(&self, thing: &str) -> WorldResult<ThingLocation> {
        self.view()
            .thing_location(thing)?
            .ok_or_else(|| WorldError::not_found(format!("thing {thing} in {}", self.name)))
    }

    fn check_destinations(&self, location: &str, next_location: Option<&str>) -> WorldResult<()> {
        let view = self.view();
        view.require_node(location)?;
        if let Some(next) = next_location {
            view.require_node(next)?;
        }
        Ok(())
    }
}
