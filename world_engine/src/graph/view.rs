//! Read access shared by live characters and facades.

use serde_json::Value;

use crate::error::{WorldError, WorldResult};
use crate::keys::{Stats, ThingLocation};

/// What a node is at the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Place,
    Thing,
}

/// What a thing is in: its location, or the portal it is travelling along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Node(String),
    Portal { origin: String, destination: String },
}

/// A character graph as seen at one moment.
///
/// Classification is a query: a node is a thing exactly when
/// [`thing_location`](CharacterView::thing_location) finds a record for it.
pub trait CharacterView {
    fn name(&self) -> &str;

    fn stat(&self, key: &str) -> WorldResult<Value>;
    fn stat_keys(&self) -> WorldResult<Vec<String>>;

    fn nodes(&self) -> WorldResult<Vec<String>>;
    fn has_node(&self, node: &str) -> WorldResult<bool>;
    /// `None` for places and for nodes that do not exist.
    fn thing_location(&self, node: &str) -> WorldResult<Option<ThingLocation>>;
    fn node_stat(&self, node: &str, key: &str) -> WorldResult<Value>;
    fn node_stat_keys(&self, node: &str) -> WorldResult<Vec<String>>;

    fn portals(&self) -> WorldResult<Vec<(String, String)>>;
    fn has_portal(&self, origin: &str, destination: &str) -> WorldResult<bool>;
    fn portal_stat(&self, origin: &str, destination: &str, key: &str) -> WorldResult<Value>;
    fn portal_stat_keys(&self, origin: &str, destination: &str) -> WorldResult<Vec<String>>;

    /// The edge whose stats `origin -> destination` reads and writes. A
    /// mirror portal shares the stats of the edge it mirrors.
    fn stat_edge(&self, origin: &str, destination: &str) -> WorldResult<(String, String)> {
        Ok((origin.to_string(), destination.to_string()))
    }

    fn node_kind(&self, node: &str) -> WorldResult<Option<NodeKind>> {
        if !self.has_node(node)? {
            return Ok(None);
        }
        Ok(Some(match self.thing_location(node)? {
            Some(_) => NodeKind::Thing,
            None => NodeKind::Place,
        }))
    }

    fn things(&self) -> WorldResult<Vec<String>> {
        let mut things = Vec::new();
        for node in self.nodes()? {
            if self.thing_location(&node)?.is_some() {
                things.push(node);
            }
        }
        Ok(things)
    }

    fn places(&self) -> WorldResult<Vec<String>> {
        let mut places = Vec::new();
        for node in self.nodes()? {
            if self.thing_location(&node)?.is_none() {
                places.push(node);
            }
        }
        Ok(places)
    }

    fn has_thing(&self, node: &str) -> WorldResult<bool> {
        Ok(self.node_kind(node)? == Some(NodeKind::Thing))
    }

    fn has_place(&self, node: &str) -> WorldResult<bool> {
        Ok(self.node_kind(node)? == Some(NodeKind::Place))
    }

    fn location(&self, thing: &str) -> WorldResult<String> {
        self.thing_location(thing)?
            .map(|loc| loc.location)
            .ok_or_else(|| WorldError::not_found(format!("thing {thing} in {}", self.name())))
    }

    fn next_location(&self, thing: &str) -> WorldResult<Option<String>> {
        self.thing_location(thing)?
            .map(|loc| loc.next_location)
            .ok_or_else(|| WorldError::not_found(format!("thing {thing} in {}", self.name())))
    }

    fn node_stats(&self, node: &str) -> WorldResult<Stats> {
        let mut stats = Stats::new();
        for key in self.node_stat_keys(node)? {
            let value = self.node_stat(node, &key)?;
            stats.insert(key, value);
        }
        Ok(stats)
    }

    fn stats(&self) -> WorldResult<Stats> {
        let mut stats = Stats::new();
        for key in self.stat_keys()? {
            let value = self.stat(&key)?;
            stats.insert(key, value);
        }
        Ok(stats)
    }

    fn successors(&self, origin: &str) -> WorldResult<Vec<String>> {
        Ok(self
            .portals()?
            .into_iter()
            .filter(|(o, _)| o == origin)
            .map(|(_, d)| d)
            .collect())
    }

    fn predecessors(&self, destination: &str) -> WorldResult<Vec<String>> {
        Ok(self
            .portals()?
            .into_iter()
            .filter(|(_, d)| d == destination)
            .map(|(o, _)| o)
            .collect())
    }

    /// Things located at `node`.
    fn contents(&self, node: &str) -> WorldResult<Vec<String>> {
        let mut contents = Vec::new();
        for thing in self.things()? {
            if self.location(&thing)? == node {
                contents.push(thing);
            }
        }
        Ok(contents)
    }

    /// The portal a thing is travelling along, or else its location.
    fn container(&self, thing: &str) -> WorldResult<Container> {
        let loc = self
            .thing_location(thing)?
            .ok_or_else(|| WorldError::not_found(format!("thing {thing} in {}", self.name())))?;
        if let Some(next) = loc.next_location {
            if self.has_portal(&loc.location, &next)? {
                return Ok(Container::Portal {
                    origin: loc.location,
                    destination: next,
                });
            }
        }
        Ok(Container::Node(loc.location))
    }
}

impl<T: CharacterView + ?Sized> CharacterView for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn stat(&self, key: &str) -> WorldResult<Value> {
        (**self).stat(key)
    }

    fn stat_keys(&self) -> WorldResult<Vec<String>> {
        (**self).stat_keys()
    }

    fn nodes(&self) -> WorldResult<Vec<String>> {
        (**self).nodes()
    }

    fn has_node(&self, node: &str) -> WorldResult<bool> {
        (**self).has_node(node)
    }

    fn thing_location(&self, node: &str) -> WorldResult<Option<ThingLocation>> {
        (**self).thing_location(node)
    }

    fn node_stat(&self, node: &str, key: &str) -> WorldResult<Value> {
        (**self).node_stat(node, key)
    }

    fn node_stat_keys(&self, node: &str) -> WorldResult<Vec<String>> {
        (**self).node_stat_keys(node)
    }

    fn portals(&self) -> WorldResult<Vec<(String, String)>> {
        (**self).portals()
    }

    fn has_portal(&self, origin: &str, destination: &str) -> WorldResult<bool> {
        (**self).has_portal(origin, destination)
    }

    fn portal_stat(&self, origin: &str, destination: &str, key: &str) -> WorldResult<Value> {
        (**self).portal_stat(origin, destination, key)
    }

    fn portal_stat_keys(&self, origin: &str, destination: &str) -> WorldResult<Vec<String>> {
        (**self).portal_stat_keys(origin, destination)
    }

    fn stat_edge(&self, origin: &str, destination: &str) -> WorldResult<(String, String)> {
        (**self).stat_edge(origin, destination)
    }

    fn things(&self) -> WorldResult<Vec<String>> {
        (**self).things()
    }

    fn successors(&self, origin: &str) -> WorldResult<Vec<String>> {
        (**self).successors(origin)
    }

    fn predecessors(&self, destination: &str) -> WorldResult<Vec<String>> {
        (**self).predecessors(destination)
    }
}
