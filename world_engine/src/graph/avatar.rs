//! Avatars: nodes in some graph that stand in for a character.
//!
//! Membership is recorded per `(graph, node)` independently of the node's
//! existence, so the listing checks both: a node deleted from its graph is no
//! longer an avatar even while its membership record still says it is.

use serde_json::Value;
use tracing::debug;

use super::{Character, CharacterMut};
use crate::error::{WorldError, WorldResult};
use crate::keys::{Subject, WorldEntity};

impl<'e> Character<'e> {
    /// Every live `(graph, node)` avatar of this character.
    pub fn avatars(&self) -> WorldResult<Vec<(String, String)>> {
        let mut avatars = Vec::new();
        for graph in self.engine.live_keys(&self.avatar_graphs_entity())? {
            for node in self.avatars_in(&graph)? {
                avatars.push((graph.clone(), node));
            }
        }
        Ok(avatars)
    }

    /// Graphs this character has at least one live avatar in.
    pub fn avatar_graphs(&self) -> WorldResult<Vec<String>> {
        let mut graphs = Vec::new();
        for graph in self.engine.live_keys(&self.avatar_graphs_entity())? {
            if !self.avatars_in(&graph)?.is_empty() {
                graphs.push(graph);
            }
        }
        Ok(graphs)
    }

    /// Live avatars in one graph.
    pub fn avatars_in(&self, graph: &str) -> WorldResult<Vec<String>> {
        if !self.engine.has_character(graph)? {
            return Ok(Vec::new());
        }
        let nodes = WorldEntity::Nodes(graph.to_string());
        let mut avatars = Vec::new();
        for node in self.engine.live_keys(&self.avatars_entity(graph))? {
            if self.engine.read_live(&nodes, &node)? {
                avatars.push(node);
            }
        }
        Ok(avatars)
    }

    /// Whether the membership record for `(graph, node)` is true right now,
    /// whether or not the node still exists.
    pub fn is_avatar(&self, graph: &str, node: &str) -> WorldResult<bool> {
        self.engine.read_live(&self.avatars_entity(graph), node)
    }

    /// The one live avatar, if this character has exactly one.
    pub fn sole_avatar(&self) -> WorldResult<(String, String)> {
        let mut avatars = self.avatars()?;
        match avatars.len() {
            1 => Ok(avatars.remove(0)),
            0 => Err(WorldError::not_found(format!("avatar of {}", self.name))),
            n => Err(WorldError::conflict(format!(
                "{} has {n} avatars, not one",
                self.name
            ))),
        }
    }

    fn avatar_graphs_entity(&self) -> WorldEntity {
        WorldEntity::AvatarGraphs(self.name.clone())
    }

    fn avatars_entity(&self, graph: &str) -> WorldEntity {
        WorldEntity::Avatars {
            character: self.name.clone(),
            graph: graph.to_string(),
        }
    }
}

impl CharacterMut<'_> {
    /// Make `node` in `graph` an avatar of this character, creating the node
    /// as a place if it does not exist.
    pub fn add_avatar(&mut self, graph: &str, node: &str) -> WorldResult<()> {
        if !self.engine.has_character(graph)? {
            return Err(WorldError::not_found(format!("character {graph}")));
        }
        let nodes = WorldEntity::Nodes(graph.to_string());
        if !self.engine.read_live(&nodes, node)? {
            self.engine.write(nodes, node, Value::Bool(true))?;
        }
        let (graphs, avatars) = {
            let view = self.view();
            (view.avatar_graphs_entity(), view.avatars_entity(graph))
        };
        self.engine.write(graphs, graph, Value::Bool(true))?;
        self.engine.write(avatars, node, Value::Bool(true))?;
        debug!(character = %self.name, graph, node, "added avatar");
        Ok(())
    }

    /// Like [`add_avatar`](Self::add_avatar), for a node given as a rule subject.
    pub fn add_avatar_subject(&mut self, subject: &Subject) -> WorldResult<()> {
        match subject.as_node() {
            Some((graph, node)) => {
                let (graph, node) = (graph.to_string(), node.to_string());
                self.add_avatar(&graph, &node)
            }
            None => Err(WorldError::type_mismatch(format!(
                "{subject} is neither a place nor a thing"
            ))),
        }
    }

    /// Record that `node` in `graph` is no longer an avatar. The node stays.
    pub fn del_avatar(&mut self, graph: &str, node: &str) -> WorldResult<()> {
        let avatars = self.view().avatars_entity(graph);
        self.engine.write(avatars, node, Value::Bool(false))?;
        debug!(character = %self.name, graph, node, "removed avatar");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::error::WorldError;
    use crate::graph::CharacterView;
    use crate::keys::{RulebookOverrides, Subject};

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap()
            .add_place("den")
            .unwrap();
        engine.new_character("ai1", RulebookOverrides::new()).unwrap();
        engine
    }

    #[test]
    fn test_add_avatar_creates_node() {
        let mut engine = engine();
        engine
            .character_mut("ai1")
            .unwrap()
            .add_avatar("physical", "kobold")
            .unwrap();

        assert!(engine.character("physical").unwrap().has_node("kobold").unwrap());
        let ai1 = engine.character("ai1").unwrap();
        assert_eq!(ai1.avatars().unwrap(), vec![("physical".to_string(), "kobold".to_string())]);
        assert_eq!(ai1.sole_avatar().unwrap().1, "kobold");
    }

    #[test]
    fn test_avatar_graph_must_exist() {
        let mut engine = engine();
        let result = engine
            .character_mut("ai1")
            .unwrap()
            .add_avatar("astral", "kobold");
        assert!(matches!(result, Err(WorldError::NotFound(_))));
    }

    #[test]
    fn test_del_avatar_keeps_node() {
        let mut engine = engine();
        let mut ai1 = engine.character_mut("ai1").unwrap();
        ai1.add_avatar("physical", "den").unwrap();
        ai1.del_avatar("physical", "den").unwrap();

        assert!(ai1.view().avatars().unwrap().is_empty());
        assert!(ai1.view().avatar_graphs().unwrap().is_empty());
        assert!(engine.character("physical").unwrap().has_node("den").unwrap());
    }

    #[test]
    fn test_avatar_subject_kinds() {
        let mut engine = engine();
        let mut ai1 = engine.character_mut("ai1").unwrap();
        ai1.add_avatar_subject(&Subject::place("physical", "den")).unwrap();
        assert!(ai1.view().is_avatar("physical", "den").unwrap());

        assert!(matches!(
            ai1.add_avatar_subject(&Subject::character("physical")),
            Err(WorldError::TypeMismatch(_))
        ));
        assert!(matches!(
            ai1.add_avatar_subject(&Subject::portal("physical", "den", "den")),
            Err(WorldError::TypeMismatch(_))
        ));
    }
}
