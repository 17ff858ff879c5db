//! The rule-following capability shared by every entity collection of a
//! character.
//!
//! A character holds one versioned rulebook binding per [`BookType`]. The
//! follower resolves that binding at the current time, exposes the bound
//! rulebook's activations, and lists the subjects the rules apply to.

use serde_json::Value;
use tracing::debug;

use super::{RuleMapping, RuleMappingMut};
use crate::engine::Engine;
use crate::error::{WorldError, WorldResult};
use crate::graph::CharacterView;
use crate::keys::{BookType, Subject, WorldEntity};

#[derive(Clone)]
pub struct RuleFollower<'e> {
    engine: &'e Engine,
    character: String,
    book: BookType,
}

impl<'e> RuleFollower<'e> {
    pub(crate) fn new(engine: &'e Engine, character: impl Into<String>, book: BookType) -> Self {
        Self {
            engine,
            character: character.into(),
            book,
        }
    }

    pub fn book(&self) -> BookType {
        self.book
    }

    pub fn character(&self) -> &str {
        &self.character
    }

    /// Name of the rulebook bound right now.
    pub fn rulebook(&self) -> WorldResult<String> {
        read_binding(self.engine, &self.character, self.book)
    }

    pub fn rules(&self) -> WorldResult<RuleMapping<'e>> {
        Ok(RuleMapping::new(self.engine, self.rulebook()?))
    }

    pub fn active_rules(&self) -> WorldResult<Vec<String>> {
        self.rules()?.names()
    }

    pub fn follows(&self, rule: &str) -> WorldResult<bool> {
        self.rules()?.contains(rule)
    }

    /// The entities the bound rules are evaluated against this turn.
    pub fn subjects(&self) -> WorldResult<Vec<Subject>> {
        let character = self.engine.character(&self.character)?;
        let name = self.character.as_str();
        let subjects = match self.book {
            BookType::Character => vec![Subject::character(name)],
            BookType::Avatar => character
                .avatars()?
                .into_iter()
                .map(|(graph, node)| Subject::Avatar {
                    character: name.to_string(),
                    graph,
                    node,
                })
                .collect(),
            BookType::Thing => character
                .things()?
                .into_iter()
                .map(|node| Subject::thing(name, node))
                .collect(),
            BookType::Place => character
                .places()?
                .into_iter()
                .map(|node| Subject::place(name, node))
                .collect(),
            BookType::Node => character
                .nodes()?
                .into_iter()
                .map(|node| Subject::Node {
                    character: name.to_string(),
                    node,
                })
                .collect(),
            BookType::Portal => character
                .portals()?
                .into_iter()
                .map(|(origin, destination)| Subject::portal(name, origin, destination))
                .collect(),
        };
        Ok(subjects)
    }
}

pub struct RuleFollowerMut<'e> {
    engine: &'e mut Engine,
    character: String,
    book: BookType,
}

impl<'e> RuleFollowerMut<'e> {
    pub(crate) fn new(engine: &'e mut Engine, character: impl Into<String>, book: BookType) -> Self {
        Self {
            engine,
            character: character.into(),
            book,
        }
    }

    pub fn view(&self) -> RuleFollower<'_> {
        RuleFollower::new(self.engine, self.character.clone(), self.book)
    }

    pub fn rulebook(&self) -> WorldResult<String> {
        read_binding(self.engine, &self.character, self.book)
    }

    /// Bind another rulebook from the current time on.
    pub fn set_rulebook(&mut self, rulebook: &str) -> WorldResult<()> {
        self.engine.rulebook_mut(rulebook);
        self.engine.write(
            WorldEntity::RulebookBindings(self.character.clone()),
            self.book.as_str(),
            Value::String(rulebook.to_string()),
        )?;
        debug!(character = %self.character, book = %self.book, rulebook, "bound rulebook");
        Ok(())
    }

    pub fn rules_mut(&mut self) -> WorldResult<RuleMappingMut<'_>> {
        let rulebook = self.rulebook()?;
        Ok(RuleMappingMut::new(self.engine, rulebook))
    }
}

fn read_binding(engine: &Engine, character: &str, book: BookType) -> WorldResult<String> {
    match engine.read(&WorldEntity::RulebookBindings(character.to_string()), book.as_str())? {
        Some(Value::String(rulebook)) => Ok(rulebook),
        Some(Value::Null) | None => Err(WorldError::not_found(format!(
            "{book} rulebook of {character}"
        ))),
        Some(other) => Err(WorldError::Corruption(format!(
            "rulebook binding of {character} is {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::keys::RulebookOverrides;

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        let mut physical = engine
            .new_character("physical", RulebookOverrides::new())
            .unwrap();
        physical.add_place("A").unwrap();
        physical.add_place("B").unwrap();
        physical.add_thing("t", "A", None).unwrap();
        physical.add_portal("A", "B", false).unwrap();
        engine
    }

    #[test]
    fn test_default_binding() {
        let engine = engine();
        let follower = engine.character("physical").unwrap().follower(BookType::Place);
        assert_eq!(follower.rulebook().unwrap(), "physical:character_place");
    }

    #[test]
    fn test_binding_is_versioned() {
        let mut engine = engine();
        engine.set_tick(4);
        engine
            .character_mut("physical")
            .unwrap()
            .follower_mut(BookType::Thing)
            .set_rulebook("shared")
            .unwrap();

        let at = |engine: &mut Engine, tick| {
            engine.set_tick(tick);
            engine
                .character("physical")
                .unwrap()
                .follower(BookType::Thing)
                .rulebook()
                .unwrap()
        };
        assert_eq!(at(&mut engine, 3), "physical:character_thing");
        assert_eq!(at(&mut engine, 4), "shared");
    }

    #[test]
    fn test_subjects_per_book() {
        let engine = engine();
        let physical = engine.character("physical").unwrap();

        assert_eq!(
            physical.follower(BookType::Thing).subjects().unwrap(),
            vec![Subject::thing("physical", "t")]
        );
        assert_eq!(
            physical.follower(BookType::Place).subjects().unwrap(),
            vec![Subject::place("physical", "A"), Subject::place("physical", "B")]
        );
        assert_eq!(physical.follower(BookType::Node).subjects().unwrap().len(), 3);
        assert_eq!(
            physical.follower(BookType::Portal).subjects().unwrap(),
            vec![Subject::portal("physical", "A", "B")]
        );
        assert!(physical.follower(BookType::Avatar).subjects().unwrap().is_empty());
    }
}
