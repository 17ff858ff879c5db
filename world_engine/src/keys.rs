//! Cache keys and the small value types stored under them.
//!
//! Every piece of world state lives in one [`timeline::TemporalCache`] keyed by
//! `(WorldEntity, attribute)`, with JSON values. Set-like entities record
//! membership as `true`/`false`; stat-like entities use `null` as a tombstone.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{WorldError, WorldResult};

/// The entity half of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorldEntity {
    /// Character names, by membership.
    Characters,
    /// Stats of a character graph.
    GraphStats(String),
    /// Node names of a character, by membership.
    Nodes(String),
    NodeStats { character: String, node: String },
    /// Thing records of a character; a null value makes the node a place again.
    Things(String),
    /// Destinations reachable from `origin`, by membership.
    Successors { character: String, origin: String },
    /// Origins leading into `destination`, by membership.
    Predecessors { character: String, destination: String },
    PortalStats {
        character: String,
        origin: String,
        destination: String,
    },
    /// Destinations from `origin` whose portal mirrors the reverse portal.
    PortalMirrors { character: String, origin: String },
    /// Rulebook name bound to each [`BookType`] of a character.
    RulebookBindings(String),
    /// Activation state of each rule within one rulebook.
    ActiveRules(String),
    /// Graphs a character has ever had avatars in.
    AvatarGraphs(String),
    /// Avatar membership of nodes in `graph`.
    Avatars { character: String, graph: String },
    /// Sense name to registered function name.
    Senses(String),
}

/// Stat name to value.
pub type Stats = BTreeMap<String, Value>;

/// Where a thing is, and where it is headed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingLocation {
    pub location: String,
    #[serde(default)]
    pub next_location: Option<String>,
}

impl ThingLocation {
    pub fn new(location: impl Into<String>, next_location: Option<&str>) -> Self {
        Self {
            location: location.into(),
            next_location: next_location.map(str::to_string),
        }
    }

    pub(crate) fn to_value(&self) -> WorldResult<Value> {
        serde_json::to_value(self).map_err(|e| WorldError::Corruption(e.to_string()))
    }

    pub(crate) fn from_value(value: Value) -> WorldResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| WorldError::Corruption(format!("bad thing record: {e}")))
    }
}

/// The kinds of entity a character's rulebooks apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookType {
    Character,
    Avatar,
    Thing,
    Place,
    Node,
    Portal,
}

impl BookType {
    /// Every book type, in the order rules are followed each turn.
    pub const ALL: [BookType; 6] = [
        BookType::Character,
        BookType::Avatar,
        BookType::Thing,
        BookType::Place,
        BookType::Node,
        BookType::Portal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookType::Character => "character",
            BookType::Avatar => "avatar",
            BookType::Thing => "character_thing",
            BookType::Place => "character_place",
            BookType::Node => "character_node",
            BookType::Portal => "character_portal",
        }
    }

    /// Rulebook used when a character was created without an override.
    pub fn default_rulebook(&self, character: &str) -> String {
        format!("{character}:{}", self.as_str())
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional rulebook names chosen when a character is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulebookOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    portal: Option<String>,
}

impl RulebookOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: use `rulebook` for `book` instead of the default.
    pub fn with(mut self, book: BookType, rulebook: impl Into<String>) -> Self {
        *self.slot_mut(book) = Some(rulebook.into());
        self
    }

    pub fn get(&self, book: BookType) -> Option<&str> {
        match book {
            BookType::Character => self.character.as_deref(),
            BookType::Avatar => self.avatar.as_deref(),
            BookType::Thing => self.thing.as_deref(),
            BookType::Place => self.place.as_deref(),
            BookType::Node => self.node.as_deref(),
            BookType::Portal => self.portal.as_deref(),
        }
    }

    /// The rulebook a new character named `character` gets for `book`.
    pub fn resolve(&self, character: &str, book: BookType) -> String {
        self.get(book)
            .map(str::to_string)
            .unwrap_or_else(|| book.default_rulebook(character))
    }

    fn slot_mut(&mut self, book: BookType) -> &mut Option<String> {
        match book {
            BookType::Character => &mut self.character,
            BookType::Avatar => &mut self.avatar,
            BookType::Thing => &mut self.thing,
            BookType::Place => &mut self.place,
            BookType::Node => &mut self.node,
            BookType::Portal => &mut self.portal,
        }
    }
}

/// The entity a rule is being evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Character { character: String },
    Thing { character: String, node: String },
    Place { character: String, node: String },
    Node { character: String, node: String },
    Portal {
        character: String,
        origin: String,
        destination: String,
    },
    /// A node in `graph` that stands in for `character`.
    Avatar {
        character: String,
        graph: String,
        node: String,
    },
}

impl Subject {
    pub fn character(name: impl Into<String>) -> Self {
        Subject::Character {
            character: name.into(),
        }
    }

    pub fn thing(character: impl Into<String>, node: impl Into<String>) -> Self {
        Subject::Thing {
            character: character.into(),
            node: node.into(),
        }
    }

    pub fn place(character: impl Into<String>, node: impl Into<String>) -> Self {
        Subject::Place {
            character: character.into(),
            node: node.into(),
        }
    }

    pub fn portal(
        character: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Subject::Portal {
            character: character.into(),
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// The character whose rules are being followed.
    pub fn owner(&self) -> &str {
        match self {
            Subject::Character { character }
            | Subject::Thing { character, .. }
            | Subject::Place { character, .. }
            | Subject::Node { character, .. }
            | Subject::Portal { character, .. }
            | Subject::Avatar { character, .. } => character,
        }
    }

    /// `(graph, node)` if the subject is a node of some graph.
    pub fn as_node(&self) -> Option<(&str, &str)> {
        match self {
            Subject::Thing { character, node }
            | Subject::Place { character, node }
            | Subject::Node { character, node } => Some((character, node)),
            Subject::Avatar { graph, node, .. } => Some((graph, node)),
            Subject::Character { .. } | Subject::Portal { .. } => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Character { character } => write!(f, "{character}"),
            Subject::Thing { character, node }
            | Subject::Place { character, node }
            | Subject::Node { character, node } => write!(f, "{character}.{node}"),
            Subject::Portal {
                character,
                origin,
                destination,
            } => write!(f, "{character}.{origin}->{destination}"),
            Subject::Avatar {
                character,
                graph,
                node,
            } => write!(f, "{character}@{graph}.{node}"),
        }
    }
}
