//! Persistence behind the world cache.
//!
//! A [`WorldStore`] is a [`BackingStore`] for world keys that also remembers
//! which characters were created and where the timeline stood when the engine
//! last closed.

mod file;

pub use file::FileStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use timeline::{BackingStore, BranchArena, MemoryStore, Record, Time, TimelineResult};

use crate::error::WorldResult;
use crate::keys::{RulebookOverrides, WorldEntity};

pub trait WorldStore: BackingStore<WorldEntity, String, Value> {
    /// Register a character and the rulebooks it was created with. Idempotent.
    fn init_character(&mut self, name: &str, rulebooks: &RulebookOverrides) -> WorldResult<()>;

    /// Every character ever registered, including deleted ones.
    fn characters(&self) -> WorldResult<Vec<String>>;

    fn save_timeline(&mut self, branches: &BranchArena, time: &Time) -> WorldResult<()>;

    /// The branches and current time saved by the last [`save_timeline`](Self::save_timeline).
    fn load_timeline(&self) -> WorldResult<Option<(BranchArena, Time)>>;

    /// Make everything written so far durable.
    fn flush(&mut self) -> WorldResult<()> {
        Ok(())
    }
}

/// Saved position on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTimeline {
    pub branches: BranchArena,
    pub time: Time,
}

/// Store that lives and dies with the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorldStore {
    records: MemoryStore<WorldEntity, String, Value>,
    characters: BTreeMap<String, RulebookOverrides>,
    timeline: Option<SavedTimeline>,
}

impl MemoryWorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records written.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rulebooks a character was registered with.
    pub fn rulebooks_of(&self, character: &str) -> Option<&RulebookOverrides> {
        self.characters.get(character)
    }
}

impl BackingStore<WorldEntity, String, Value> for MemoryWorldStore {
    fn load(&self, entity: &WorldEntity, attr: &String) -> TimelineResult<Vec<Record<Value>>> {
        self.records.load(entity, attr)
    }

    fn keys(&self, entity: &WorldEntity) -> TimelineResult<Vec<String>> {
        self.records.keys(entity)
    }

    fn append(
        &mut self,
        entity: &WorldEntity,
        attr: &String,
        time: &Time,
        value: &Value,
    ) -> TimelineResult<()> {
        self.records.append(entity, attr, time, value)
    }
}

impl WorldStore for MemoryWorldStore {
    fn init_character(&mut self, name: &str, rulebooks: &RulebookOverrides) -> WorldResult<()> {
        self.characters
            .entry(name.to_string())
            .or_insert_with(|| rulebooks.clone());
        Ok(())
    }

    fn characters(&self) -> WorldResult<Vec<String>> {
        Ok(self.characters.keys().cloned().collect())
    }

    fn save_timeline(&mut self, branches: &BranchArena, time: &Time) -> WorldResult<()> {
        self.timeline = Some(SavedTimeline {
            branches: branches.clone(),
            time: time.clone(),
        });
        Ok(())
    }

    fn load_timeline(&self) -> WorldResult<Option<(BranchArena, Time)>> {
        Ok(self
            .timeline
            .as_ref()
            .map(|saved| (saved.branches.clone(), saved.time.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::BookType;

    #[test]
    fn test_init_character_is_idempotent() {
        let mut store = MemoryWorldStore::new();
        let first = RulebookOverrides::new().with(BookType::Thing, "shared");
        store.init_character("physical", &first).unwrap();
        store
            .init_character("physical", &RulebookOverrides::new())
            .unwrap();

        assert_eq!(store.characters().unwrap(), vec!["physical".to_string()]);
        assert_eq!(store.rulebooks_of("physical"), Some(&first));
    }

    #[test]
    fn test_timeline_round_trip() {
        let mut store = MemoryWorldStore::new();
        assert!(store.load_timeline().unwrap().is_none());

        let mut arena = BranchArena::new("trunk");
        arena.fork(&"trunk".into(), 3, "alt".into()).unwrap();
        store
            .save_timeline(&arena, &Time::new("alt", 5))
            .unwrap();

        let (loaded, time) = store.load_timeline().unwrap().unwrap();
        assert_eq!(loaded, arena);
        assert_eq!(time, Time::new("alt", 5));
    }
}
