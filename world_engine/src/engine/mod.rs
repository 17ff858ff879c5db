//! The engine: owner of the time cursor, the world cache, and the function
//! registries.
//!
//! Every read resolves at the engine's current `(branch, tick)`; every write
//! appends at it. Moving the cursor never changes stored history, so rewinding
//! is just `set_tick` and forking is just `switch_branch` to a new name.

mod guard;
mod turn;

pub use guard::TimeGuard;
pub use turn::{RuleFiring, RuleSkip, TurnReport};

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use timeline::{BranchArena, BranchId, Record, TemporalCache, Tick, Time};

use crate::config::EngineConfig;
use crate::error::{WorldError, WorldResult};
use crate::facade::Facade;
use crate::function::{ActionFn, ComparatorFn, FunctionStore, PrereqFn, SenseFn, TriggerFn};
use crate::graph::{Character, CharacterMut};
use crate::keys::{BookType, RulebookOverrides, Subject, WorldEntity};
use crate::rule::RuleStore;
use crate::store::{FileStore, MemoryWorldStore, WorldStore};

pub(crate) type WorldCache = TemporalCache<WorldEntity, String, Value>;

pub struct Engine {
    config: EngineConfig,
    time: Time,
    branches: BranchArena,
    cache: WorldCache,
    store: Box<dyn WorldStore>,
    pub(crate) rules: RuleStore,
    triggers: FunctionStore<TriggerFn>,
    prereqs: FunctionStore<PrereqFn>,
    actions: FunctionStore<ActionFn>,
    comparators: FunctionStore<ComparatorFn>,
    senses: FunctionStore<SenseFn>,
}

impl Engine {
    /// A fresh world kept in memory.
    pub fn new(config: EngineConfig) -> Self {
        let branches = BranchArena::new(config.trunk.as_str());
        let time = Time::new(config.trunk.as_str(), 0);
        Self::assemble(config, Box::new(MemoryWorldStore::new()), branches, time)
    }

    /// A world backed by `store`, resuming wherever the store's saved timeline left off.
    pub fn with_store(config: EngineConfig, store: impl WorldStore + 'static) -> WorldResult<Self> {
        let (branches, time) = match store.load_timeline()? {
            Some((branches, time)) => {
                if branches.root().as_str() != config.trunk {
                    return Err(WorldError::Config(format!(
                        "stored trunk is {}, configured trunk is {}",
                        branches.root(),
                        config.trunk
                    )));
                }
                info!(%time, "resuming world");
                (branches, time)
            }
            None => (
                BranchArena::new(config.trunk.as_str()),
                Time::new(config.trunk.as_str(), 0),
            ),
        };
        let mut engine = Self::assemble(config, Box::new(store), branches, time);
        engine.restore_rulebooks()?;
        Ok(engine)
    }

    /// A world persisted as a JSON snapshot at `path`.
    pub fn open(config: EngineConfig, path: impl AsRef<Path>) -> WorldResult<Self> {
        Self::with_store(config, FileStore::open(path)?)
    }

    fn assemble(
        config: EngineConfig,
        store: Box<dyn WorldStore>,
        branches: BranchArena,
        time: Time,
    ) -> Self {
        Self {
            cache: WorldCache::new(config.caching),
            config,
            time,
            branches,
            store,
            rules: RuleStore::new(),
            triggers: FunctionStore::new("trigger"),
            prereqs: FunctionStore::new("prereq"),
            actions: FunctionStore::new("action"),
            comparators: FunctionStore::new("comparator"),
            senses: FunctionStore::new("sense"),
        }
    }

    /// Recreate the (empty) rulebooks that stored characters are bound to.
    /// Rules are code and have to be added again by the caller.
    fn restore_rulebooks(&mut self) -> WorldResult<()> {
        for character in self.store.characters()? {
            let bindings = WorldEntity::RulebookBindings(character);
            for book in BookType::ALL {
                if let Some(Value::String(rulebook)) = self.read_stat(&bindings, book.as_str())? {
                    self.rules.edit(&rulebook);
                }
            }
        }
        Ok(())
    }

    /// Save the timeline position and flush the store.
    pub fn flush(&mut self) -> WorldResult<()> {
        self.store.save_timeline(&self.branches, &self.time)?;
        self.store.flush()
    }

    pub fn close(mut self) -> WorldResult<()> {
        self.flush()?;
        info!(time = %self.time, "closed world");
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- time ---

    pub fn time(&self) -> &Time {
        &self.time
    }

    pub fn branch(&self) -> &BranchId {
        &self.time.branch
    }

    pub fn tick(&self) -> Tick {
        self.time.tick
    }

    pub fn branches(&self) -> &BranchArena {
        &self.branches
    }

    /// Jump to any point of an existing branch.
    pub fn set_time(&mut self, time: Time) -> WorldResult<()> {
        if !self.branches.contains(&time.branch) {
            return Err(WorldError::not_found(format!("branch {}", time.branch)));
        }
        self.time = time;
        Ok(())
    }

    pub fn set_tick(&mut self, tick: Tick) {
        self.time.tick = tick;
    }

    /// Move to `branch`, keeping the tick. A branch that does not exist yet is
    /// forked from the current time.
    pub fn switch_branch(&mut self, branch: impl Into<BranchId>) -> WorldResult<()> {
        let branch = branch.into();
        if !self.branches.contains(&branch) {
            self.branches
                .fork(&self.time.branch, self.time.tick, branch.clone())?;
            info!(parent = %self.time.branch, %branch, tick = self.time.tick, "forked branch");
        }
        self.time.branch = branch;
        Ok(())
    }

    /// Fork an anonymous branch from the current time and move onto it.
    pub fn fork(&mut self) -> WorldResult<BranchId> {
        let branch = BranchId::new(format!(
            "{}-{}",
            self.config.fork_prefix,
            Uuid::new_v4().simple()
        ));
        self.switch_branch(branch.clone())?;
        Ok(branch)
    }

    /// Borrow the engine mutably; the current time comes back when the guard drops.
    pub fn preserve_time(&mut self) -> TimeGuard<'_> {
        TimeGuard::new(self)
    }

    // --- cache access ---

    pub(crate) fn read(&self, entity: &WorldEntity, attr: &str) -> WorldResult<Option<Value>> {
        Ok(self.cache.resolve(
            &self.branches,
            &*self.store,
            entity,
            &attr.to_string(),
            &self.time,
        )?)
    }

    /// Like `read`, but tombstones read as absent.
    pub(crate) fn read_stat(&self, entity: &WorldEntity, attr: &str) -> WorldResult<Option<Value>> {
        Ok(self.read(entity, attr)?.filter(|value| !value.is_null()))
    }

    pub(crate) fn read_live(&self, entity: &WorldEntity, attr: &str) -> WorldResult<bool> {
        Ok(self.cache.contains(
            &self.branches,
            &*self.store,
            entity,
            &attr.to_string(),
            &self.time,
        )?)
    }

    pub(crate) fn live_keys(&self, entity: &WorldEntity) -> WorldResult<Vec<String>> {
        Ok(self
            .cache
            .iter_keys(&self.branches, &*self.store, entity, &self.time)?)
    }

    /// Attributes holding a non-null value right now. Unlike `live_keys`,
    /// `false` counts as present.
    pub(crate) fn stat_keys(&self, entity: &WorldEntity) -> WorldResult<Vec<String>> {
        let mut keys = Vec::new();
        for key in self.cache.all_keys(&*self.store, entity)? {
            if self.read_stat(entity, &key)?.is_some() {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    pub(crate) fn write(&mut self, entity: WorldEntity, attr: &str, value: Value) -> WorldResult<()> {
        Ok(self.cache.store(
            &mut self.branches,
            &mut *self.store,
            &entity,
            &attr.to_string(),
            &self.time,
            value,
        )?)
    }

    /// Every record of one key, across all branches.
    pub fn history(&self, entity: &WorldEntity, attr: &str) -> WorldResult<Vec<Record<Value>>> {
        Ok(self
            .cache
            .history(&*self.store, entity, &attr.to_string())?)
    }

    // --- characters ---

    pub fn new_character(
        &mut self,
        name: &str,
        rulebooks: RulebookOverrides,
    ) -> WorldResult<CharacterMut<'_>> {
        if self.has_character(name)? {
            return Err(WorldError::conflict(format!("character {name}")));
        }
        self.write(WorldEntity::Characters, name, Value::Bool(true))?;
        for book in BookType::ALL {
            let rulebook = rulebooks.resolve(name, book);
            self.rules.edit(&rulebook);
            self.write(
                WorldEntity::RulebookBindings(name.to_string()),
                book.as_str(),
                Value::String(rulebook),
            )?;
        }
        self.store.init_character(name, &rulebooks)?;
        debug!(character = name, time = %self.time, "created character");
        Ok(CharacterMut::new(self, name))
    }

    pub fn has_character(&self, name: &str) -> WorldResult<bool> {
        self.read_live(&WorldEntity::Characters, name)
    }

    pub fn character(&self, name: &str) -> WorldResult<Character<'_>> {
        if !self.has_character(name)? {
            return Err(WorldError::not_found(format!("character {name}")));
        }
        Ok(Character::new(self, name))
    }

    pub fn character_mut(&mut self, name: &str) -> WorldResult<CharacterMut<'_>> {
        if !self.has_character(name)? {
            return Err(WorldError::not_found(format!("character {name}")));
        }
        Ok(CharacterMut::new(self, name))
    }

    /// Delete a character from now on. Its history stays readable at earlier times.
    pub fn del_character(&mut self, name: &str) -> WorldResult<()> {
        if !self.has_character(name)? {
            return Err(WorldError::not_found(format!("character {name}")));
        }
        self.write(WorldEntity::Characters, name, Value::Bool(false))?;
        debug!(character = name, time = %self.time, "deleted character");
        Ok(())
    }

    pub fn character_names(&self) -> WorldResult<Vec<String>> {
        self.live_keys(&WorldEntity::Characters)
    }

    /// A copy-on-write view of a character.
    pub fn facade(&self, name: &str) -> WorldResult<Facade<'_>> {
        Ok(Facade::new(self.character(name)?))
    }

    // --- functions ---

    pub fn define_trigger<F>(&mut self, name: &str, trigger: F)
    where
        F: Fn(&mut Engine, &Subject) -> WorldResult<bool> + Send + Sync + 'static,
    {
        self.triggers.define(name, Arc::new(trigger));
    }

    pub fn define_prereq<F>(&mut self, name: &str, prereq: F)
    where
        F: Fn(&mut Engine, &Subject) -> WorldResult<bool> + Send + Sync + 'static,
    {
        self.prereqs.define(name, Arc::new(prereq));
    }

    pub fn define_action<F>(&mut self, name: &str, action: F)
    where
        F: Fn(&mut Engine, &Subject) -> WorldResult<Value> + Send + Sync + 'static,
    {
        self.define_action_fn(name, Arc::new(action));
    }

    pub(crate) fn define_action_fn(&mut self, name: &str, action: ActionFn) {
        self.actions.define(name, action);
    }

    pub fn define_comparator<F>(&mut self, name: &str, comparator: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparators.define(name, Arc::new(comparator));
    }

    pub fn define_sense<F>(&mut self, name: &str, sense: F)
    where
        F: for<'a> Fn(&'a Engine, &str, Facade<'a>) -> WorldResult<Facade<'a>>
            + Send
            + Sync
            + 'static,
    {
        self.senses.define(name, Arc::new(sense));
    }

    pub fn triggers(&self) -> &FunctionStore<TriggerFn> {
        &self.triggers
    }

    pub fn prereqs(&self) -> &FunctionStore<PrereqFn> {
        &self.prereqs
    }

    pub fn actions(&self) -> &FunctionStore<ActionFn> {
        &self.actions
    }

    pub fn comparators(&self) -> &FunctionStore<ComparatorFn> {
        &self.comparators
    }

    pub fn senses(&self) -> &FunctionStore<SenseFn> {
        &self.senses
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("time", &self.time)
            .field("branches", &self.branches)
            .field("cached_keys", &self.cache.len())
            .field("rules", &self.rules)
            .finish()
    }
}
