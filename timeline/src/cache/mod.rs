//! Temporal Cache - append-only, branch/tick-indexed values with ancestor fallback.
//!
//! Lookups follow the active-branches walk:
//! 1. **Branch**: take the latest record on the queried branch at or before the tick
//! 2. **Ancestors**: otherwise retry on the parent at the fork tick, up to the root
//! 3. **Store**: histories are pulled from the backing store the first time a key
//!    is touched and memoized; nothing is ever invalidated
//!
//! Past ticks are never rewritten, so the cache only ever grows.

mod history;

pub use history::*;

use dashmap::{DashMap, DashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::debug;

use crate::branch::{BranchArena, Time};
use crate::error::{TimelineError, TimelineResult};
use crate::store::{BackingStore, Record};

/// Versioned values for `(entity, attribute)` keys.
///
/// With caching disabled every read goes straight to the backing store and
/// nothing is kept in memory.
#[derive(Debug)]
pub struct TemporalCache<E, A, V>
where
    E: Eq + Hash,
    A: Eq + Hash,
{
    entities: DashMap<E, BTreeMap<A, History<V>>>,
    /// Keys whose stored history has been pulled in.
    loaded: DashSet<(E, A)>,
    /// Entities whose stored attribute list has been pulled in.
    listed: DashSet<E>,
    caching: bool,
}

impl<E, A, V> TemporalCache<E, A, V>
where
    E: Eq + Hash + Clone + Debug,
    A: Ord + Hash + Clone + Debug,
    V: Clone + PartialEq,
{
    pub fn new(caching: bool) -> Self {
        Self {
            entities: DashMap::new(),
            loaded: DashSet::new(),
            listed: DashSet::new(),
            caching,
        }
    }

    pub fn is_caching(&self) -> bool {
        self.caching
    }

    /// Append a record at `time`.
    ///
    /// `time` must be at or past the tip of its branch; anything earlier is
    /// history and fails with [`TimelineError::BehindTip`]. A parent branch
    /// cannot write at or before the tick a child forked from it
    /// ([`TimelineError::ForkedPast`]).
    pub fn store<S>(
        &self,
        arena: &mut BranchArena,
        backing: &mut S,
        entity: &E,
        attr: &A,
        time: &Time,
        value: V,
    ) -> TimelineResult<()>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        arena.check_writable(time)?;
        backing.append(entity, attr, time, &value)?;
        if self.caching {
            self.entities
                .entry(entity.clone())
                .or_default()
                .entry(attr.clone())
                .or_default()
                .insert(&time.branch, time.tick, value);
        }
        arena.advance_tip(time)
    }

    /// The value in effect at `time`, or `None` if nothing was ever recorded.
    pub fn resolve<S>(
        &self,
        arena: &BranchArena,
        backing: &S,
        entity: &E,
        attr: &A,
        time: &Time,
    ) -> TimelineResult<Option<V>>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        if !self.caching {
            let history = History::from_records(backing.load(entity, attr)?)?;
            return Ok(history.resolve(arena, time).cloned());
        }
        self.ensure_loaded(backing, entity, attr)?;
        Ok(self.entities.get(entity).and_then(|attrs| {
            attrs
                .get(attr)
                .and_then(|history| history.resolve(arena, time).cloned())
        }))
    }

    /// Like [`resolve`](Self::resolve), but absence is [`TimelineError::NotFound`].
    pub fn get<S>(
        &self,
        arena: &BranchArena,
        backing: &S,
        entity: &E,
        attr: &A,
        time: &Time,
    ) -> TimelineResult<V>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        self.resolve(arena, backing, entity, attr, time)?
            .ok_or_else(|| TimelineError::not_found(format!("{attr:?} of {entity:?} at {time}")))
    }

    /// Whether the value in effect at `time` is live.
    pub fn contains<S>(
        &self,
        arena: &BranchArena,
        backing: &S,
        entity: &E,
        attr: &A,
        time: &Time,
    ) -> TimelineResult<bool>
    where
        S: BackingStore<E, A, V> + ?Sized,
        V: Liveness,
    {
        Ok(self
            .resolve(arena, backing, entity, attr, time)?
            .is_some_and(|value| value.is_live()))
    }

    /// Attributes of `entity` whose value in effect at `time` is live.
    ///
    /// Each attribute is resolved on its own, so the first record found on the
    /// walk decides it: a tombstone on a later branch hides a live record on an
    /// ancestor.
    pub fn iter_keys<S>(
        &self,
        arena: &BranchArena,
        backing: &S,
        entity: &E,
        time: &Time,
    ) -> TimelineResult<Vec<A>>
    where
        S: BackingStore<E, A, V> + ?Sized,
        V: Liveness,
    {
        let mut live = Vec::new();
        for attr in self.all_keys(backing, entity)? {
            if self.contains(arena, backing, entity, &attr, time)? {
                live.push(attr);
            }
        }
        Ok(live)
    }

    /// Every attribute ever recorded for `entity`, live or not, in order.
    pub fn all_keys<S>(&self, backing: &S, entity: &E) -> TimelineResult<Vec<A>>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        if !self.caching {
            let keys: BTreeSet<A> = backing.keys(entity)?.into_iter().collect();
            return Ok(keys.into_iter().collect());
        }
        if !self.listed.contains(entity) {
            let stored = backing.keys(entity)?;
            debug!(?entity, count = stored.len(), "listing stored attributes");
            for attr in &stored {
                self.ensure_loaded(backing, entity, attr)?;
            }
            self.listed.insert(entity.clone());
        }
        Ok(self
            .entities
            .get(entity)
            .map(|attrs| attrs.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Full record history of one key.
    pub fn history<S>(&self, backing: &S, entity: &E, attr: &A) -> TimelineResult<Vec<Record<V>>>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        if !self.caching {
            return Ok(History::from_records(backing.load(entity, attr)?)?.records());
        }
        self.ensure_loaded(backing, entity, attr)?;
        Ok(self
            .entities
            .get(entity)
            .and_then(|attrs| attrs.get(attr).map(History::records))
            .unwrap_or_default())
    }

    /// Number of keys currently held in memory.
    pub fn len(&self) -> usize {
        self.entities.iter().map(|attrs| attrs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_loaded<S>(&self, backing: &S, entity: &E, attr: &A) -> TimelineResult<()>
    where
        S: BackingStore<E, A, V> + ?Sized,
    {
        let key = (entity.clone(), attr.clone());
        if self.loaded.contains(&key) {
            return Ok(());
        }
        let records = backing.load(entity, attr)?;
        debug!(?entity, ?attr, count = records.len(), "cache miss, loaded history");
        let stored = History::from_records(records).map_err(|err| match err {
            TimelineError::Corruption(msg) => {
                TimelineError::Corruption(format!("{attr:?} of {entity:?}: {msg}"))
            }
            other => other,
        })?;
        if !stored.is_empty() {
            self.entities
                .entry(entity.clone())
                .or_default()
                .entry(attr.clone())
                .or_default()
                .absorb(stored);
        }
        self.loaded.insert(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    type Cache = TemporalCache<String, String, Value>;
    type Store = MemoryStore<String, String, Value>;

    fn key(s: &str) -> String {
        s.to_string()
    }

    fn setup(caching: bool) -> (Cache, Store, BranchArena) {
        (Cache::new(caching), Store::new(), BranchArena::new("trunk"))
    }

    #[test]
    fn test_read_your_writes() {
        let (cache, mut store, mut arena) = setup(true);
        let (e, a) = (key("kobold"), key("hp"));

        cache
            .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", 0), json!(10))
            .unwrap();
        cache
            .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", 5), json!(7))
            .unwrap();

        let at = |tick| cache.get(&arena, &store, &e, &a, &Time::new("trunk", tick)).unwrap();
        assert_eq!(at(0), json!(10));
        assert_eq!(at(4), json!(10));
        assert_eq!(at(5), json!(7));
        assert_eq!(at(50), json!(7));
    }

    #[test]
    fn test_write_behind_tip_is_rejected() {
        let (cache, mut store, mut arena) = setup(true);
        let (e, a) = (key("kobold"), key("hp"));

        cache
            .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", 5), json!(1))
            .unwrap();
        let err = cache
            .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", 3), json!(2))
            .unwrap_err();

        assert!(err.is_corruption());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_tick_write_replaces() {
        let (cache, mut store, mut arena) = setup(true);
        let (e, a) = (key("kobold"), key("hp"));
        let now = Time::new("trunk", 2);

        cache.store(&mut arena, &mut store, &e, &a, &now, json!(1)).unwrap();
        cache.store(&mut arena, &mut store, &e, &a, &now, json!(2)).unwrap();

        assert_eq!(cache.get(&arena, &store, &e, &a, &now).unwrap(), json!(2));
        assert_eq!(cache.history(&store, &e, &a).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let (cache, store, arena) = setup(true);
        let result = cache.get(&arena, &store, &key("ghost"), &key("hp"), &Time::new("trunk", 0));
        assert!(matches!(result, Err(TimelineError::NotFound(_))));
    }

    #[test]
    fn test_cold_cache_loads_from_store() {
        let (_, mut store, arena) = setup(true);
        store
            .append(&key("kobold"), &key("hp"), &Time::new("trunk", 1), &json!(3))
            .unwrap();

        let cache = Cache::new(true);
        assert!(cache.is_empty());
        let value = cache
            .get(&arena, &store, &key("kobold"), &key("hp"), &Time::new("trunk", 9))
            .unwrap();

        assert_eq!(value, json!(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cold_cache_prefers_stored_descendant_record() {
        // a stored record on the child branch must win over a fresh parent write
        let mut arena = BranchArena::new("trunk");
        let mut store = Store::new();
        let cache = Cache::new(true);
        cache
            .store(&mut arena, &mut store, &key("k"), &key("a"), &Time::new("trunk", 2), json!("trunk"))
            .unwrap();

        arena.fork(&"trunk".into(), 2, "alt".into()).unwrap();
        store
            .append(&key("k"), &key("a"), &Time::new("alt", 3), &json!("alt"))
            .unwrap();

        let value = cache
            .get(&arena, &store, &key("k"), &key("a"), &Time::new("alt", 4))
            .unwrap();
        assert_eq!(value, json!("alt"));
    }

    #[test]
    fn test_fork_inherits_parent_history() {
        let (cache, mut store, mut arena) = setup(true);
        let (e, a) = (key("t"), key("location"));
        for (tick, loc) in [(0, "A"), (3, "B"), (8, "C")] {
            cache
                .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", tick), json!(loc))
                .unwrap();
        }
        arena.fork(&"trunk".into(), 5, "alt".into()).unwrap();

        for tick in 0..5 {
            let on_alt = cache.get(&arena, &store, &e, &a, &Time::new("alt", tick)).unwrap();
            let on_trunk = cache.get(&arena, &store, &e, &a, &Time::new("trunk", tick)).unwrap();
            assert_eq!(on_alt, on_trunk);
        }
        // trunk moved on after the fork; alt did not
        assert_eq!(
            cache.get(&arena, &store, &e, &a, &Time::new("alt", 9)).unwrap(),
            json!("B")
        );
    }

    #[test]
    fn test_iter_keys_tombstone_hides_ancestor() {
        let (cache, mut store, mut arena) = setup(true);
        let things = key("things");
        for name in ["a", "b"] {
            cache
                .store(&mut arena, &mut store, &things, &key(name), &Time::new("trunk", 0), json!(true))
                .unwrap();
        }
        arena.fork(&"trunk".into(), 1, "alt".into()).unwrap();
        cache
            .store(&mut arena, &mut store, &things, &key("a"), &Time::new("alt", 2), json!(false))
            .unwrap();

        let on_alt = cache.iter_keys(&arena, &store, &things, &Time::new("alt", 3)).unwrap();
        let on_trunk = cache.iter_keys(&arena, &store, &things, &Time::new("trunk", 3)).unwrap();

        assert_eq!(on_alt, vec![key("b")]);
        assert_eq!(on_trunk, vec![key("a"), key("b")]);
        assert_eq!(cache.all_keys(&store, &things).unwrap().len(), 2);
    }

    #[test]
    fn test_uncached_mode_reads_through() {
        let (cache, mut store, mut arena) = setup(false);
        let (e, a) = (key("kobold"), key("hp"));

        cache
            .store(&mut arena, &mut store, &e, &a, &Time::new("trunk", 1), json!(4))
            .unwrap();

        assert!(cache.is_empty());
        assert_eq!(
            cache.get(&arena, &store, &e, &a, &Time::new("trunk", 1)).unwrap(),
            json!(4)
        );
        assert_eq!(
            cache.iter_keys(&arena, &store, &e, &Time::new("trunk", 1)).unwrap(),
            vec![a]
        );
    }
}
