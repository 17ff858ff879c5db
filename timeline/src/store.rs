//! The backing store the cache falls back to, and an in-memory implementation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::branch::{BranchId, Tick, Time};
use crate::error::TimelineResult;

/// One stored value at one point of one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<V> {
    pub branch: BranchId,
    pub tick: Tick,
    pub value: V,
}

/// Durable home of every record, consulted on cache misses.
pub trait BackingStore<E, A, V> {
    /// All records ever written for `(entity, attr)`, ordered by branch then tick.
    fn load(&self, entity: &E, attr: &A) -> TimelineResult<Vec<Record<V>>>;

    /// Every attribute ever written for `entity`.
    fn keys(&self, entity: &E) -> TimelineResult<Vec<A>>;

    /// Persist one record. Writing the same `(entity, attr, branch, tick)`
    /// again replaces the earlier value, so retries never duplicate.
    fn append(&mut self, entity: &E, attr: &A, time: &Time, value: &V) -> TimelineResult<()>;
}

/// Backing store that keeps everything in ordered maps.
#[derive(Debug, Clone)]
pub struct MemoryStore<E, A, V> {
    entities: BTreeMap<E, BTreeMap<A, BTreeMap<(BranchId, Tick), V>>>,
}

impl<E, A, V> Default for MemoryStore<E, A, V> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<E, A, V> MemoryStore<E, A, V>
where
    E: Ord + Clone,
    A: Ord + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.entities
            .values()
            .flat_map(|attrs| attrs.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record, flattened, in key order.
    pub fn records(&self) -> Vec<(E, A, Record<V>)> {
        let mut out = Vec::with_capacity(self.len());
        for (entity, attrs) in &self.entities {
            for (attr, history) in attrs {
                for ((branch, tick), value) in history {
                    out.push((
                        entity.clone(),
                        attr.clone(),
                        Record {
                            branch: branch.clone(),
                            tick: *tick,
                            value: value.clone(),
                        },
                    ));
                }
            }
        }
        out
    }
}

impl<E, A, V> BackingStore<E, A, V> for MemoryStore<E, A, V>
where
    E: Ord + Clone,
    A: Ord + Clone,
    V: Clone,
{
    fn load(&self, entity: &E, attr: &A) -> TimelineResult<Vec<Record<V>>> {
        let records = self
            .entities
            .get(entity)
            .and_then(|attrs| attrs.get(attr))
            .map(|history| {
                history
                    .iter()
                    .map(|((branch, tick), value)| Record {
                        branch: branch.clone(),
                        tick: *tick,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    fn keys(&self, entity: &E) -> TimelineResult<Vec<A>> {
        Ok(self
            .entities
            .get(entity)
            .map(|attrs| attrs.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn append(&mut self, entity: &E, attr: &A, time: &Time, value: &V) -> TimelineResult<()> {
        self.entities
            .entry(entity.clone())
            .or_default()
            .entry(attr.clone())
            .or_default()
            .insert((time.branch.clone(), time.tick), value.clone());
        Ok(())
    }
}
