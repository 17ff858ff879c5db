//! Per-key record history across branches.

use std::collections::{BTreeMap, HashMap};

use crate::branch::{BranchArena, BranchId, Tick, Time};
use crate::error::{TimelineError, TimelineResult};
use crate::store::Record;

/// Whether a resolved value counts as present in set-like views.
///
/// Tombstones are written as dead values rather than by removing records.
pub trait Liveness {
    fn is_live(&self) -> bool;
}

impl Liveness for serde_json::Value {
    fn is_live(&self) -> bool {
        match self {
            serde_json::Value::Null => false,
            serde_json::Value::Bool(b) => *b,
            _ => true,
        }
    }
}

impl Liveness for bool {
    fn is_live(&self) -> bool {
        *self
    }
}

impl<T> Liveness for Option<T> {
    fn is_live(&self) -> bool {
        self.is_some()
    }
}

/// Every value one key has held, grouped by branch and ordered by tick.
#[derive(Debug, Clone)]
pub struct History<V> {
    branches: HashMap<BranchId, BTreeMap<Tick, V>>,
}

impl<V> Default for History<V> {
    fn default() -> Self {
        Self {
            branches: HashMap::new(),
        }
    }
}

impl<V: Clone + PartialEq> History<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from backing-store records.
    ///
    /// Two different values for the same branch and tick mean the store is
    /// corrupt.
    pub fn from_records(records: Vec<Record<V>>) -> TimelineResult<Self> {
        let mut history = Self::new();
        for record in records {
            let ticks = history.branches.entry(record.branch.clone()).or_default();
            match ticks.get(&record.tick) {
                Some(existing) if *existing != record.value => {
                    return Err(TimelineError::Corruption(format!(
                        "conflicting records at ({}, {})",
                        record.branch, record.tick
                    )));
                }
                Some(_) => {}
                None => {
                    ticks.insert(record.tick, record.value);
                }
            }
        }
        Ok(history)
    }

    /// Record `value` at `tick` on `branch`, replacing any value at that exact tick.
    pub fn insert(&mut self, branch: &BranchId, tick: Tick, value: V) {
        self.branches
            .entry(branch.clone())
            .or_default()
            .insert(tick, value);
    }

    /// Merge records loaded from the store. Records already held win.
    pub fn absorb(&mut self, other: History<V>) {
        for (branch, ticks) in other.branches {
            let mine = self.branches.entry(branch).or_default();
            for (tick, value) in ticks {
                mine.entry(tick).or_insert(value);
            }
        }
    }

    /// Latest value on exactly this branch at or before `tick`.
    pub fn latest_on(&self, branch: &BranchId, tick: Tick) -> Option<&V> {
        self.branches
            .get(branch)?
            .range(..=tick)
            .next_back()
            .map(|(_, value)| value)
    }

    /// Resolve the value in effect at `time`, falling back through ancestors.
    pub fn resolve(&self, arena: &BranchArena, time: &Time) -> Option<&V> {
        arena
            .active_branches(time)
            .find_map(|(branch, tick)| self.latest_on(branch, tick))
    }

    /// Flatten into records ordered by branch then tick.
    pub fn records(&self) -> Vec<Record<V>> {
        let mut branches: Vec<_> = self.branches.iter().collect();
        branches.sort_by(|a, b| a.0.cmp(b.0));
        branches
            .into_iter()
            .flat_map(|(branch, ticks)| {
                ticks.iter().map(move |(tick, value)| Record {
                    branch: branch.clone(),
                    tick: *tick,
                    value: value.clone(),
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.values().all(BTreeMap::is_empty)
    }
}
