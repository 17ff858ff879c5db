//! Branches, ticks, and the arena that ties them into a tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TimelineError, TimelineResult};

/// Discrete time step within one branch.
pub type Tick = u64;

/// Name of a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BranchId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Time {
    pub branch: BranchId,
    pub tick: Tick,
}

impl Time {
    pub fn new(branch: impl Into<BranchId>, tick: Tick) -> Self {
        Self {
            branch: branch.into(),
            tick,
        }
    }
}

impl From<(BranchId, Tick)> for Time {
    fn from((branch, tick): (BranchId, Tick)) -> Self {
        Self { branch, tick }
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.branch, self.tick)
    }
}

/// Where a branch came from and how far it has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    /// None for the root branch.
    pub parent: Option<BranchId>,
    /// Tick in the parent at which this branch diverged.
    pub fork_tick: Tick,
    /// Latest tick anything was written at on this branch.
    pub tip: Tick,
}

/// Arena of branch records indexed by id.
///
/// Parents are referenced by id rather than by pointer, so the tree is acyclic
/// by construction and serializes as a flat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchArena {
    root: BranchId,
    branches: BTreeMap<BranchId, BranchRecord>,
}

impl BranchArena {
    /// Create an arena holding only the root branch.
    pub fn new(root: impl Into<BranchId>) -> Self {
        let root = root.into();
        let mut branches = BTreeMap::new();
        branches.insert(
            root.clone(),
            BranchRecord {
                parent: None,
                fork_tick: 0,
                tip: 0,
            },
        );
        Self { root, branches }
    }

    pub fn root(&self) -> &BranchId {
        &self.root
    }

    pub fn contains(&self, branch: &BranchId) -> bool {
        self.branches.contains_key(branch)
    }

    pub fn get(&self, branch: &BranchId) -> Option<&BranchRecord> {
        self.branches.get(branch)
    }

    /// Iterate over every branch in the arena, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&BranchId, &BranchRecord)> {
        self.branches.iter()
    }

    /// Latest written tick of a branch.
    pub fn tip(&self, branch: &BranchId) -> TimelineResult<Tick> {
        self.branches
            .get(branch)
            .map(|record| record.tip)
            .ok_or_else(|| TimelineError::not_found(format!("branch {branch}")))
    }

    /// Start a new branch diverging from `parent` at `fork_tick`.
    ///
    /// The parent's tip moves up to `fork_tick`, and from then on the parent
    /// only accepts writes after it: everything up to the fork is the
    /// child's past too.
    pub fn fork(
        &mut self,
        parent: &BranchId,
        fork_tick: Tick,
        branch: BranchId,
    ) -> TimelineResult<()> {
        if !self.branches.contains_key(parent) {
            return Err(TimelineError::not_found(format!("parent branch {parent}")));
        }
        if self.branches.contains_key(&branch) {
            return Err(TimelineError::Corruption(format!(
                "branch {branch} already exists"
            )));
        }
        if let Some(record) = self.branches.get_mut(parent) {
            record.tip = record.tip.max(fork_tick);
        }
        self.branches.insert(
            branch,
            BranchRecord {
                parent: Some(parent.clone()),
                fork_tick,
                tip: fork_tick,
            },
        );
        Ok(())
    }

    /// Fail unless `time` is at or past the tip of its branch and after
    /// every tick a child branch forked from.
    pub fn check_writable(&self, time: &Time) -> TimelineResult<()> {
        let tip = self.tip(&time.branch)?;
        if time.tick < tip {
            return Err(TimelineError::BehindTip {
                branch: time.branch.clone(),
                tick: time.tick,
                tip,
            });
        }
        let latest_child = self
            .branches
            .iter()
            .filter(|(_, record)| record.parent.as_ref() == Some(&time.branch))
            .max_by_key(|(_, record)| record.fork_tick);
        if let Some((child, record)) = latest_child {
            if time.tick <= record.fork_tick {
                return Err(TimelineError::ForkedPast {
                    branch: time.branch.clone(),
                    tick: time.tick,
                    child: child.clone(),
                    fork_tick: record.fork_tick,
                });
            }
        }
        Ok(())
    }

    /// Move the tip of a branch forward to `tick`, after a successful write.
    pub fn advance_tip(&mut self, time: &Time) -> TimelineResult<()> {
        self.check_writable(time)?;
        if let Some(record) = self.branches.get_mut(&time.branch) {
            record.tip = time.tick;
        }
        Ok(())
    }

    /// Walk from `time` up through the ancestors of its branch.
    ///
    /// Each ancestor is visited at the tick where its child forked off, or at
    /// the query tick if that is earlier, so a query before a fork sees the
    /// parent exactly as it was.
    pub fn active_branches<'a>(&'a self, time: &Time) -> ActiveBranches<'a> {
        ActiveBranches {
            arena: self,
            next: self
                .branches
                .get_key_value(&time.branch)
                .map(|(id, _)| (id, time.tick)),
        }
    }

    /// Whether `ancestor` is `branch` or lies on its path to the root.
    pub fn is_ancestor(&self, ancestor: &BranchId, branch: &BranchId) -> bool {
        let mut current = Some(branch);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.branches.get(id).and_then(|r| r.parent.as_ref());
        }
        false
    }
}

/// Iterator over `(branch, tick)` pairs from a branch to the root.
pub struct ActiveBranches<'a> {
    arena: &'a BranchArena,
    next: Option<(&'a BranchId, Tick)>,
}

impl<'a> Iterator for ActiveBranches<'a> {
    type Item = (&'a BranchId, Tick);

    fn next(&mut self) -> Option<Self::Item> {
        let (branch, tick) = self.next.take()?;
        if let Some(record) = self.arena.branches.get(branch) {
            if let Some(parent) = &record.parent {
                if let Some((parent_id, _)) = self.arena.branches.get_key_value(parent) {
                    self.next = Some((parent_id, tick.min(record.fork_tick)));
                }
            }
        }
        Some((branch, tick))
    }
}
