//! JSON snapshot store for resuming a world across processes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use timeline::{BackingStore, BranchArena, BranchId, Record, Tick, Time, TimelineResult};

use super::{MemoryWorldStore, SavedTimeline, WorldStore};
use crate::error::{WorldError, WorldResult};
use crate::keys::{RulebookOverrides, WorldEntity};

/// A store kept in memory and written to one JSON file on [`flush`](WorldStore::flush).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryWorldStore,
    dirty: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    records: Vec<StoredRecord>,
    characters: BTreeMap<String, RulebookOverrides>,
    timeline: Option<SavedTimeline>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    entity: WorldEntity,
    attr: String,
    branch: BranchId,
    tick: Tick,
    value: Value,
}

impl FileStore {
    /// Open the snapshot at `path`, or start empty if there is none yet.
    pub fn open(path: impl AsRef<Path>) -> WorldResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut inner = MemoryWorldStore::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| WorldError::Store(format!("{}: {e}", path.display())))?;
            let snapshot: Snapshot = serde_json::from_str(&raw)
                .map_err(|e| WorldError::Corruption(format!("{}: {e}", path.display())))?;
            let count = snapshot.records.len();
            for record in snapshot.records {
                let time = Time::new(record.branch, record.tick);
                inner
                    .records
                    .append(&record.entity, &record.attr, &time, &record.value)?;
            }
            inner.characters = snapshot.characters;
            inner.timeline = snapshot.timeline;
            info!(path = %path.display(), records = count, "opened world snapshot");
        }
        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            records: self
                .inner
                .records
                .records()
                .into_iter()
                .map(|(entity, attr, record)| StoredRecord {
                    entity,
                    attr,
                    branch: record.branch,
                    tick: record.tick,
                    value: record.value,
                })
                .collect(),
            characters: self.inner.characters.clone(),
            timeline: self.inner.timeline.clone(),
        }
    }
}

impl BackingStore<WorldEntity, String, Value> for FileStore {
    fn load(&self, entity: &WorldEntity, attr: &String) -> TimelineResult<Vec<Record<Value>>> {
        self.inner.load(entity, attr)
    }

    fn keys(&self, entity: &WorldEntity) -> TimelineResult<Vec<String>> {
        self.inner.keys(entity)
    }

    fn append(
        &mut self,
        entity: &WorldEntity,
        attr: &String,
        time: &Time,
        value: &Value,
    ) -> TimelineResult<()> {
        self.dirty = true;
        self.inner.append(entity, attr, time, value)
    }
}

impl WorldStore for FileStore {
    fn init_character(&mut self, name: &str, rulebooks: &RulebookOverrides) -> WorldResult<()> {
        self.dirty = true;
        self.inner.init_character(name, rulebooks)
    }

    fn characters(&self) -> WorldResult<Vec<String>> {
        self.inner.characters()
    }

    fn save_timeline(&mut self, branches: &BranchArena, time: &Time) -> WorldResult<()> {
        self.dirty = true;
        self.inner.save_timeline(branches, time)
    }

    fn load_timeline(&self) -> WorldResult<Option<(BranchArena, Time)>> {
        self.inner.load_timeline()
    }

    fn flush(&mut self) -> WorldResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| WorldError::Store(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| WorldError::Store(format!("{}: {e}", parent.display())))?;
            }
        }
        fs::write(&self.path, json)
            .map_err(|e| WorldError::Store(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), records = snapshot.records.len(), "flushed world snapshot");
        self.dirty = false;
        Ok(())
    }
}
