//! In-memory store backend.

use crate::error::StorageError;
use crate::store::{BackupRecord, Candidate, CandidateStaging, Entries, KeyValueStore};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Default)]
struct State {
    live: BTreeMap<String, Value>,
    backups: Vec<(BackupRecord, BTreeMap<String, Value>)>,
    generation: u64,
    published: bool,
}

/// Process-local store, optionally with candidate staging and a key limit.
pub struct MemoryStore {
    name: String,
    state: RwLock<State>,
    staging: bool,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(State::default()),
            staging: false,
            capacity: None,
        }
    }

    /// Enable candidate staging.
    pub fn with_staging(mut self) -> Self {
        self.staging = true;
        self
    }

    /// Refuse writes that would hold more than `capacity` keys.
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn fits(&self, len: usize) -> bool {
        self.capacity.map_or(true, |cap| len <= cap)
    }

    /// Contents of a retained backup.
    pub fn backup_entries(&self, label: &str) -> Option<Entries> {
        let state = self.state.read();
        state
            .backups
            .iter()
            .find(|(record, _)| record.label == label)
            .map(|(_, data)| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.state.read().live.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        let grows = !state.live.contains_key(key);
        if grows && !self.fits(state.live.len() + 1) {
            return Ok(false);
        }
        state.live.insert(key.to_string(), value.clone());
        state.published = true;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.state.write().live.remove(key).is_some())
    }

    fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.state.read().live.contains_key(key))
    }

    fn set_multiple(&self, entries: &[(String, Value)]) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        let added = entries
            .iter()
            .filter(|(key, _)| !state.live.contains_key(key))
            .count();
        if !self.fits(state.live.len() + added) {
            return Ok(false);
        }
        for (key, value) in entries {
            state.live.insert(key.clone(), value.clone());
        }
        state.published = true;
        Ok(true)
    }

    fn entries(&self) -> Result<Entries, StorageError> {
        let state = self.state.read();
        Ok(state
            .live
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.state.read().live.is_empty())
    }

    fn is_new(&self) -> Result<bool, StorageError> {
        Ok(!self.state.read().published)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.state.write().live.clear();
        Ok(())
    }

    fn staging(&self) -> Option<&dyn CandidateStaging> {
        if self.staging {
            Some(self)
        } else {
            None
        }
    }
}

impl CandidateStaging for MemoryStore {
    fn open_candidate(&self) -> Result<Box<dyn Candidate + '_>, StorageError> {
        Ok(Box::new(MemoryCandidate {
            store: self,
            data: BTreeMap::new(),
        }))
    }

    fn backups(&self) -> Result<Vec<BackupRecord>, StorageError> {
        Ok(self
            .state
            .read()
            .backups
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }
}

struct MemoryCandidate<'a> {
    store: &'a MemoryStore,
    data: BTreeMap<String, Value>,
}

impl Candidate for MemoryCandidate<'_> {
    fn set_multiple(&mut self, entries: &[(String, Value)]) -> Result<bool, StorageError> {
        let added = entries
            .iter()
            .filter(|(key, _)| !self.data.contains_key(key))
            .count();
        if !self.store.fits(self.data.len() + added) {
            return Ok(false);
        }
        for (key, value) in entries {
            self.data.insert(key.clone(), value.clone());
        }
        Ok(true)
    }

    fn promote(self: Box<Self>, label: &str) -> Result<(), StorageError> {
        let mut state = self.store.state.write();
        let previous = std::mem::replace(&mut state.live, self.data);
        let record = BackupRecord {
            label: label.to_string(),
            generation: state.generation,
            entries: previous.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        state.generation += 1;
        state.backups.retain(|(existing, _)| existing.label != label);
        state.backups.push((record, previous));
        state.published = true;
        Ok(())
    }

    fn discard(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
