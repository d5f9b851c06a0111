//! Durable sled-backed store.
//!
//! Every store owns a set of sled trees:
//! - `{name}/meta`: the active generation pointer and the generation counter
//! - `{name}/gen-N`: one tree per generation of published data
//! - `{name}/backups`: backup label -> [`BackupRecord`]
//!
//! A candidate is written into a fresh generation tree. Promotion is a single
//! insert of the active pointer, so readers see either the old generation or
//! the new one, never a mix.

use crate::error::StorageError;
use crate::store::{BackupRecord, Candidate, CandidateStaging, Entries, KeyValueStore};
use serde_json::Value;
use sled::{Db, Tree};
use std::io;
use std::path::Path;
use tracing::{debug, info};

const META_ACTIVE: &[u8] = b"active";
const META_GENERATION: &[u8] = b"generation";

/// Backups kept per store unless configured otherwise.
pub const DEFAULT_BACKUP_RETENTION: usize = 3;

/// Sled implementation of [`KeyValueStore`] with candidate staging.
pub struct SledStore {
    name: String,
    db: Db,
    meta: Tree,
    backups: Tree,
    retention: usize,
}

impl SledStore {
    /// Open the store `name` inside an already opened database.
    pub fn open(db: Db, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        let meta = db
            .open_tree(format!("{}/meta", name))
            .map_err(to_storage_io)?;
        let backups = db
            .open_tree(format!("{}/backups", name))
            .map_err(to_storage_io)?;
        Ok(Self {
            name,
            db,
            meta,
            backups,
            retention: DEFAULT_BACKUP_RETENTION,
        })
    }

    /// Open (or create) a database at `path` and the store `name` inside it.
    pub fn open_path<P: AsRef<Path>>(path: P, name: impl Into<String>) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::open(db, name)
    }

    /// Keep at most `retention` backups; older generations are dropped.
    pub fn with_backup_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn generation_tree_name(&self, generation: u64) -> String {
        format!("{}/gen-{}", self.name, generation)
    }

    fn active_generation(&self) -> Result<Option<u64>, StorageError> {
        match self.meta.get(META_ACTIVE).map_err(to_storage_io)? {
            Some(raw) => Ok(Some(decode_u64(&raw)?)),
            None => Ok(None),
        }
    }

    fn active(&self) -> Result<Option<Tree>, StorageError> {
        match self.active_generation()? {
            Some(generation) => Ok(Some(self.open_generation(generation)?)),
            None => Ok(None),
        }
    }

    /// Active tree, creating the first generation when there is none.
    fn active_or_create(&self) -> Result<Tree, StorageError> {
        if let Some(tree) = self.active()? {
            return Ok(tree);
        }
        let generation = self.next_generation()?;
        let tree = self.open_generation(generation)?;
        self.meta
            .insert(META_ACTIVE, generation.to_be_bytes().to_vec())
            .map_err(to_storage_io)?;
        debug!(store = %self.name, generation, "Created first generation");
        Ok(tree)
    }

    fn open_generation(&self, generation: u64) -> Result<Tree, StorageError> {
        self.db
            .open_tree(self.generation_tree_name(generation))
            .map_err(to_storage_io)
    }

    fn next_generation(&self) -> Result<u64, StorageError> {
        let updated = self
            .meta
            .update_and_fetch(META_GENERATION, |old| {
                let next = old
                    .and_then(|raw| raw.try_into().ok().map(u64::from_be_bytes))
                    .map_or(0, |n| n + 1);
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(to_storage_io)?;
        match updated {
            Some(raw) => decode_u64(&raw),
            None => Err(StorageError::Backend(
                "generation counter vanished during update".to_string(),
            )),
        }
    }

    fn drop_generation(&self, generation: u64) -> Result<(), StorageError> {
        self.db
            .drop_tree(self.generation_tree_name(generation))
            .map_err(to_storage_io)?;
        Ok(())
    }

    fn record_backup(&self, record: &BackupRecord) -> Result<(), StorageError> {
        if let Some(previous) = self.read_backup(&record.label)? {
            self.drop_generation(previous.generation)?;
        }
        let value = serde_json::to_vec(record).map_err(|e| to_storage_data(&record.label, e))?;
        self.backups
            .insert(record.label.as_bytes(), value)
            .map_err(to_storage_io)?;
        self.enforce_retention()
    }

    fn read_backup(&self, label: &str) -> Result<Option<BackupRecord>, StorageError> {
        let Some(raw) = self.backups.get(label.as_bytes()).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&raw).map_err(|e| to_storage_data(label, e))?;
        Ok(Some(record))
    }

    fn enforce_retention(&self) -> Result<(), StorageError> {
        let records = self.list_backups()?;
        if records.len() <= self.retention {
            return Ok(());
        }
        let excess = records.len() - self.retention;
        for record in records.into_iter().take(excess) {
            self.drop_generation(record.generation)?;
            self.backups
                .remove(record.label.as_bytes())
                .map_err(to_storage_io)?;
            debug!(store = %self.name, label = %record.label, "Dropped expired backup");
        }
        Ok(())
    }

    fn list_backups(&self) -> Result<Vec<BackupRecord>, StorageError> {
        let mut out = Vec::new();
        for item in self.backups.iter() {
            let (key, value) = item.map_err(to_storage_io)?;
            let label = String::from_utf8_lossy(&key);
            let record: BackupRecord =
                serde_json::from_slice(&value).map_err(|e| to_storage_data(&label, e))?;
            out.push(record);
        }
        out.sort_by_key(|r| r.generation);
        Ok(out)
    }

    /// Contents of a retained backup.
    pub fn backup_entries(&self, label: &str) -> Result<Option<Entries>, StorageError> {
        match self.read_backup(label)? {
            Some(record) => Ok(Some(read_all(&self.open_generation(record.generation)?)?)),
            None => Ok(None),
        }
    }
}

impl KeyValueStore for SledStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let Some(tree) = self.active()? else {
            return Ok(None);
        };
        match tree.get(key.as_bytes()).map_err(to_storage_io)? {
            Some(raw) => Ok(Some(decode_value(key, &raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<bool, StorageError> {
        let tree = self.active_or_create()?;
        let raw = serde_json::to_vec(value).map_err(|e| to_storage_data(key, e))?;
        tree.insert(key.as_bytes(), raw).map_err(to_storage_io)?;
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let Some(tree) = self.active()? else {
            return Ok(false);
        };
        Ok(tree.remove(key.as_bytes()).map_err(to_storage_io)?.is_some())
    }

    fn has(&self, key: &str) -> Result<bool, StorageError> {
        let Some(tree) = self.active()? else {
            return Ok(false);
        };
        tree.contains_key(key.as_bytes()).map_err(to_storage_io)
    }

    fn set_multiple(&self, entries: &[(String, Value)]) -> Result<bool, StorageError> {
        let tree = self.active_or_create()?;
        write_batch(&tree, entries)?;
        Ok(true)
    }

    fn entries(&self) -> Result<Entries, StorageError> {
        match self.active()? {
            Some(tree) => read_all(&tree),
            None => Ok(Vec::new()),
        }
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        match self.active()? {
            Some(tree) => Ok(tree.is_empty()),
            None => Ok(true),
        }
    }

    fn is_new(&self) -> Result<bool, StorageError> {
        Ok(self.active_generation()?.is_none())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if let Some(tree) = self.active()? {
            tree.clear().map_err(to_storage_io)?;
        }
        Ok(())
    }

    fn staging(&self) -> Option<&dyn CandidateStaging> {
        Some(self)
    }
}

impl CandidateStaging for SledStore {
    fn open_candidate(&self) -> Result<Box<dyn Candidate + '_>, StorageError> {
        let generation = self.next_generation()?;
        let tree = self.open_generation(generation)?;
        // A crashed earlier attempt may have left data under this name.
        tree.clear().map_err(to_storage_io)?;
        debug!(store = %self.name, generation, "Opened candidate generation");
        Ok(Box::new(SledCandidate {
            store: self,
            generation,
            tree,
        }))
    }

    fn backups(&self) -> Result<Vec<BackupRecord>, StorageError> {
        self.list_backups()
    }
}

struct SledCandidate<'a> {
    store: &'a SledStore,
    generation: u64,
    tree: Tree,
}

impl Candidate for SledCandidate<'_> {
    fn set_multiple(&mut self, entries: &[(String, Value)]) -> Result<bool, StorageError> {
        write_batch(&self.tree, entries)?;
        Ok(true)
    }

    fn promote(self: Box<Self>, label: &str) -> Result<(), StorageError> {
        let store = self.store;
        self.tree.flush().map_err(to_storage_io)?;
        let previous = store.active_generation()?;

        store
            .meta
            .insert(META_ACTIVE, self.generation.to_be_bytes().to_vec())
            .map_err(to_storage_io)?;

        if let Some(previous) = previous {
            let entries = store.open_generation(previous)?.len();
            store.record_backup(&BackupRecord {
                label: label.to_string(),
                generation: previous,
                entries,
                created_at: chrono::Utc::now().to_rfc3339(),
            })?;
        }
        store.flush()?;
        info!(
            store = %store.name,
            generation = self.generation,
            backup = label,
            "Promoted candidate"
        );
        Ok(())
    }

    fn discard(self: Box<Self>) -> Result<(), StorageError> {
        self.store.drop_generation(self.generation)?;
        debug!(store = %self.store.name, generation = self.generation, "Discarded candidate");
        Ok(())
    }
}

fn write_batch(tree: &Tree, entries: &[(String, Value)]) -> Result<(), StorageError> {
    let mut batch = sled::Batch::default();
    for (key, value) in entries {
        let raw = serde_json::to_vec(value).map_err(|e| to_storage_data(key, e))?;
        batch.insert(key.as_bytes(), raw);
    }
    tree.apply_batch(batch).map_err(to_storage_io)
}

fn read_all(tree: &Tree) -> Result<Entries, StorageError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (key, raw) = item.map_err(to_storage_io)?;
        let key = String::from_utf8(key.to_vec()).map_err(|e| StorageError::CorruptValue {
            key: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            reason: "key is not UTF-8".to_string(),
        })?;
        let value = decode_value(&key, &raw)?;
        out.push((key, value));
    }
    Ok(out)
}

fn decode_value(key: &str, raw: &[u8]) -> Result<Value, StorageError> {
    serde_json::from_slice(raw).map_err(|e| to_storage_data(key, e))
}

fn decode_u64(raw: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| StorageError::CorruptValue {
        key: "generation".to_string(),
        reason: format!("expected 8 bytes, found {}", raw.len()),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(key: &str, err: serde_json::Error) -> StorageError {
    StorageError::CorruptValue {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
