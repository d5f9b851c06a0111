//! Key/value store contract
//!
//! The build pipeline publishes into any [`KeyValueStore`]. Backends that can
//! stage a full rebuild beside the live data also expose [`CandidateStaging`];
//! those get the safe-rebuild protocol, the rest are cleared and rebuilt.

pub mod memory;
pub mod persistence;

pub use memory::MemoryStore;
pub use persistence::SledStore;

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Published key/value entries, in key order.
pub type Entries = Vec<(String, Value)>;

/// Store interface consumed by the facade and the build pipeline.
///
/// Write methods return `Ok(false)` when the backend refuses a write without
/// failing outright (for instance a capacity limit).
pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: &Value) -> Result<bool, StorageError>;
    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;
    fn has(&self, key: &str) -> Result<bool, StorageError>;

    fn get_multiple(&self, keys: &[String]) -> Result<Vec<Option<Value>>, StorageError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn set_multiple(&self, entries: &[(String, Value)]) -> Result<bool, StorageError>;

    fn entries(&self) -> Result<Entries, StorageError>;
    fn is_empty(&self) -> Result<bool, StorageError>;

    /// True until the store has held published data.
    fn is_new(&self) -> Result<bool, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;

    /// Candidate staging support, if any.
    fn staging(&self) -> Option<&dyn CandidateStaging> {
        None
    }
}

/// Optional extension: build into a candidate, then promote it.
pub trait CandidateStaging {
    fn open_candidate(&self) -> Result<Box<dyn Candidate + '_>, StorageError>;

    /// Backups retained by earlier promotions, oldest first.
    fn backups(&self) -> Result<Vec<BackupRecord>, StorageError>;
}

/// A staged rebuild. Dropping it without promoting leaves live data alone.
pub trait Candidate {
    fn set_multiple(&mut self, entries: &[(String, Value)]) -> Result<bool, StorageError>;

    /// Make the candidate live, keeping the previous contents as `label`.
    fn promote(self: Box<Self>, label: &str) -> Result<(), StorageError>;

    fn discard(self: Box<Self>) -> Result<(), StorageError>;
}

/// Previously live contents kept after a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub label: String,
    pub generation: u64,
    pub entries: usize,
    pub created_at: String,
}
