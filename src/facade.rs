//! Store Facade
//!
//! [`ConfigStore`] is what application code holds: one named store, its
//! definition and the backend it publishes into. Keys are checked against the
//! store's grammar before the backend sees them.

use crate::build::{BuildPipeline, RefreshOptions, RefreshOutcome};
use crate::definition::{EntryLayout, StoreDefinition};
use crate::error::{ConfigurationError, Error, Result};
use crate::export::{write_export, ExportOptions, ExportSource};
use crate::flatten::{flatten_key, split_key, unflatten_entries};
use crate::grammar::IdentKind;
use crate::merge::Collection;
use crate::report::BuildReporter;
use crate::store::{BackupRecord, Entries, KeyValueStore};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A configuration store bound to its backend.
pub struct ConfigStore {
    definition: StoreDefinition,
    backend: Box<dyn KeyValueStore>,
    reporter: Option<Arc<dyn BuildReporter>>,
}

/// Where a section-aware operation lands in the backend.
enum Slot {
    /// Plain store key.
    Key(String),
    /// Key inside the associative value stored under a section.
    InSection { section: String, key: String },
}

impl ConfigStore {
    /// Open a store without a reporter; an empty or new backend is built
    /// immediately.
    pub fn open(definition: StoreDefinition, backend: Box<dyn KeyValueStore>) -> Result<Self> {
        Self::open_with(definition, backend, None, RefreshOptions::default())
    }

    /// Open a store. When the backend is empty or new, a cold build runs with
    /// `options`; otherwise the published data is used as is.
    pub fn open_with(
        definition: StoreDefinition,
        backend: Box<dyn KeyValueStore>,
        reporter: Option<Arc<dyn BuildReporter>>,
        options: RefreshOptions,
    ) -> Result<Self> {
        definition.validate()?;
        if definition.kind().staged && backend.staging().is_none() {
            return Err(Error::StoreContract {
                store: definition.name().to_string(),
                reason: "the store kind requires candidate staging".to_string(),
            });
        }

        let store = Self {
            definition,
            backend,
            reporter,
        };
        if store.backend.is_new()? || store.backend.is_empty()? {
            debug!(store = store.name(), "Backend holds no data; building");
            store.refresh(options)?;
        }
        Ok(store)
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Copy of the definition this store was opened with.
    pub fn definition(&self) -> StoreDefinition {
        self.definition.clone()
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    fn layout(&self) -> EntryLayout {
        self.definition.kind().layout()
    }

    /// Validate a raw store key for this layout.
    fn check_key(&self, key: &str) -> Result<()> {
        let kind = self.definition.kind();
        match self.layout() {
            EntryLayout::Flat => kind.key_grammar().check(IdentKind::Key, key)?,
            EntryLayout::Sectioned => kind.name_grammar().check(IdentKind::Section, key)?,
            EntryLayout::Flattened { delimiter } => {
                let Some((section, _)) = split_key(key, &delimiter) else {
                    return Err(ConfigurationError::SectionRequired {
                        store: self.name().to_string(),
                        key: key.to_string(),
                    }
                    .into());
                };
                kind.name_grammar().check(IdentKind::Section, section)?;
                kind.key_grammar().check(IdentKind::CompositeKey, key)?;
            }
        }
        Ok(())
    }

    fn slot(&self, section: &str, key: &str) -> Result<Slot> {
        let kind = self.definition.kind();
        match self.layout() {
            EntryLayout::Flat => Err(ConfigurationError::SectionsUnsupported {
                store: self.name().to_string(),
            }
            .into()),
            EntryLayout::Sectioned => {
                kind.name_grammar().check(IdentKind::Section, section)?;
                kind.key_grammar().check(IdentKind::Key, key)?;
                Ok(Slot::InSection {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
            EntryLayout::Flattened { delimiter } => {
                kind.name_grammar().check(IdentKind::Section, section)?;
                Ok(Slot::Key(flatten_key(
                    section,
                    key,
                    &delimiter,
                    &kind.key_grammar(),
                )?))
            }
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        if self.backend.set(key, value)? {
            Ok(())
        } else {
            Err(Error::StoreWrite {
                store: self.name().to_string(),
                key: key.to_string(),
            })
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_key(key)?;
        Ok(self.backend.get(key)?)
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.check_key(key)?;
        Ok(self.backend.has(key)?)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_key(key)?;
        self.write(key, &value)
    }

    /// Returns whether the key existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.check_key(key)?;
        Ok(self.backend.delete(key)?)
    }

    pub fn get_multiple(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        for key in keys {
            self.check_key(key)?;
        }
        Ok(self.backend.get_multiple(keys)?)
    }

    /// Every key is validated before anything is written.
    pub fn set_multiple(&self, entries: &[(String, Value)]) -> Result<()> {
        for (key, _) in entries {
            self.check_key(key)?;
        }
        if self.backend.set_multiple(entries)? {
            Ok(())
        } else {
            Err(Error::StoreWrite {
                store: self.name().to_string(),
                key: format!("{} entries", entries.len()),
            })
        }
    }

    pub fn get_in(&self, section: &str, key: &str) -> Result<Option<Value>> {
        match self.slot(section, key)? {
            Slot::Key(composite) => Ok(self.backend.get(&composite)?),
            Slot::InSection { section, key } => Ok(self
                .backend
                .get(&section)?
                .and_then(|value| value.get(&key).cloned())),
        }
    }

    pub fn has_in(&self, section: &str, key: &str) -> Result<bool> {
        Ok(self.get_in(section, key)?.is_some())
    }

    pub fn set_in(&self, section: &str, key: &str, value: Value) -> Result<()> {
        match self.slot(section, key)? {
            Slot::Key(composite) => self.write(&composite, &value),
            Slot::InSection { section, key } => {
                let mut keys = match self.backend.get(&section)? {
                    Some(Value::Object(keys)) => keys,
                    _ => Collection::new(),
                };
                keys.insert(key, value);
                self.write(&section, &Value::Object(keys))
            }
        }
    }

    /// Returns whether the key existed.
    pub fn delete_in(&self, section: &str, key: &str) -> Result<bool> {
        match self.slot(section, key)? {
            Slot::Key(composite) => Ok(self.backend.delete(&composite)?),
            Slot::InSection { section, key } => {
                let Some(Value::Object(mut keys)) = self.backend.get(&section)? else {
                    return Ok(false);
                };
                if keys.remove(&key).is_none() {
                    return Ok(false);
                }
                self.write(&section, &Value::Object(keys))?;
                Ok(true)
            }
        }
    }

    /// Set `item` inside the associative value stored under `key`, creating
    /// the associative value when the key is absent.
    pub fn set_item(&self, key: &str, item: &str, value: Value) -> Result<()> {
        self.check_key(key)?;
        let updated = with_item(key, self.backend.get(key)?, item, value)?;
        self.write(key, &updated)
    }

    /// Section-aware [`set_item`](Self::set_item).
    pub fn set_item_in(&self, section: &str, key: &str, item: &str, value: Value) -> Result<()> {
        let current = self.get_in(section, key)?;
        let updated = with_item(key, current, item, value)?;
        self.set_in(section, key, updated)
    }

    /// Section names currently published, in store order.
    pub fn sections(&self) -> Result<Vec<String>> {
        match self.layout() {
            EntryLayout::Flat => Err(ConfigurationError::SectionsUnsupported {
                store: self.name().to_string(),
            }
            .into()),
            EntryLayout::Sectioned => Ok(self
                .backend
                .entries()?
                .into_iter()
                .map(|(section, _)| section)
                .collect()),
            EntryLayout::Flattened { delimiter } => {
                let mut sections: Vec<String> = Vec::new();
                for (key, _) in self.backend.entries()? {
                    if let Some((section, _)) = split_key(&key, &delimiter) {
                        if !sections.iter().any(|s| s == section) {
                            sections.push(section.to_string());
                        }
                    }
                }
                Ok(sections)
            }
        }
    }

    /// Raw published entries.
    pub fn entries(&self) -> Result<Entries> {
        Ok(self.backend.entries()?)
    }

    /// Published entries regrouped by section.
    pub fn collection(&self) -> Result<Collection> {
        Ok(unflatten_entries(self.backend.entries()?, &self.layout()))
    }

    /// Rebuild from sources.
    pub fn refresh(&self, options: RefreshOptions) -> Result<RefreshOutcome> {
        info!(store = self.name(), allow_none = options.allow_none, "Refreshing store");
        BuildPipeline::new(&self.definition, self.reporter.as_deref())
            .publish(self.backend.as_ref(), options)
    }

    /// Export as JSON to `target`; returns the number of bytes written.
    pub fn export(&self, target: &Path, options: &ExportOptions) -> Result<usize> {
        let collection = match options.source {
            ExportSource::Published => self.collection()?,
            ExportSource::Sources => {
                BuildPipeline::new(&self.definition, self.reporter.as_deref())
                    .collect(RefreshOptions::default().allow_none(true))?
                    .collection
            }
        };
        let written = write_export(target, &collection, options)?;
        info!(store = self.name(), target = %target.display(), bytes = written, "Exported store");
        Ok(written)
    }

    /// Backups kept by promotions; empty for backends without staging.
    pub fn backups(&self) -> Result<Vec<BackupRecord>> {
        match self.backend.staging() {
            Some(staging) => Ok(staging.backups()?),
            None => Ok(Vec::new()),
        }
    }
}

fn with_item(key: &str, current: Option<Value>, item: &str, value: Value) -> Result<Value> {
    let mut map = match current {
        None | Some(Value::Null) => Collection::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::NotAssociative {
                key: key.to_string(),
                item: item.to_string(),
            })
        }
    };
    map.insert(item.to_string(), value);
    Ok(Value::Object(map))
}
