//! Merge rules for parsed sources.
//!
//! Three strengths, from strictest to laxest:
//! - [`PathMerger`]: files inside one named path. Lists append; a scalar set by
//!   two files is a [`Error::KeyCollision`].
//! - [`merge_permissive`]: discovered vendor packages. Lists append; scalars
//!   override.
//! - [`merge_override`]: named paths against each other. A key in a later path
//!   replaces the earlier value outright.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Nested section -> key -> value structure (or key -> value for flat stores).
pub type Collection = Map<String, Value>;

/// Strict merge of the files found in one named path.
pub struct PathMerger {
    path_name: String,
    sections: bool,
    merged: Collection,
    /// Which file first asserted each (section, key)
    origins: HashMap<(Option<String>, String), PathBuf>,
    files: usize,
}

impl PathMerger {
    pub fn new(path_name: impl Into<String>, sections: bool) -> Self {
        Self {
            path_name: path_name.into(),
            sections,
            merged: Collection::new(),
            origins: HashMap::new(),
            files: 0,
        }
    }

    /// Merge one parsed file. Empty units are skipped.
    pub fn add(&mut self, file: &Path, unit: Collection) -> Result<()> {
        if unit.is_empty() {
            debug!(file = %file.display(), "Skipping empty source file");
            return Ok(());
        }
        self.files += 1;

        let mut site = Site {
            path_name: &self.path_name,
            file,
            origins: &mut self.origins,
        };

        if !self.sections {
            return merge_strict(&mut self.merged, unit, None, None, &mut site);
        }

        for (section, value) in unit {
            match (self.merged.get_mut(&section), value) {
                (None, value) => {
                    if let Value::Object(keys) = &value {
                        for (key, value) in keys {
                            site.record_value(Some(&section), key, value);
                        }
                    }
                    self.merged.insert(section, value);
                }
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    merge_strict(existing, incoming, Some(&section), None, &mut site)?;
                }
                (Some(_), _) => return Err(site.collision(Some(&section), &section)),
            }
        }
        Ok(())
    }

    /// Number of files that contributed at least one entry.
    pub fn contributing_files(&self) -> usize {
        self.files
    }

    pub fn finish(self) -> Collection {
        self.merged
    }
}

struct Site<'a> {
    path_name: &'a str,
    file: &'a Path,
    origins: &'a mut HashMap<(Option<String>, String), PathBuf>,
}

impl Site<'_> {
    fn record(&mut self, section: Option<&str>, key: &str) {
        self.origins
            .entry((section.map(str::to_string), key.to_string()))
            .or_insert_with(|| self.file.to_path_buf());
    }

    /// Record `label` and, for associative values, every nested label.
    fn record_value(&mut self, section: Option<&str>, label: &str, value: &Value) {
        self.record(section, label);
        if let Value::Object(entries) = value {
            for (key, value) in entries {
                self.record_value(section, &format!("{}[{}]", label, key), value);
            }
        }
    }

    fn collision(&self, section: Option<&str>, key: &str) -> Error {
        let first = self
            .origins
            .get(&(section.map(str::to_string), key.to_string()))
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<unknown>"));
        Error::KeyCollision {
            path_name: self.path_name.to_string(),
            section: section.map(str::to_string),
            key: key.to_string(),
            first,
            second: self.file.to_path_buf(),
        }
    }
}

fn merge_strict(
    target: &mut Collection,
    incoming: Collection,
    section: Option<&str>,
    parent: Option<&str>,
    site: &mut Site<'_>,
) -> Result<()> {
    for (key, value) in incoming {
        let label = match parent {
            Some(parent) => format!("{}[{}]", parent, key),
            None => key.clone(),
        };
        match (target.get_mut(&key), value) {
            (None, value) => {
                site.record_value(section, &label, &value);
                target.insert(key, value);
            }
            (Some(Value::Array(existing)), Value::Array(items)) => {
                existing.extend(items);
            }
            (Some(Value::Object(existing)), Value::Object(entries)) => {
                merge_strict(existing, entries, section, Some(&label), site)?;
            }
            (Some(_), _) => return Err(site.collision(section, &label)),
        }
    }
    Ok(())
}

/// Lists append, associatives recurse, anything else is replaced.
pub fn merge_permissive(target: &mut Collection, incoming: Collection) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(items)) => existing.extend(items),
            (Some(Value::Object(existing)), Value::Object(entries)) => {
                merge_permissive(existing, entries)
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Later collection wins at the key level; sections are merged, not replaced.
pub fn merge_override(target: &mut Collection, incoming: Collection, sections: bool) {
    if !sections {
        for (key, value) in incoming {
            target.insert(key, value);
        }
        return;
    }

    for (section, value) in incoming {
        match (target.get_mut(&section), value) {
            (Some(Value::Object(existing)), Value::Object(keys)) => {
                for (key, value) in keys {
                    existing.insert(key, value);
                }
            }
            (_, value) => {
                target.insert(section, value);
            }
        }
    }
}

/// Number of leaf keys: keys inside sections, or top-level keys for flat stores.
pub fn count_entries(collection: &Collection, sections: bool) -> usize {
    if !sections {
        return collection.len();
    }
    collection
        .values()
        .map(|v| match v {
            Value::Object(keys) => keys.len(),
            _ => 1,
        })
        .sum()
}
