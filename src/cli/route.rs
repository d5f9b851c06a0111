//! CLI route: single route table and run context. Dispatches to stores and presentation.

use crate::build::{BuildPipeline, RefreshOptions, RefreshOutcome};
use crate::error::{Error, Result, StorageError};
use crate::export::{ExportOptions, ExportSource};
use crate::facade::ConfigStore;
use crate::report::CollectingReporter;
use crate::settings::Settings;
use crate::source::coerce_scalar;
use crate::store::{KeyValueStore, SledStore};
use serde_json::{Number, Value};
use tracing::{debug, info, info_span};

use crate::cli::help::{command_name, command_store};
use crate::cli::parse::{Commands, ValueType};
use crate::cli::presentation::{
    format_backups, format_discovered, format_export_result, format_refresh_outcome,
    format_sections, format_store_list_json, format_store_list_text, format_value, StoreSummary,
};

/// Runtime context for CLI execution: loaded settings and the open database.
pub struct RunContext {
    settings: Settings,
    db: sled::Db,
}

impl RunContext {
    /// Open the database named by `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let db = settings.open_database()?;
        Ok(Self { settings, db })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String> {
        let span = info_span!(
            "command",
            name = command_name(command),
            store = command_store(command).unwrap_or("-")
        );
        let _guard = span.enter();

        let output = self.execute_inner(command)?;
        self.db
            .flush()
            .map_err(|e| Error::Storage(StorageError::from(e)))?;
        Ok(output)
    }

    fn execute_inner(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Get {
                store,
                key,
                section,
                format,
            } => self.handle_get(store, key.as_deref(), section.as_deref(), format),
            Commands::Set {
                store,
                key,
                value,
                section,
                value_type,
            } => {
                let value = parse_value(value, *value_type)?;
                let config = self.open(store)?;
                match section {
                    Some(section) => config.set_in(section, key, value)?,
                    None => config.set(key, value)?,
                }
                Ok(format!("Set {} in '{}'", target_label(section.as_deref(), key), store))
            }
            Commands::SetItem {
                store,
                key,
                item,
                value,
                section,
                value_type,
            } => {
                let value = parse_value(value, *value_type)?;
                let config = self.open(store)?;
                match section {
                    Some(section) => config.set_item_in(section, key, item, value)?,
                    None => config.set_item(key, item, value)?,
                }
                Ok(format!(
                    "Set item '{}' of {} in '{}'",
                    item,
                    target_label(section.as_deref(), key),
                    store
                ))
            }
            Commands::Delete {
                store,
                key,
                section,
                yes,
            } => self.handle_delete(store, key, section.as_deref(), *yes),
            Commands::List { format } => self.handle_list(format),
            Commands::Sections { store } => {
                let sections = self.open(store)?.sections()?;
                Ok(format_sections(store, &sections))
            }
            Commands::Refresh {
                store,
                allow_none,
                show_files,
            } => {
                let options = RefreshOptions::default()
                    .allow_none(*allow_none)
                    .verbose(*show_files);
                self.handle_refresh(store.as_deref(), options, *show_files)
            }
            Commands::Export {
                store,
                target,
                from_sources,
                pretty,
                escaped,
            } => {
                let options = ExportOptions {
                    source: if *from_sources {
                        ExportSource::Sources
                    } else {
                        ExportSource::Published
                    },
                    pretty: *pretty,
                    escaped: *escaped,
                };
                let written = self.open(store)?.export(target, &options)?;
                Ok(format_export_result(store, target, written))
            }
            Commands::Backups { store } => {
                let backups = self.open(store)?.backups()?;
                Ok(format_backups(store, &backups))
            }
        }
    }

    fn open(&self, name: &str) -> Result<ConfigStore> {
        self.settings
            .open_store(&self.db, name, None, RefreshOptions::default())
    }

    fn backend(&self, name: &str) -> Result<SledStore> {
        Ok(SledStore::open(self.db.clone(), name)?
            .with_backup_retention(self.settings.backup_retention))
    }

    fn handle_get(
        &self,
        store: &str,
        key: Option<&str>,
        section: Option<&str>,
        format: &str,
    ) -> Result<String> {
        let config = self.open(store)?;
        let value = match (section, key) {
            (Some(section), Some(key)) => config.get_in(section, key)?,
            (None, Some(key)) => config.get(key)?,
            (Some(section), None) => config.collection()?.remove(section),
            (None, None) => Some(Value::Object(config.collection()?)),
        };
        match value {
            Some(value) => format_value(&value, format),
            None if format == "json" => Ok("null".to_string()),
            None => {
                let label = match (section, key) {
                    (section, Some(key)) => target_label(section, key),
                    (Some(section), None) => format!("section '{}'", section),
                    (None, None) => "store".to_string(),
                };
                Ok(format!("{} is not set in '{}'", label, store))
            }
        }
    }

    fn handle_delete(&self, store: &str, key: &str, section: Option<&str>, yes: bool) -> Result<String> {
        let label = target_label(section, key);
        if !yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete {} from '{}'?", label, store))
                .default(false)
                .interact()
                .map_err(|e| Error::Usage(format!("Failed to get user input: {}", e)))?;

            if !confirmed {
                return Ok("Deletion cancelled".to_string());
            }
        }

        let config = self.open(store)?;
        let deleted = match section {
            Some(section) => config.delete_in(section, key)?,
            None => config.delete(key)?,
        };
        Ok(if deleted {
            format!("Deleted {} from '{}'", label, store)
        } else {
            format!("{} was not set in '{}'", label, store)
        })
    }

    /// Lists configured stores without building them.
    fn handle_list(&self, format: &str) -> Result<String> {
        let mut rows = Vec::with_capacity(self.settings.stores.len());
        for (name, store) in &self.settings.stores {
            let backend = self.backend(name)?;
            let entries = if backend.is_new()? {
                None
            } else {
                Some(backend.entries()?.len())
            };
            rows.push(StoreSummary {
                name: name.clone(),
                layout: store.layout.as_str().to_string(),
                paths: store.paths.iter().map(|p| p.name.clone()).collect(),
                vendor_root: store
                    .vendor_root
                    .as_ref()
                    .map(|root| root.display().to_string()),
                entries,
            });
        }
        if format == "json" {
            format_store_list_json(&rows)
        } else {
            Ok(format_store_list_text(&rows))
        }
    }

    /// Rebuilds each selected store in name order, stopping at the first
    /// failure. A failed warm rebuild leaves that store's live data in place.
    fn handle_refresh(
        &self,
        store: Option<&str>,
        options: RefreshOptions,
        show_files: bool,
    ) -> Result<String> {
        let names: Vec<String> = match store {
            Some(name) => vec![name.to_string()],
            None => self.settings.stores.keys().cloned().collect(),
        };
        if names.is_empty() {
            return Ok("No stores configured.".to_string());
        }

        let mut sections = Vec::new();
        for name in names {
            let definition = self.settings.definition(&name)?;
            let backend = self.backend(&name)?;
            let reporter = CollectingReporter::new();
            debug!(store = %name, "Refreshing from CLI");
            let outcome = BuildPipeline::new(&definition, Some(&reporter)).publish(&backend, options)?;

            if let RefreshOutcome::Retained { error } = outcome {
                return Err(error);
            }
            info!(store = %name, "Refresh published");
            let mut text = format_refresh_outcome(&name, &outcome);
            if show_files {
                let listing = format_discovered(&reporter.discovered());
                if !listing.is_empty() {
                    text.push('\n');
                    text.push_str(&listing);
                }
            }
            sections.push(text);
        }
        Ok(sections.join("\n\n"))
    }
}

fn target_label(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("'{}' in section '{}'", key, section),
        None => format!("'{}'", key),
    }
}

/// Interpret a command-line value.
pub fn parse_value(raw: &str, value_type: ValueType) -> Result<Value> {
    match value_type {
        ValueType::Auto => Ok(coerce_scalar(raw)),
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| Error::Usage(format!("'{}' is not an integer: {}", raw, e))),
        ValueType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Error::Usage(format!("'{}' is not a finite number", raw))),
        ValueType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::Usage(format!("'{}' is not a boolean", raw))),
        },
        ValueType::Array => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(coerce_scalar)
                .collect(),
        )),
        ValueType::Json => serde_json::from_str(raw)
            .map_err(|e| Error::Usage(format!("'{}' is not valid JSON: {}", raw, e))),
    }
}
