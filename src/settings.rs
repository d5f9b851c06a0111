//! Application settings
//!
//! Loaded with the `config` crate, lowest precedence first:
//! 1. built-in defaults
//! 2. global file: `<config dir>/layerstore/settings.toml`
//! 3. workspace file: `./layerstore.toml`
//! 4. an explicit `--config` file
//! 5. environment: `LAYERSTORE__DATA_DIR`, `LAYERSTORE__LOGGING__LEVEL`, ...
//!
//! ```toml
//! data_dir = ".layerstore/db"
//!
//! [stores.app]
//! layout = "flattened"
//! path_names = ["base", "override"]
//! paths = [
//!     { name = "base", dir = "config/base" },
//!     { name = "override", dir = "config/prod" },
//! ]
//! vendor_root = "vendor"
//! ```

use crate::build::RefreshOptions;
use crate::definition::{KeyMode, SourcePath, StoreDefinition, StoreKind};
use crate::error::{Error, Result};
use crate::facade::ConfigStore;
use crate::grammar::LengthTier;
use crate::logging::LoggingConfig;
use crate::registry::StoreRegistry;
use crate::report::BuildReporter;
use crate::source::ParseOptions;
use crate::store::SledStore;
use crate::store::persistence::DEFAULT_BACKUP_RETENTION;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Workspace settings file name.
pub const WORKSPACE_FILE: &str = "layerstore.toml";

/// Environment prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "LAYERSTORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Location of the durable store database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_retention")]
    pub backup_retention: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stores: BTreeMap<String, StoreSettings>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".layerstore").join("db")
}

fn default_retention() -> usize {
    DEFAULT_BACKUP_RETENTION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_retention: default_retention(),
            logging: LoggingConfig::default(),
            stores: BTreeMap::new(),
        }
    }
}

/// Store layout as written in settings files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutSetting {
    Flat,
    Sectioned,
    #[default]
    Flattened,
    Environment,
}

impl LayoutSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutSetting::Flat => "flat",
            LayoutSetting::Sectioned => "sectioned",
            LayoutSetting::Flattened => "flattened",
            LayoutSetting::Environment => "environment",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub layout: LayoutSetting,
    pub delimiter: Option<String>,
    #[serde(default)]
    pub key_mode: KeyMode,
    /// Variable prefix for the environment layout.
    pub prefix: Option<String>,
    #[serde(default)]
    pub length_tier: LengthTier,
    #[serde(default)]
    pub staged: bool,
    /// Fixed path names in merge order. Absent means any names are allowed.
    pub path_names: Option<Vec<String>>,
    #[serde(default)]
    pub paths: Vec<SourcePath>,
    pub extension: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub parse: ParseOptions,
    pub vendor_root: Option<PathBuf>,
    /// Required parent directory of vendor sources; empty disables the check.
    pub vendor_subdir: Option<String>,
}

impl StoreSettings {
    pub fn to_definition(&self, name: &str) -> Result<StoreDefinition> {
        let mut kind = match self.layout {
            LayoutSetting::Flat => StoreKind::flat(),
            LayoutSetting::Sectioned => StoreKind::sectioned(),
            LayoutSetting::Flattened => StoreKind::sectioned_flattened(),
            LayoutSetting::Environment => {
                let prefix = self.prefix.clone().ok_or_else(|| {
                    Error::Settings(format!("store '{}' needs a prefix for the environment layout", name))
                })?;
                StoreKind::environment(prefix)
            }
        };
        if let Some(delimiter) = &self.delimiter {
            kind = kind.with_delimiter(delimiter.clone());
        }
        if self.layout != LayoutSetting::Environment {
            kind = kind.with_key_mode(self.key_mode);
        }
        kind = kind.with_length_tier(self.length_tier);
        if self.staged {
            kind = kind.require_staging();
        }

        let mut definition = StoreDefinition::new(name, kind)
            .with_recursive(self.recursive)
            .with_parse_options(self.parse);
        if let Some(names) = &self.path_names {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            definition = definition.with_fixed_paths(&names);
        }
        for path in &self.paths {
            definition = definition.with_path(path.name.clone(), path.dir.clone());
        }
        if let Some(extension) = &self.extension {
            definition = definition.with_extension(extension.clone());
        }
        if let Some(root) = &self.vendor_root {
            definition = definition.with_vendor_root(root.clone());
        }
        if let Some(subdir) = &self.vendor_subdir {
            definition = definition.with_vendor_subdir(Some(subdir.clone()).filter(|s| !s.is_empty()));
        }

        definition.validate()?;
        Ok(definition)
    }
}

impl Settings {
    pub fn store(&self, name: &str) -> Result<&StoreSettings> {
        self.stores
            .get(name)
            .ok_or_else(|| crate::error::ConfigurationError::UnknownStore(name.to_string()).into())
    }

    pub fn definition(&self, name: &str) -> Result<StoreDefinition> {
        self.store(name)?.to_definition(name)
    }

    pub fn open_database(&self) -> Result<sled::Db> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| Error::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        sled::open(&self.data_dir).map_err(|e| crate::error::StorageError::from(e).into())
    }

    /// Open one configured store inside `db`.
    pub fn open_store(
        &self,
        db: &sled::Db,
        name: &str,
        reporter: Option<Arc<dyn BuildReporter>>,
        options: RefreshOptions,
    ) -> Result<ConfigStore> {
        let definition = self.definition(name)?;
        let backend = SledStore::open(db.clone(), name)?.with_backup_retention(self.backup_retention);
        ConfigStore::open_with(definition, Box::new(backend), reporter, options)
    }

    /// Open every configured store.
    pub fn open_registry(
        &self,
        db: &sled::Db,
        reporter: Option<Arc<dyn BuildReporter>>,
    ) -> Result<StoreRegistry> {
        let mut registry = StoreRegistry::new();
        for name in self.stores.keys() {
            registry.register(self.open_store(db, name, reporter.clone(), RefreshOptions::default())?)?;
        }
        Ok(registry)
    }
}

/// Path of the global settings file, if a home directory is known.
pub fn global_settings_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "layerstore")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

/// Builds [`Settings`] from the layered sources.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    workspace: PathBuf,
    explicit: Option<PathBuf>,
    global: Option<PathBuf>,
}

impl SettingsLoader {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            explicit: None,
            global: global_settings_path(),
        }
    }

    /// Add an explicit settings file; it must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Replace the global settings file location (None disables it).
    pub fn with_global(mut self, path: Option<PathBuf>) -> Self {
        self.global = path;
        self
    }

    pub fn load(&self) -> Result<Settings> {
        let mut builder = Config::builder()
            .set_default("backup_retention", DEFAULT_BACKUP_RETENTION as u64)?;

        if let Some(global) = self.global.as_deref().filter(|p| p.exists()) {
            debug!(path = %global.display(), "Loading global settings");
            builder = builder.add_source(File::from(global).required(false));
        }

        let workspace_file = self.workspace.join(WORKSPACE_FILE);
        if workspace_file.exists() {
            debug!(path = %workspace_file.display(), "Loading workspace settings");
            builder = builder.add_source(File::from(workspace_file.as_path()).required(false));
        }

        if let Some(explicit) = &self.explicit {
            builder = builder.add_source(File::from(explicit.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

/// Load settings for the current directory.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let mut loader = SettingsLoader::new(".");
    if let Some(path) = explicit {
        loader = loader.with_file(path);
    }
    loader.load()
}
