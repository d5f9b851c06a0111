//! Store definitions: what a store is called, how its entries are laid out and
//! where its sources live.
//!
//! Every store variant (environment, flat, sectioned, sectioned-flattened) is a
//! `StoreKind` value; nothing about the variant is expressed through types.

use crate::error::{ConfigurationError, Result};
use crate::flatten;
use crate::grammar::{IdentKind, KeyGrammar, LengthTier};
use crate::source::parser::ParseOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Names that would clash with template and manifest files sitting beside sources.
pub const RESERVED_STORE_NAMES: &[&str] = &["example", "packages"];

pub const DEFAULT_DELIMITER: &str = "::";
pub const DEFAULT_EXTENSION: &str = "ini";

/// Conventional parent directory of source files inside vendor packages.
pub const DEFAULT_VENDOR_SUBDIR: &str = "ini";

/// Whether keys are used as written or normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyMode {
    #[default]
    DomainSectioned,
    /// Keys are rewritten with `key_convert` (environment-variable style).
    Flat,
}

/// Where entries come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Files,
    Environment { prefix: String },
}

/// How merged entries map onto store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLayout {
    /// key -> value
    Flat,
    /// section -> associative value holding the section's keys
    Sectioned,
    /// `section + delimiter + key` -> value
    Flattened { delimiter: String },
}

/// Capabilities and layout of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKind {
    pub use_sections: bool,
    pub flatten_delimiter: Option<String>,
    pub key_mode: KeyMode,
    pub source: SourceKind,
    pub length_tier: LengthTier,
    /// The backend must support candidate staging.
    pub staged: bool,
}

impl StoreKind {
    pub fn flat() -> Self {
        Self {
            use_sections: false,
            flatten_delimiter: None,
            key_mode: KeyMode::DomainSectioned,
            source: SourceKind::Files,
            length_tier: LengthTier::Short,
            staged: false,
        }
    }

    pub fn sectioned() -> Self {
        Self {
            use_sections: true,
            ..Self::flat()
        }
    }

    pub fn sectioned_flattened() -> Self {
        Self {
            use_sections: true,
            flatten_delimiter: Some(DEFAULT_DELIMITER.to_string()),
            ..Self::flat()
        }
    }

    pub fn environment(prefix: impl Into<String>) -> Self {
        Self {
            key_mode: KeyMode::Flat,
            source: SourceKind::Environment {
                prefix: prefix.into(),
            },
            ..Self::flat()
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.flatten_delimiter = Some(delimiter.into());
        self
    }

    pub fn with_length_tier(mut self, tier: LengthTier) -> Self {
        self.length_tier = tier;
        self
    }

    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn require_staging(mut self) -> Self {
        self.staged = true;
        self
    }

    pub fn layout(&self) -> EntryLayout {
        match (self.use_sections, &self.flatten_delimiter) {
            (false, _) => EntryLayout::Flat,
            (true, None) => EntryLayout::Sectioned,
            (true, Some(delimiter)) => EntryLayout::Flattened {
                delimiter: delimiter.clone(),
            },
        }
    }

    /// Grammar for store names and sections.
    pub fn name_grammar(&self) -> KeyGrammar {
        KeyGrammar::standard(self.length_tier)
    }

    /// Grammar for keys and composite keys.
    pub fn key_grammar(&self) -> KeyGrammar {
        KeyGrammar::extended(self.length_tier)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(delimiter) = &self.flatten_delimiter {
            flatten::validate_delimiter(delimiter)?;
        }
        Ok(())
    }
}

/// One named source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePath {
    pub name: String,
    pub dir: PathBuf,
}

impl SourcePath {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.dir.as_os_str().is_empty()
    }
}

/// Which path names a store accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicy {
    /// Exactly these names, merged in this order.
    Fixed(Vec<String>),
    /// Any caller-supplied names, merged in insertion order.
    Open,
}

/// Options for locating sources inside vendor packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub vendor_root: Option<PathBuf>,
    /// Required immediate parent directory name of discovered files.
    pub parent_dir: Option<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            vendor_root: None,
            parent_dir: Some(DEFAULT_VENDOR_SUBDIR.to_string()),
        }
    }
}

/// Full description of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreDefinition {
    name: String,
    kind: StoreKind,
    path_policy: PathPolicy,
    default_paths: Vec<SourcePath>,
    path_overrides: Vec<SourcePath>,
    extension: String,
    recursive: bool,
    parse: ParseOptions,
    discovery: DiscoveryOptions,
}

impl StoreDefinition {
    pub fn new(name: impl Into<String>, kind: StoreKind) -> Self {
        Self {
            name: name.into(),
            kind,
            path_policy: PathPolicy::Open,
            default_paths: Vec::new(),
            path_overrides: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            recursive: false,
            parse: ParseOptions::default(),
            discovery: DiscoveryOptions::default(),
        }
    }

    /// Restrict path names to `names`, merged in the given order.
    pub fn with_fixed_paths(mut self, names: &[&str]) -> Self {
        self.path_policy = PathPolicy::Fixed(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Declare a default location for a path name.
    pub fn with_default_path(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.default_paths.push(SourcePath::new(name, dir));
        self
    }

    /// Caller override; replaces a default of the same name.
    pub fn with_path(mut self, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.path_overrides.push(SourcePath::new(name, dir));
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    pub fn with_vendor_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.discovery.vendor_root = Some(root.into());
        self
    }

    pub fn with_vendor_subdir(mut self, subdir: Option<String>) -> Self {
        self.discovery.parent_dir = subdir;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StoreKind {
        &self.kind
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn parse_options(&self) -> ParseOptions {
        self.parse
    }

    pub fn discovery(&self) -> &DiscoveryOptions {
        &self.discovery
    }

    pub fn path_policy(&self) -> &PathPolicy {
        &self.path_policy
    }

    /// Check the name, the kind and every declared path name.
    pub fn validate(&self) -> Result<()> {
        self.kind
            .name_grammar()
            .check(IdentKind::StoreName, &self.name)?;
        if RESERVED_STORE_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&self.name))
        {
            return Err(ConfigurationError::ReservedStoreName(self.name.clone()).into());
        }
        self.kind.validate()?;

        if let PathPolicy::Fixed(allowed) = &self.path_policy {
            for path in self.default_paths.iter().chain(&self.path_overrides) {
                if !allowed.contains(&path.name) {
                    return Err(ConfigurationError::UnknownPathName {
                        store: self.name.clone(),
                        name: path.name.clone(),
                        allowed: allowed.join(", "),
                    }
                    .into());
                }
            }
        }

        if self.kind.source == SourceKind::Files && self.merged_paths().is_empty() {
            return Err(ConfigurationError::NoPaths {
                store: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Defaults combined with overrides, in merge order, blank locations dropped.
    pub fn merged_paths(&self) -> Vec<SourcePath> {
        let mut merged: Vec<SourcePath> = Vec::new();
        for path in self.default_paths.iter().chain(&self.path_overrides) {
            match merged.iter_mut().find(|p| p.name == path.name) {
                Some(existing) => existing.dir = path.dir.clone(),
                None => merged.push(path.clone()),
            }
        }

        if let PathPolicy::Fixed(order) = &self.path_policy {
            merged.sort_by_key(|p| order.iter().position(|n| n == &p.name));
        }
        merged.retain(|p| !p.is_blank());
        merged
    }

    /// Merged paths checked against the filesystem and canonicalized.
    pub fn resolve_paths(&self) -> Result<Vec<SourcePath>> {
        let merged = self.merged_paths();
        if merged.is_empty() {
            return Err(ConfigurationError::NoPaths {
                store: self.name.clone(),
            }
            .into());
        }

        merged
            .into_iter()
            .map(|path| {
                let dir = check_dir(&path.name, &path.dir)?;
                Ok(SourcePath::new(path.name, dir))
            })
            .collect()
    }
}

fn check_dir(name: &str, dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        return Err(ConfigurationError::MissingPath {
            name: name.to_string(),
            path: dir.to_path_buf(),
        }
        .into());
    }
    if !dir.is_dir() {
        return Err(ConfigurationError::NotADirectory {
            name: name.to_string(),
            path: dir.to_path_buf(),
        }
        .into());
    }
    dunce::canonicalize(dir).map_err(|source| crate::error::Error::Io {
        path: dir.to_path_buf(),
        source,
    })
}
