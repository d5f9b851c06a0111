//! Error types for the layered configuration store.

use crate::grammar::GrammarError;
use std::path::PathBuf;
use thiserror::Error;

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt value under key '{key}': {reason}")]
    CorruptValue { key: String, reason: String },
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Wrong or missing source locations, empty builds and manifest problems.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Store '{store}' has no source path resolving to a non-empty location")]
    NoPaths { store: String },

    #[error("Path name '{name}' is not declared by store '{store}' (allowed: {allowed})")]
    UnknownPathName {
        store: String,
        name: String,
        allowed: String,
    },

    #[error("Source path '{name}' does not exist: {}", .path.display())]
    MissingPath { name: String, path: PathBuf },

    #[error("Source path '{name}' is not a directory: {}", .path.display())]
    NotADirectory { name: String, path: PathBuf },

    #[error("No source files found for store '{store}'")]
    NoSourceFiles { store: String },

    #[error("Source files for store '{store}' yielded no entries")]
    NoEntries { store: String },

    #[error("Manifest {} does not declare the [{section}] section", .path.display())]
    ManifestIndexMissing { path: PathBuf, section: String },

    #[error("Manifest {}: {reason}", .path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Store '{store}' has a discovery manifest but no vendor root")]
    VendorRootMissing { store: String },

    #[error("Store name '{0}' is reserved")]
    ReservedStoreName(String),

    #[error("Flatten delimiter '{0}' may only use characters that cannot appear in a section name")]
    InvalidDelimiter(String),

    #[error("Store '{store}' does not use sections")]
    SectionsUnsupported { store: String },

    #[error("Store '{store}' requires a section for key '{key}'")]
    SectionRequired { store: String, key: String },

    #[error("Store '{0}' is already registered")]
    DuplicateStore(String),

    #[error("Unknown store '{0}'")]
    UnknownStore(String),
}

/// Top-level error for every store operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(
        "Key collision in path '{path_name}': {} is set in both {} and {}",
        site_label(.section.as_deref(), .key),
        .first.display(),
        .second.display()
    )]
    KeyCollision {
        path_name: String,
        section: Option<String>,
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Key grammar error: {0}")]
    KeyGrammar(#[from] GrammarError),

    #[error("Store '{store}' cannot be used: {reason}")]
    StoreContract { store: String, reason: String },

    #[error("Store '{store}' rejected the write of '{key}'")]
    StoreWrite { store: String, key: String },

    #[error("Value under '{key}' is not associative; cannot set item '{item}'")]
    NotAssociative { key: String, item: String },

    #[error("Parse error in {}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Invalid input: {0}")]
    Usage(String),
}

impl Error {
    /// Stable name of the error kind, for CLI output and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::KeyCollision { .. } => "key-collision",
            Error::KeyGrammar(_) => "key-grammar",
            Error::StoreContract { .. } => "store-contract",
            Error::StoreWrite { .. } => "store-write",
            Error::NotAssociative { .. } => "not-associative",
            Error::Parse { .. } => "parse",
            Error::Io { .. } => "io",
            Error::Storage(_) => "storage",
            Error::Export(_) => "export",
            Error::Settings(_) => "settings",
            Error::Usage(_) => "usage",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Settings(err.to_string())
    }
}

fn site_label(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("[{}] {}", section, key),
        None => key.to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
