//! layerstore: layered configuration stores
//!
//! Section-based source files are read from an ordered list of paths and
//! from vendor packages, merged with strict per-path collision checks and
//! override semantics between paths, validated against a key grammar, and
//! published into a key/value store. Rebuilds of stores that support staging
//! go through a candidate that is only promoted once it is complete.

pub mod build;
pub mod cli;
pub mod definition;
pub mod discovery;
pub mod error;
pub mod export;
pub mod facade;
pub mod flatten;
pub mod grammar;
pub mod logging;
pub mod merge;
pub mod registry;
pub mod report;
pub mod settings;
pub mod source;
pub mod store;

pub use build::{BuildPipeline, RefreshOptions, RefreshOutcome};
pub use definition::{KeyMode, SourcePath, StoreDefinition, StoreKind};
pub use error::{ConfigurationError, Error, Result, StorageError};
pub use export::{ExportOptions, ExportSource};
pub use facade::ConfigStore;
pub use grammar::{KeyGrammar, LengthTier};
pub use registry::StoreRegistry;
pub use report::{BuildReporter, CollectingReporter, TracingReporter};
pub use store::{KeyValueStore, MemoryStore, SledStore};
