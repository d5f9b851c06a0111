//! Build reporting hooks.
//!
//! A reporter receives the per-location file lists of verbose builds and the
//! failures of warm rebuilds that kept the last-known-good data. Attaching a
//! reporter is what allows a warm rebuild failure to be absorbed instead of
//! propagated.

use crate::error::Error;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

/// Where a group of source files came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Path { name: String, dir: PathBuf },
    Vendor { vendor: String, package: String, dir: PathBuf },
    Environment { prefix: String },
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Path { name, dir } => write!(f, "path '{}' ({})", name, dir.display()),
            SourceOrigin::Vendor {
                vendor,
                package,
                dir,
            } => write!(f, "vendor {}/{} ({})", vendor, package, dir.display()),
            SourceOrigin::Environment { prefix } => write!(f, "environment ({}*)", prefix),
        }
    }
}

pub trait BuildReporter: Send + Sync {
    /// Called for every location of a verbose build, in merge order.
    fn files_discovered(&self, store: &str, origin: &SourceOrigin, files: &[PathBuf]);

    /// Called when a warm rebuild failed and live data was kept.
    fn rebuild_failed(&self, store: &str, error: &Error);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl BuildReporter for TracingReporter {
    fn files_discovered(&self, store: &str, origin: &SourceOrigin, files: &[PathBuf]) {
        info!(store, origin = %origin, files = files.len(), "Source files");
        for file in files {
            info!(store, file = %file.display(), "Source file");
        }
    }

    fn rebuild_failed(&self, store: &str, err: &Error) {
        error!(
            store,
            kind = err.kind(),
            error = %err,
            "Rebuild failed; keeping the previous configuration"
        );
    }
}

/// One verbose listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFiles {
    pub store: String,
    pub origin: SourceOrigin,
    pub files: Vec<PathBuf>,
}

/// Keeps everything it is told, for callers that render it later.
/// Failures are also logged.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    discovered: Mutex<Vec<DiscoveredFiles>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovered(&self) -> Vec<DiscoveredFiles> {
        self.discovered.lock().clone()
    }

    /// `(store, message)` pairs.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.failures.lock().clone()
    }
}

impl BuildReporter for CollectingReporter {
    fn files_discovered(&self, store: &str, origin: &SourceOrigin, files: &[PathBuf]) {
        self.discovered.lock().push(DiscoveredFiles {
            store: store.to_string(),
            origin: origin.clone(),
            files: files.to_vec(),
        });
    }

    fn rebuild_failed(&self, store: &str, err: &Error) {
        TracingReporter.rebuild_failed(store, err);
        self.failures
            .lock()
            .push((store.to_string(), err.to_string()));
    }
}
