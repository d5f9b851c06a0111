//! Shared test utilities for integration tests

use layerstore::{StoreDefinition, StoreKind};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary workspace with `base/` and `override/` source paths.
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("base")).unwrap();
        fs::create_dir_all(temp.path().join("override")).unwrap();
        Self { temp }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path(rel);
        write(&path, text);
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    /// Flattened store `app` over `base` then `override`.
    pub fn definition(&self) -> StoreDefinition {
        self.definition_with(StoreKind::sectioned_flattened())
    }

    pub fn definition_with(&self, kind: StoreKind) -> StoreDefinition {
        StoreDefinition::new("app", kind)
            .with_fixed_paths(&["base", "override"])
            .with_default_path("base", self.path("base"))
            .with_default_path("override", self.path("override"))
    }

    pub fn sled(&self) -> sled::Db {
        sled::open(self.path("db")).unwrap()
    }
}

pub fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}
