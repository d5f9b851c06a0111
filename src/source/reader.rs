//! Source file reader: collects files by extension under a directory.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File stems that mark templates and manifests rather than sources.
pub const RESERVED_STEMS: &[&str] = &["example", "packages"];

/// Reader configuration
#[derive(Debug, Clone)]
pub struct SourceReader {
    extension: String,
    recursive: bool,
    /// Required immediate parent directory name
    parent_dir: Option<String>,
    /// Required file stem
    stem: Option<String>,
}

impl SourceReader {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            recursive: false,
            parent_dir: None,
            stem: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn require_parent(mut self, parent_dir: Option<String>) -> Self {
        self.parent_dir = parent_dir;
        self
    }

    pub fn require_stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = Some(stem.into());
        self
    }

    /// Collect matching files under `dir`, sorted by path.
    pub fn read(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .follow_links(true)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                Error::Io {
                    path,
                    source: e.into(),
                }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            if self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);
        if !extension_ok || is_reserved_stem(path) {
            return false;
        }

        if let Some(stem) = &self.stem {
            let file_stem = path.file_stem().map(|s| s.to_string_lossy());
            if file_stem.as_deref() != Some(stem.as_str()) {
                return false;
            }
        }

        if let Some(parent_dir) = &self.parent_dir {
            let parent_name = path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy());
            if parent_name.as_deref() != Some(parent_dir.as_str()) {
                return false;
            }
        }

        true
    }
}

/// `example.ini`, `db.example.ini` and `db.packages.ini` are never sources.
pub fn is_reserved_stem(path: &Path) -> bool {
    let Some(stem) = path.file_stem() else {
        return false;
    };
    let stem = stem.to_string_lossy();
    let last = stem.rsplit('.').next().unwrap_or("");
    RESERVED_STEMS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(last))
}
