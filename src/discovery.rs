//! Vendor package discovery.
//!
//! A store may keep a manifest beside its primary sources, named
//! `{store}.packages.<ext>`:
//!
//! ```text
//! [packages-by-vendors]
//! acme = *
//! globex[] = billing
//! globex[] = search
//! ```
//!
//! Every listed vendor/package directory under the vendor root is searched
//! for `{store}.<ext>` files, by default only inside `ini/` directories.

use crate::definition::StoreDefinition;
use crate::error::{ConfigurationError, Error, Result};
use crate::source::{parse_file, ParseOptions, SourceReader};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Required index section of a manifest.
pub const MANIFEST_INDEX_SECTION: &str = "packages-by-vendors";

const WILDCARD: &str = "*";

/// Location of the manifest for `store` inside `primary`.
pub fn manifest_path(primary: &Path, store: &str, extension: &str) -> PathBuf {
    primary.join(format!("{}.packages.{}", store, extension))
}

/// Packages selected for one vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSelection {
    /// Every package directory under the vendor that holds a source file.
    All,
    /// Exactly these packages, in this order.
    Only(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEntry {
    pub vendor: String,
    pub packages: PackageSelection,
}

/// Parsed discovery manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    pub vendors: Vec<VendorEntry>,
}

impl Manifest {
    /// Load the manifest at `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }

        // Package names like `2024` must stay strings; vendor names may be
        // any word.
        let options = ParseOptions {
            typed: false,
            escape_reserved_keys: true,
        };
        let mut parsed = parse_file(path, true, options)?;

        let index = match parsed.remove(MANIFEST_INDEX_SECTION) {
            Some(Value::Object(index)) => index,
            _ => {
                return Err(ConfigurationError::ManifestIndexMissing {
                    path: path.to_path_buf(),
                    section: MANIFEST_INDEX_SECTION.to_string(),
                }
                .into())
            }
        };

        let invalid = |reason: String| -> Error {
            ConfigurationError::ManifestInvalid {
                path: path.to_path_buf(),
                reason,
            }
            .into()
        };

        let mut vendors = Vec::with_capacity(index.len());
        for (vendor, value) in index {
            let packages = match value {
                Value::String(s) if s == WILDCARD => PackageSelection::All,
                Value::String(s) if !s.is_empty() => PackageSelection::Only(vec![s]),
                Value::Array(items) => {
                    let mut names = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(s) if s != WILDCARD && !s.is_empty() => names.push(s),
                            other => {
                                return Err(invalid(format!(
                                    "vendor '{}' lists an invalid package {}",
                                    vendor, other
                                )))
                            }
                        }
                    }
                    PackageSelection::Only(names)
                }
                other => {
                    return Err(invalid(format!(
                        "vendor '{}' must map to '*' or a list of packages, found {}",
                        vendor, other
                    )))
                }
            };
            vendors.push(VendorEntry { vendor, packages });
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            vendors,
        }))
    }
}

/// One vendor package with the source files found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLocation {
    pub vendor: String,
    pub package: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

impl DiscoveredLocation {
    pub fn label(&self) -> String {
        format!("{}/{}", self.vendor, self.package)
    }
}

/// Expands a store's manifest into vendor package locations.
pub struct DiscoveryResolver<'a> {
    definition: &'a StoreDefinition,
}

impl<'a> DiscoveryResolver<'a> {
    pub fn new(definition: &'a StoreDefinition) -> Self {
        Self { definition }
    }

    /// Resolve the manifest found in `primary`. No manifest means no
    /// locations.
    pub fn resolve(&self, primary: &Path) -> Result<Vec<DiscoveredLocation>> {
        let store = self.definition.name();
        let path = manifest_path(primary, store, self.definition.extension());
        let Some(manifest) = Manifest::load(&path)? else {
            debug!(store, manifest = %path.display(), "No discovery manifest");
            return Ok(Vec::new());
        };

        let root = self
            .definition
            .discovery()
            .vendor_root
            .as_deref()
            .ok_or_else(|| ConfigurationError::VendorRootMissing {
                store: store.to_string(),
            })?;

        let mut locations = Vec::new();
        for entry in &manifest.vendors {
            let vendor_dir = root.join(&entry.vendor);
            match &entry.packages {
                PackageSelection::All => {
                    for package in package_dirs(&vendor_dir, &entry.vendor)? {
                        let location = self.locate(&entry.vendor, &package, &vendor_dir)?;
                        if !location.files.is_empty() {
                            locations.push(location);
                        }
                    }
                }
                PackageSelection::Only(packages) => {
                    for package in packages {
                        locations.push(self.locate(&entry.vendor, package, &vendor_dir)?);
                    }
                }
            }
        }

        info!(
            store,
            manifest = %manifest.path.display(),
            locations = locations.len(),
            "Resolved discovery manifest"
        );
        Ok(locations)
    }

    fn locate(&self, vendor: &str, package: &str, vendor_dir: &Path) -> Result<DiscoveredLocation> {
        let dir = vendor_dir.join(package);
        if !dir.is_dir() {
            return Err(ConfigurationError::MissingPath {
                name: format!("{}/{}", vendor, package),
                path: dir,
            }
            .into());
        }

        let files = SourceReader::new(self.definition.extension())
            .recursive(true)
            .require_parent(self.definition.discovery().parent_dir.clone())
            .require_stem(self.definition.name())
            .read(&dir)?;

        Ok(DiscoveredLocation {
            vendor: vendor.to_string(),
            package: package.to_string(),
            dir,
            files,
        })
    }
}

/// Sorted package directory names under a vendor.
fn package_dirs(vendor_dir: &Path, vendor: &str) -> Result<Vec<String>> {
    if !vendor_dir.is_dir() {
        return Err(ConfigurationError::MissingPath {
            name: vendor.to_string(),
            path: vendor_dir.to_path_buf(),
        }
        .into());
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(vendor_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io {
            path: vendor_dir.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
