//! Build Orchestrator
//!
//! Runs discovery, reading, parsing, merging and flattening for one store and
//! publishes the result. Two publication paths exist:
//!
//! - **cold**: the store is new, empty or cannot stage candidates. Stale data
//!   is cleared and the build is written directly; failures propagate.
//! - **warm**: the store holds data and can stage candidates. The build is
//!   written into a candidate which is promoted only when everything
//!   succeeded. A failure leaves the live data untouched; with a reporter
//!   attached it is reported and returned as [`RefreshOutcome::Retained`].

use crate::definition::{SourceKind, StoreDefinition};
use crate::discovery::DiscoveryResolver;
use crate::error::{ConfigurationError, Error, Result};
use crate::flatten::flatten_collection;
use crate::grammar::IdentKind;
use crate::merge::{count_entries, merge_override, merge_permissive, Collection, PathMerger};
use crate::report::{BuildReporter, SourceOrigin, TracingReporter};
use crate::source::parser::coerce_scalar;
use crate::source::{parse_file, SourceReader};
use crate::store::{Candidate, Entries, KeyValueStore};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Prefix of the label given to the data replaced by a promotion.
pub const BACKUP_LABEL_PREFIX: &str = "backup-";

/// Label for a backup taken now.
pub fn backup_label() -> String {
    format!(
        "{}{}",
        BACKUP_LABEL_PREFIX,
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Treat "files found but no entries" as a successful empty build.
    pub allow_none: bool,
    /// Report the files of every location.
    pub verbose: bool,
}

impl RefreshOptions {
    pub fn allow_none(mut self, allow_none: bool) -> Self {
        self.allow_none = allow_none;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result of a refresh that did not fail outright.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// New data is live.
    Published {
        entries: usize,
        files: usize,
        /// Label of the replaced data, for warm rebuilds.
        backup: Option<String>,
    },
    /// The rebuild failed and the previous data is still live.
    Retained { error: Error },
}

impl RefreshOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RefreshOutcome::Published { .. })
    }
}

/// Merged sources before flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub collection: Collection,
    /// Number of files that were read.
    pub files: usize,
}

/// Builds one store definition.
pub struct BuildPipeline<'a> {
    definition: &'a StoreDefinition,
    reporter: Option<&'a dyn BuildReporter>,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(definition: &'a StoreDefinition, reporter: Option<&'a dyn BuildReporter>) -> Self {
        Self {
            definition,
            reporter,
        }
    }

    fn store_name(&self) -> &str {
        self.definition.name()
    }

    fn listing(&self) -> &dyn BuildReporter {
        self.reporter.unwrap_or(&TracingReporter)
    }

    /// Read and merge every source.
    pub fn collect(&self, options: RefreshOptions) -> Result<SourceSnapshot> {
        let snapshot = match &self.definition.kind().source {
            SourceKind::Files => self.collect_files(options)?,
            SourceKind::Environment { prefix } => self.collect_environment(prefix, options),
        };

        let sections = self.definition.kind().use_sections;
        if count_entries(&snapshot.collection, sections) == 0 && !options.allow_none {
            return Err(ConfigurationError::NoEntries {
                store: self.store_name().to_string(),
            }
            .into());
        }
        Ok(snapshot)
    }

    fn collect_files(&self, options: RefreshOptions) -> Result<SourceSnapshot> {
        let definition = self.definition;
        let sections = definition.kind().use_sections;
        let parse = definition.parse_options();
        let paths = definition.resolve_paths()?;

        let mut merged = Collection::new();
        let mut files_read = 0usize;

        if let Some(primary) = paths.first() {
            for location in DiscoveryResolver::new(definition).resolve(&primary.dir)? {
                if options.verbose {
                    let origin = SourceOrigin::Vendor {
                        vendor: location.vendor.clone(),
                        package: location.package.clone(),
                        dir: location.dir.clone(),
                    };
                    self.listing()
                        .files_discovered(self.store_name(), &origin, &location.files);
                }
                for file in &location.files {
                    debug!(store = self.store_name(), file = %file.display(), "Parsing vendor source");
                    merge_permissive(&mut merged, parse_file(file, sections, parse)?);
                }
                files_read += location.files.len();
            }
        }

        let reader = SourceReader::new(definition.extension()).recursive(definition.recursive());
        for path in &paths {
            let files = reader.read(&path.dir)?;
            if options.verbose {
                let origin = SourceOrigin::Path {
                    name: path.name.clone(),
                    dir: path.dir.clone(),
                };
                self.listing()
                    .files_discovered(self.store_name(), &origin, &files);
            }
            if files.is_empty() {
                debug!(store = self.store_name(), path = %path.name, "No source files in path");
                continue;
            }

            let mut merger = PathMerger::new(&path.name, sections);
            for file in &files {
                debug!(store = self.store_name(), file = %file.display(), "Parsing source");
                merger.add(file, parse_file(file, sections, parse)?)?;
            }
            files_read += files.len();
            merge_override(&mut merged, merger.finish(), sections);
        }

        if files_read == 0 {
            return Err(ConfigurationError::NoSourceFiles {
                store: self.store_name().to_string(),
            }
            .into());
        }

        Ok(SourceSnapshot {
            collection: merged,
            files: files_read,
        })
    }

    fn collect_environment(&self, prefix: &str, options: RefreshOptions) -> SourceSnapshot {
        let grammar = self.definition.kind().key_grammar();
        let mut collection = Collection::new();

        let mut vars: Vec<(String, String)> = Vec::new();
        for (name, value) in std::env::vars_os() {
            let shown = name.to_string_lossy();
            if !shown.starts_with(prefix) {
                continue;
            }
            match (name.to_str(), value.to_str()) {
                (Some(name), Some(value)) => vars.push((name.to_string(), value.to_string())),
                _ => debug!(store = self.store_name(), variable = %shown, "Skipping non-UTF-8 variable"),
            }
        }
        vars.sort();

        for (name, value) in vars {
            let raw = &name[prefix.len()..];
            match grammar.key_convert(IdentKind::Key, raw) {
                Ok(key) => {
                    collection.insert(key, coerce_scalar(&value));
                }
                Err(err) => debug!(store = self.store_name(), variable = %name, error = %err, "Skipping variable"),
            }
        }

        if options.verbose {
            let origin = SourceOrigin::Environment {
                prefix: prefix.to_string(),
            };
            let files: &[PathBuf] = &[];
            self.listing()
                .files_discovered(self.store_name(), &origin, files);
        }

        SourceSnapshot {
            collection,
            files: 0,
        }
    }

    /// Collect and flatten into store entries.
    pub fn entries(&self, options: RefreshOptions) -> Result<(Entries, usize)> {
        let snapshot = self.collect(options)?;
        let entries = flatten_collection(snapshot.collection, self.definition.kind())?;
        Ok((entries, snapshot.files))
    }

    /// Build and publish into `store`.
    pub fn publish(&self, store: &dyn KeyValueStore, options: RefreshOptions) -> Result<RefreshOutcome> {
        let staging = store.staging();
        if self.definition.kind().staged && staging.is_none() {
            return Err(Error::StoreContract {
                store: self.store_name().to_string(),
                reason: "the store kind requires candidate staging".to_string(),
            });
        }

        let staging = match staging {
            Some(staging) if !store.is_new()? && !store.is_empty()? => staging,
            _ => return self.publish_cold(store, options),
        };

        info!(store = self.store_name(), "Warm rebuild into candidate");
        let mut candidate = staging.open_candidate()?;
        match self.fill(candidate.as_mut(), options) {
            Ok((entries, files)) => {
                let label = backup_label();
                candidate.promote(&label)?;
                info!(store = self.store_name(), entries, files, backup = %label, "Published rebuild");
                Ok(RefreshOutcome::Published {
                    entries,
                    files,
                    backup: Some(label),
                })
            }
            Err(err) => {
                if let Err(discard) = candidate.discard() {
                    warn!(store = self.store_name(), error = %discard, "Failed to discard candidate");
                }
                match self.reporter {
                    Some(reporter) => {
                        reporter.rebuild_failed(self.store_name(), &err);
                        Ok(RefreshOutcome::Retained { error: err })
                    }
                    None => Err(err),
                }
            }
        }
    }

    fn publish_cold(&self, store: &dyn KeyValueStore, options: RefreshOptions) -> Result<RefreshOutcome> {
        info!(store = self.store_name(), "Cold build");
        store.clear()?;
        let (entries, files) = self.entries(options)?;
        if !entries.is_empty() && !store.set_multiple(&entries)? {
            return Err(self.write_rejected(&entries));
        }
        info!(store = self.store_name(), entries = entries.len(), files, "Published build");
        Ok(RefreshOutcome::Published {
            entries: entries.len(),
            files,
            backup: None,
        })
    }

    fn fill(&self, candidate: &mut dyn Candidate, options: RefreshOptions) -> Result<(usize, usize)> {
        let (entries, files) = self.entries(options)?;
        if !candidate.set_multiple(&entries)? {
            return Err(self.write_rejected(&entries));
        }
        Ok((entries.len(), files))
    }

    fn write_rejected(&self, entries: &Entries) -> Error {
        Error::StoreWrite {
            store: self.store_name().to_string(),
            key: format!("{} entries", entries.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StoreKind;
    use crate::report::CollectingReporter;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn definition(temp: &TempDir) -> StoreDefinition {
        StoreDefinition::new("app", StoreKind::sectioned_flattened())
            .with_fixed_paths(&["base", "override"])
            .with_default_path("base", temp.path().join("base"))
            .with_default_path("override", temp.path().join("override"))
    }

    fn setup() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("base/a.ini"), "[db]\nhost = base\nport = 1\n");
        write(&temp.path().join("override/a.ini"), "[db]\nport = 2\n");
        temp
    }

    #[test]
    fn test_backup_label_format() {
        let label = backup_label();
        assert!(label.starts_with(BACKUP_LABEL_PREFIX));
        assert!(label.ends_with('Z'));
    }

    #[test]
    fn test_cold_build_publishes_merged_entries() {
        let temp = setup();
        let definition = definition(&temp);
        let store = MemoryStore::new("app");

        let outcome = BuildPipeline::new(&definition, None)
            .publish(&store, RefreshOptions::default())
            .unwrap();
        match outcome {
            RefreshOutcome::Published {
                entries,
                files,
                backup,
            } => {
                assert_eq!(entries, 2);
                assert_eq!(files, 2);
                assert_eq!(backup, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(store.get("db::host").unwrap(), Some(json!("base")));
        assert_eq!(store.get("db::port").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_no_files_and_no_entries_are_distinct() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("base")).unwrap();
        fs::create_dir_all(temp.path().join("override")).unwrap();
        let definition = definition(&temp);
        let pipeline = BuildPipeline::new(&definition, None);

        let err = pipeline
            .collect(RefreshOptions::default().allow_none(true))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NoSourceFiles { .. })
        ));

        write(&temp.path().join("base/empty.ini"), "; nothing\n");
        let err = pipeline.collect(RefreshOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NoEntries { .. })
        ));

        let snapshot = pipeline
            .collect(RefreshOptions::default().allow_none(true))
            .unwrap();
        assert!(snapshot.collection.is_empty());
        assert_eq!(snapshot.files, 1);
    }

    #[test]
    fn test_warm_rebuild_promotes_with_backup() {
        let temp = setup();
        let definition = definition(&temp);
        let store = MemoryStore::new("app").with_staging();
        let pipeline = BuildPipeline::new(&definition, None);
        pipeline.publish(&store, RefreshOptions::default()).unwrap();

        write(&temp.path().join("override/a.ini"), "[db]\nport = 3\n");
        let outcome = pipeline.publish(&store, RefreshOptions::default()).unwrap();
        match outcome {
            RefreshOutcome::Published { backup, .. } => {
                assert!(backup.unwrap().starts_with(BACKUP_LABEL_PREFIX));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(store.get("db::port").unwrap(), Some(json!(3)));
    }

    #[test]
    fn test_warm_failure_with_reporter_retains_live_data() {
        let temp = setup();
        let definition = definition(&temp);
        let store = MemoryStore::new("app").with_staging();
        let reporter = CollectingReporter::new();
        let pipeline = BuildPipeline::new(&definition, Some(&reporter));
        pipeline.publish(&store, RefreshOptions::default()).unwrap();

        write(&temp.path().join("base/b.ini"), "[db]\nhost = clash\n");
        let outcome = pipeline.publish(&store, RefreshOptions::default()).unwrap();
        match outcome {
            RefreshOutcome::Retained { error } => {
                assert!(matches!(error, Error::KeyCollision { .. }))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(store.get("db::host").unwrap(), Some(json!("base")));
        assert_eq!(reporter.failures().len(), 1);
    }

    #[test]
    fn test_warm_failure_without_reporter_propagates() {
        let temp = setup();
        let definition = definition(&temp);
        let store = MemoryStore::new("app").with_staging();
        let pipeline = BuildPipeline::new(&definition, None);
        pipeline.publish(&store, RefreshOptions::default()).unwrap();

        write(&temp.path().join("base/b.ini"), "[db]\nhost = clash\n");
        assert!(pipeline.publish(&store, RefreshOptions::default()).is_err());
        assert_eq!(store.get("db::host").unwrap(), Some(json!("base")));
    }

    #[test]
    fn test_staged_kind_needs_staging_backend() {
        let temp = setup();
        let definition = StoreDefinition::new(
            "app",
            StoreKind::sectioned_flattened().require_staging(),
        )
        .with_path("base", temp.path().join("base"));
        let err = BuildPipeline::new(&definition, None)
            .publish(&MemoryStore::new("app"), RefreshOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::StoreContract { .. }));
    }

    #[test]
    fn test_rejected_write_is_store_write_error() {
        let temp = setup();
        let definition = definition(&temp);
        let store = MemoryStore::new("app").with_capacity_limit(1);
        let err = BuildPipeline::new(&definition, None)
            .publish(&store, RefreshOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
    }

    #[test]
    fn test_verbose_lists_files_per_path() {
        let temp = setup();
        let definition = definition(&temp);
        let reporter = CollectingReporter::new();
        BuildPipeline::new(&definition, Some(&reporter))
            .collect(RefreshOptions::default().verbose(true))
            .unwrap();

        let listed = reporter.discovered();
        assert_eq!(listed.len(), 2);
        assert!(matches!(&listed[0].origin, SourceOrigin::Path { name, .. } if name == "base"));
        assert_eq!(listed[1].files.len(), 1);
    }

    #[test]
    fn test_cold_collision_leaves_store_empty() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("base/a.ini"), "[db]\nhost = a\n");
        write(&temp.path().join("base/b.ini"), "[db]\nhost = b\n");
        fs::create_dir_all(temp.path().join("override")).unwrap();
        let definition = definition(&temp);
        let store = MemoryStore::new("app");
        store.set("stale::key", &json!(1)).unwrap();

        let err = BuildPipeline::new(&definition, None)
            .publish(&store, RefreshOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::KeyCollision { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_environment_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("LSUTF8TEST_BAD", OsStr::from_bytes(b"\xff\xfe"));
        std::env::set_var("LSUTF8TEST_GOOD", "yes");
        let definition = StoreDefinition::new("env", StoreKind::environment("LSUTF8TEST_"));
        let result = BuildPipeline::new(&definition, None).entries(RefreshOptions::default());
        std::env::remove_var("LSUTF8TEST_BAD");
        std::env::remove_var("LSUTF8TEST_GOOD");

        let (entries, _) = result.unwrap();
        assert_eq!(entries, vec![("GOOD".to_string(), json!("yes"))]);
    }

    #[test]
    fn test_environment_source() {
        std::env::set_var("LSBUILDTEST_APP.NAME", "demo");
        std::env::set_var("LSBUILDTEST_WORKERS", "4");
        let definition = StoreDefinition::new("env", StoreKind::environment("LSBUILDTEST_"));
        let (entries, files) = BuildPipeline::new(&definition, None)
            .entries(RefreshOptions::default())
            .unwrap();
        assert_eq!(files, 0);
        assert_eq!(
            entries,
            vec![
                ("APP_NAME".to_string(), json!("demo")),
                ("WORKERS".to_string(), json!(4)),
            ]
        );
    }
}
