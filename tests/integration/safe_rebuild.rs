//! Integration tests for warm rebuilds over the durable store

use super::test_utils::Workspace;
use layerstore::{
    BuildReporter, CollectingReporter, ConfigStore, Error, MemoryStore, RefreshOptions,
    RefreshOutcome, SledStore, StoreKind,
};
use serde_json::json;
use std::sync::Arc;

fn open(ws: &Workspace, db: &sled::Db) -> ConfigStore {
    let backend = SledStore::open(db.clone(), "app").unwrap();
    ConfigStore::open(ws.definition(), Box::new(backend)).unwrap()
}

/// A failed rebuild without a reporter errors out and leaves live data untouched
#[test]
fn test_failed_rebuild_keeps_previous_values() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    let db = ws.sled();
    let store = open(&ws, &db);
    assert_eq!(store.get("db::host").unwrap(), Some(json!("one")));

    ws.write("base/b.ini", "[db]\nhost = two\n");
    let err = store.refresh(RefreshOptions::default()).unwrap_err();
    assert!(matches!(err, Error::KeyCollision { .. }));

    assert_eq!(store.get("db::host").unwrap(), Some(json!("one")));
    assert!(store.backups().unwrap().is_empty());
}

/// With a reporter the failure is reported and the outcome says data was retained
#[test]
fn test_failed_rebuild_with_reporter_is_retained() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    let db = ws.sled();
    let reporter = Arc::new(CollectingReporter::new());
    let shared: Arc<dyn BuildReporter> = reporter.clone();
    let store = ConfigStore::open_with(
        ws.definition(),
        Box::new(SledStore::open(db.clone(), "app").unwrap()),
        Some(shared),
        RefreshOptions::default(),
    )
    .unwrap();

    ws.write("base/b.ini", "[db]\nhost = two\n");
    let outcome = store.refresh(RefreshOptions::default()).unwrap();
    assert!(matches!(
        outcome,
        RefreshOutcome::Retained {
            error: Error::KeyCollision { .. }
        }
    ));
    assert_eq!(reporter.failures().len(), 1);
    assert_eq!(reporter.failures()[0].0, "app");
    assert_eq!(store.get("db::host").unwrap(), Some(json!("one")));
}

/// A successful rebuild promotes the candidate and keeps the old data as a backup
#[test]
fn test_successful_rebuild_keeps_backup() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    let db = ws.sled();
    let store = open(&ws, &db);

    ws.write("base/a.ini", "[db]\nhost = two\n");
    let outcome = store.refresh(RefreshOptions::default()).unwrap();
    let label = match outcome {
        RefreshOutcome::Published {
            entries,
            files,
            backup,
        } => {
            assert_eq!(entries, 1);
            assert_eq!(files, 1);
            backup.unwrap()
        }
        other => panic!("expected a published rebuild, got {:?}", other),
    };
    assert!(label.starts_with("backup-"));
    assert_eq!(store.get("db::host").unwrap(), Some(json!("two")));

    let backups = store.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].label, label);

    let raw = SledStore::open(db.clone(), "app").unwrap();
    let previous = raw.backup_entries(&label).unwrap().unwrap();
    assert_eq!(previous, vec![("db::host".to_string(), json!("one"))]);
}

/// Removing every source makes a rebuild fail without touching live data
#[test]
fn test_rebuild_after_sources_vanish() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    let db = ws.sled();
    let store = open(&ws, &db);

    ws.remove("base/a.ini");
    assert!(store.refresh(RefreshOptions::default()).is_err());
    assert_eq!(store.get("db::host").unwrap(), Some(json!("one")));
}

/// Published data is reused on reopen; edits survive until the next refresh
#[test]
fn test_reopen_reuses_published_data() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    let db = ws.sled();
    {
        let store = open(&ws, &db);
        store.set("db::host", json!("edited")).unwrap();
    }

    let store = open(&ws, &db);
    assert_eq!(store.get("db::host").unwrap(), Some(json!("edited")));

    store.refresh(RefreshOptions::default()).unwrap();
    assert_eq!(store.get("db::host").unwrap(), Some(json!("one")));
}

/// Kinds that require staging refuse backends without it
#[test]
fn test_staged_kind_needs_staging_backend() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");

    let kind = StoreKind::sectioned_flattened().require_staging();
    let err = ConfigStore::open(ws.definition_with(kind.clone()), Box::new(MemoryStore::new("app")))
        .err()
        .unwrap();
    assert!(matches!(err, Error::StoreContract { .. }));

    let db = ws.sled();
    let store = ConfigStore::open(
        ws.definition_with(kind),
        Box::new(SledStore::open(db.clone(), "app").unwrap()),
    )
    .unwrap();
    assert!(store.has("db::host").unwrap());
}
