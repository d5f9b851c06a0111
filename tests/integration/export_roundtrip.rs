//! Integration tests for JSON export

use super::test_utils::Workspace;
use layerstore::{ConfigStore, ExportOptions, ExportSource, MemoryStore, RefreshOptions};
use serde_json::{json, Value};
use std::fs;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Exported JSON matches the live store, and a rebuild restores the sources
#[test]
fn test_export_matches_store_and_rebuild_restores_sources() {
    let ws = Workspace::new();
    ws.write("base/db.ini", "[db]\nhost = localhost\nport = 5432\nreplicas[] = r1\n");
    ws.write("override/web.ini", "[web]\nroot = /srv/www\n");
    let store = ConfigStore::open(ws.definition(), Box::new(MemoryStore::new("app"))).unwrap();

    let target = ws.path("out/app.json");
    let written = store.export(&target, &ExportOptions::default()).unwrap();
    assert!(written > 0);
    let exported = read_json(&target);
    assert_eq!(exported, Value::Object(store.collection().unwrap()));
    assert_eq!(exported["db"]["replicas"], json!(["r1"]));

    store.set("db::host", json!("changed")).unwrap();
    store.refresh(RefreshOptions::default()).unwrap();
    store.export(&target, &ExportOptions::default()).unwrap();
    assert_eq!(read_json(&target), exported);
}

/// Sections without keys export as `{}` from sources but are not published
#[test]
fn test_empty_section_exports_as_object() {
    let ws = Workspace::new();
    ws.write("base/db.ini", "[placeholder]\n[db]\nhost = x\n");
    let store = ConfigStore::open(ws.definition(), Box::new(MemoryStore::new("app"))).unwrap();

    let from_sources = ws.path("sources.json");
    store
        .export(
            &from_sources,
            &ExportOptions {
                source: ExportSource::Sources,
                ..Default::default()
            },
        )
        .unwrap();
    let text = fs::read_to_string(&from_sources).unwrap();
    assert!(text.contains(r#""placeholder":{}"#));

    let published = ws.path("published.json");
    store.export(&published, &ExportOptions::default()).unwrap();
    assert!(read_json(&published).get("placeholder").is_none());
}

/// Escaped output stays valid JSON with the same content
#[test]
fn test_escaped_export() {
    let ws = Workspace::new();
    ws.write("base/web.ini", "[web]\nroot = \"/srv/café\"\n");
    let store = ConfigStore::open(ws.definition(), Box::new(MemoryStore::new("app"))).unwrap();

    let target = ws.path("escaped.json");
    store
        .export(
            &target,
            &ExportOptions {
                escaped: true,
                ..Default::default()
            },
        )
        .unwrap();
    let text = fs::read_to_string(&target).unwrap();
    assert!(text.contains(r#"\/srv\/caf\u00e9"#));
    assert_eq!(read_json(&target)["web"]["root"], json!("/srv/café"));
}
