//! Integration tests for layered builds: override, collisions, lists and limits

use super::test_utils::Workspace;
use layerstore::grammar::GrammarError;
use layerstore::{
    ConfigStore, ConfigurationError, Error, LengthTier, MemoryStore, RefreshOptions, StoreKind,
};
use serde_json::json;

fn open(ws: &Workspace) -> Result<ConfigStore, Error> {
    ConfigStore::open(ws.definition(), Box::new(MemoryStore::new("app")))
}

/// Later paths replace keys of earlier paths; untouched keys survive
#[test]
fn test_later_path_overrides_earlier() {
    let ws = Workspace::new();
    ws.write("base/db.ini", "[db]\nhost = base.local\nport = 5432\n");
    ws.write("override/db.ini", "[db]\nhost = prod.example.com\n");

    let store = open(&ws).unwrap();
    assert_eq!(store.get("db::host").unwrap(), Some(json!("prod.example.com")));
    assert_eq!(store.get("db::port").unwrap(), Some(json!(5432)));
    assert_eq!(store.get_in("db", "port").unwrap(), Some(json!(5432)));
}

/// Two files of one path setting the same scalar is fatal and names both files
#[test]
fn test_collision_within_path_names_both_files() {
    let ws = Workspace::new();
    let first = ws.write("base/a.ini", "[db]\nhost = one\n");
    let second = ws.write("base/b.ini", "[db]\nhost = two\n");

    let err = open(&ws).err().unwrap();
    match err {
        Error::KeyCollision {
            path_name,
            section,
            key,
            first: f,
            second: s,
        } => {
            assert_eq!(path_name, "base");
            assert_eq!(section.as_deref(), Some("db"));
            assert_eq!(key, "host");
            assert_eq!(f.file_name(), first.file_name());
            assert_eq!(s.file_name(), second.file_name());
        }
        other => panic!("expected a key collision, got {:?}", other),
    }
}

/// The same key in different paths is an override, not a collision
#[test]
fn test_same_key_across_paths_is_not_a_collision() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[db]\nhost = one\n");
    ws.write("override/a.ini", "[db]\nhost = two\n");

    let store = open(&ws).unwrap();
    assert_eq!(store.get("db::host").unwrap(), Some(json!("two")));
}

/// List items from several files of one path are appended in file order
#[test]
fn test_lists_append_within_a_path() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[web]\nhosts[] = one\n");
    ws.write("base/b.ini", "[web]\nhosts[] = two\nhosts[] = three\n");

    let store = open(&ws).unwrap();
    assert_eq!(
        store.get("web::hosts").unwrap(),
        Some(json!(["one", "two", "three"]))
    );
}

/// A later path replaces a list as a whole
#[test]
fn test_later_path_replaces_list() {
    let ws = Workspace::new();
    ws.write("base/a.ini", "[web]\nhosts[] = one\nhosts[] = two\n");
    ws.write("override/a.ini", "[web]\nhosts[] = three\n");

    let store = open(&ws).unwrap();
    assert_eq!(store.get("web::hosts").unwrap(), Some(json!(["three"])));
}

/// No files at all stays fatal even when empty configurations are allowed
#[test]
fn test_no_source_files_is_fatal() {
    let ws = Workspace::new();
    let err = ConfigStore::open_with(
        ws.definition(),
        Box::new(MemoryStore::new("app")),
        None,
        RefreshOptions::default().allow_none(true),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::NoSourceFiles { .. })
    ));
}

/// Files without entries fail by default and publish nothing with allow_none
#[test]
fn test_allow_none_accepts_empty_sources() {
    let ws = Workspace::new();
    ws.write("base/db.ini", "; nothing configured yet\n");

    let err = open(&ws).err().unwrap();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::NoEntries { .. })
    ));

    let store = ConfigStore::open_with(
        ws.definition(),
        Box::new(MemoryStore::new("app")),
        None,
        RefreshOptions::default().allow_none(true),
    )
    .unwrap();
    assert!(store.entries().unwrap().is_empty());
}

/// Composite keys may be exactly as long as the tier allows, not longer
#[test]
fn test_composite_key_length_boundary() {
    let ws = Workspace::new();
    // "db" + "::" + 60 = 64
    let at_limit = "k".repeat(60);
    ws.write("base/db.ini", &format!("[db]\n{} = 1\n", at_limit));
    let store = open(&ws).unwrap();
    assert_eq!(store.get(&format!("db::{}", at_limit)).unwrap(), Some(json!(1)));

    let ws = Workspace::new();
    let over = "k".repeat(61);
    ws.write("base/db.ini", &format!("[db]\n{} = 1\n", over));
    let err = open(&ws).err().unwrap();
    match err {
        Error::KeyGrammar(GrammarError::CompositeTooLong { len, max, .. }) => {
            assert_eq!(len, 65);
            assert_eq!(max, 64);
        }
        other => panic!("expected composite length error, got {:?}", other),
    }

    let long = ConfigStore::open(
        ws.definition_with(StoreKind::sectioned_flattened().with_length_tier(LengthTier::Long)),
        Box::new(MemoryStore::new("app")),
    )
    .unwrap();
    assert!(long.has(&format!("db::{}", over)).unwrap());
}

/// Sectioned stores keep one associative value per section
#[test]
fn test_sectioned_layout_groups_keys() {
    let ws = Workspace::new();
    ws.write("base/db.ini", "[db]\nhost = a\n[cache]\nttl = 30\n");
    ws.write("override/db.ini", "[db]\nport = 1\n");

    let store = ConfigStore::open(
        ws.definition_with(StoreKind::sectioned()),
        Box::new(MemoryStore::new("app")),
    )
    .unwrap();
    assert_eq!(store.get("db").unwrap(), Some(json!({"host": "a", "port": 1})));
    assert_eq!(store.get_in("cache", "ttl").unwrap(), Some(json!(30)));
    assert_eq!(store.sections().unwrap(), vec!["cache", "db"]);
}
