//! Integration tests for vendor package discovery

use super::test_utils::Workspace;
use layerstore::report::SourceOrigin;
use layerstore::{
    BuildReporter, CollectingReporter, ConfigStore, ConfigurationError, Error, MemoryStore,
    RefreshOptions, StoreDefinition,
};
use serde_json::json;
use std::sync::Arc;

fn vendor_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write("vendor/acme/alpha/ini/app.ini", "[alpha]\nenabled = true\n");
    ws.write("vendor/acme/beta/ini/app.ini", "[beta]\nenabled = true\nlevel = 1\n");
    ws.write("vendor/acme/beta/ini/other.ini", "[ignored]\nkey = 1\n");
    ws.write("vendor/acme/empty/ini/.keep", "");
    ws.write("base/main.ini", "[main]\nname = app\n");
    ws
}

fn definition(ws: &Workspace) -> StoreDefinition {
    ws.definition().with_vendor_root(ws.path("vendor"))
}

/// `*` selects every package with a matching source file
#[test]
fn test_wildcard_selects_all_packages() {
    let ws = vendor_workspace();
    ws.write("base/app.packages.ini", "[packages-by-vendors]\nacme = *\n");

    let store = ConfigStore::open(definition(&ws), Box::new(MemoryStore::new("app"))).unwrap();
    assert_eq!(store.sections().unwrap(), vec!["alpha", "beta", "main"]);
    assert!(!store.has("ignored::key").unwrap());
}

/// A list selects only the named packages
#[test]
fn test_list_selects_named_packages() {
    let ws = vendor_workspace();
    ws.write("base/app.packages.ini", "[packages-by-vendors]\nacme[] = beta\n");

    let store = ConfigStore::open(definition(&ws), Box::new(MemoryStore::new("app"))).unwrap();
    assert_eq!(store.sections().unwrap(), vec!["beta", "main"]);
}

/// Path sources override what vendor packages provide
#[test]
fn test_paths_override_vendor_values() {
    let ws = vendor_workspace();
    ws.write("base/app.packages.ini", "[packages-by-vendors]\nacme = beta\n");
    ws.write("override/beta.ini", "[beta]\nlevel = 9\n");

    let store = ConfigStore::open(definition(&ws), Box::new(MemoryStore::new("app"))).unwrap();
    assert_eq!(store.get("beta::level").unwrap(), Some(json!(9)));
    assert_eq!(store.get("beta::enabled").unwrap(), Some(json!(true)));
}

/// Naming a package that does not exist stops the build
#[test]
fn test_missing_package_is_fatal() {
    let ws = vendor_workspace();
    ws.write("base/app.packages.ini", "[packages-by-vendors]\nacme = gamma\n");

    let err = ConfigStore::open(definition(&ws), Box::new(MemoryStore::new("app")))
        .err()
        .unwrap();
    match err {
        Error::Configuration(ConfigurationError::MissingPath { name, .. }) => {
            assert_eq!(name, "acme/gamma");
        }
        other => panic!("expected a missing path, got {:?}", other),
    }
}

/// Verbose builds list every location in merge order
#[test]
fn test_verbose_build_lists_vendor_then_paths() {
    let ws = vendor_workspace();
    ws.write("base/app.packages.ini", "[packages-by-vendors]\nacme = *\n");

    let reporter = Arc::new(CollectingReporter::new());
    let shared: Arc<dyn BuildReporter> = reporter.clone();
    ConfigStore::open_with(
        definition(&ws),
        Box::new(MemoryStore::new("app")),
        Some(shared),
        RefreshOptions::default().verbose(true),
    )
    .unwrap();

    let listing = reporter.discovered();
    let origins: Vec<String> = listing
        .iter()
        .map(|entry| match &entry.origin {
            SourceOrigin::Vendor {
                vendor, package, ..
            } => format!("{}/{}", vendor, package),
            SourceOrigin::Path { name, .. } => name.clone(),
            SourceOrigin::Environment { prefix } => prefix.clone(),
        })
        .collect();
    assert_eq!(origins, vec!["acme/alpha", "acme/beta", "base", "override"]);
    assert_eq!(listing[2].files.len(), 1);
    assert!(listing[3].files.is_empty());
}
