//! Store presentation: configured store list, sections and values.

use crate::error::{Error, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;

/// One row of `layerstore list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub name: String,
    pub layout: String,
    pub paths: Vec<String>,
    pub vendor_root: Option<String>,
    /// None until the store has been built.
    pub entries: Option<usize>,
}

pub fn format_store_list_text(stores: &[StoreSummary]) -> String {
    if stores.is_empty() {
        return "No stores configured.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Store", "Layout", "Paths", "Vendors", "Entries"]);
    for store in stores {
        table.add_row(vec![
            store.name.clone(),
            store.layout.clone(),
            if store.paths.is_empty() {
                "-".to_string()
            } else {
                store.paths.join(", ")
            },
            store.vendor_root.clone().unwrap_or_else(|| "-".to_string()),
            match store.entries {
                Some(count) => count.to_string(),
                None => "not built".to_string(),
            },
        ]);
    }
    table.to_string()
}

pub fn format_store_list_json(stores: &[StoreSummary]) -> Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({ "stores": stores }))
        .map_err(|e| Error::Export(e.to_string()))
}

pub fn format_sections(store: &str, sections: &[String]) -> String {
    if sections.is_empty() {
        return format!("Store '{}' has no sections.", store);
    }
    let mut lines: Vec<String> = sections.iter().map(|s| format!("  {}", s)).collect();
    lines.insert(0, format!("Sections of '{}':", store));
    lines.join("\n")
}

/// Text output prints strings bare; everything else is pretty JSON.
pub fn format_value(value: &Value, format: &str) -> Result<String> {
    match (value, format) {
        (Value::String(s), "text") => Ok(s.clone()),
        _ => serde_json::to_string_pretty(value).map_err(|e| Error::Export(e.to_string())),
    }
}
