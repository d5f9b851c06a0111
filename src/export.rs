//! JSON export of a store's contents.

use crate::error::{Error, Result};
use crate::merge::Collection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;

/// What to export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportSource {
    /// The live store contents.
    #[default]
    Published,
    /// A fresh read of the sources; the store is not touched.
    Sources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub source: ExportSource,
    pub pretty: bool,
    /// Escape `/` and every non-ASCII character.
    pub escaped: bool,
}

/// Render `collection` as JSON text.
///
/// Sections without keys are objects and render as `{}`.
pub fn render(collection: &Collection, options: &ExportOptions) -> Result<String> {
    let value = Value::Object(collection.clone());
    let text = if options.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| Error::Export(e.to_string()))?;

    Ok(if options.escaped {
        escape_text(&text)
    } else {
        text
    })
}

/// Render and write to `target`. Returns the number of bytes written.
pub fn write_export(target: &Path, collection: &Collection, options: &ExportOptions) -> Result<usize> {
    let mut text = render(collection, options)?;
    text.push('\n');
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(target, &text).map_err(|source| Error::Io {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(text.len())
}

// JSON structure never contains '/' or non-ASCII outside string literals,
// so the escapes can be applied to the rendered text as a whole.
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '/' => out.push_str("\\/"),
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out
}
