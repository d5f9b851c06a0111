//! Refresh presentation: outcomes, file listings, backups and exports.

use crate::build::RefreshOutcome;
use crate::report::DiscoveredFiles;
use crate::store::BackupRecord;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::Path;

pub fn format_refresh_outcome(store: &str, outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Published {
            entries,
            files,
            backup,
        } => {
            let mut s = format!(
                "Refreshed '{}': {} entries from {} file(s)",
                store, entries, files
            );
            if let Some(label) = backup {
                s.push_str(&format!("\n  Previous data kept as {}", label));
            }
            s
        }
        RefreshOutcome::Retained { error } => format!(
            "Refresh of '{}' failed; previous configuration retained:\n  {}",
            store, error
        ),
    }
}

pub fn format_discovered(listing: &[DiscoveredFiles]) -> String {
    let mut lines = Vec::new();
    for entry in listing {
        lines.push(format!("{} <- {} ({} file(s))", entry.store, entry.origin, entry.files.len()));
        for file in &entry.files {
            lines.push(format!("  {}", file.display()));
        }
    }
    lines.join("\n")
}

pub fn format_backups(store: &str, backups: &[BackupRecord]) -> String {
    if backups.is_empty() {
        return format!("No backups for '{}'.", store);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Label", "Generation", "Entries", "Created"]);
    for backup in backups {
        table.add_row(vec![
            backup.label.clone(),
            backup.generation.to_string(),
            backup.entries.to_string(),
            backup.created_at.clone(),
        ]);
    }
    table.to_string()
}

pub fn format_export_result(store: &str, target: &Path, bytes: usize) -> String {
    format!("Exported '{}' to {} ({} bytes)", store, target.display(), bytes)
}
