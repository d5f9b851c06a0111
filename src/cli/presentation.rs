//! CLI presentation: text and json formatters per command family.

mod refresh;
mod store;

pub use refresh::{format_backups, format_discovered, format_export_result, format_refresh_outcome};
pub use store::{
    format_sections, format_store_list_json, format_store_list_text, format_value, StoreSummary,
};
