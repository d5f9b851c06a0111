//! CLI domain: parse, route, help, output, and presentation only.
//! No store logic; single route table dispatches to the facade and the build pipeline.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, command_store};
pub use output::map_error;
pub use parse::{Cli, Commands, ValueType};
pub use presentation::{
    format_backups, format_discovered, format_export_result, format_refresh_outcome,
    format_sections, format_store_list_json, format_store_list_text, format_value, StoreSummary,
};
pub use route::{parse_value, RunContext};
