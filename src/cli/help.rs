//! CLI command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name string for log fields (e.g. "get", "set_item").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Get { .. } => "get",
        Commands::Set { .. } => "set",
        Commands::SetItem { .. } => "set_item",
        Commands::Delete { .. } => "delete",
        Commands::List { .. } => "list",
        Commands::Sections { .. } => "sections",
        Commands::Refresh { .. } => "refresh",
        Commands::Export { .. } => "export",
        Commands::Backups { .. } => "backups",
    }
}

/// Store targeted by a command, if any.
pub fn command_store(command: &Commands) -> Option<&str> {
    match command {
        Commands::Get { store, .. }
        | Commands::Set { store, .. }
        | Commands::SetItem { store, .. }
        | Commands::Delete { store, .. }
        | Commands::Sections { store }
        | Commands::Export { store, .. }
        | Commands::Backups { store } => Some(store),
        Commands::Refresh { store, .. } => store.as_deref(),
        Commands::List { .. } => None,
    }
}
