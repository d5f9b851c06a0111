//! CLI parse: clap types for layerstore. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Layered configuration stores built from section files
#[derive(Parser, Debug)]
#[command(name = "layerstore")]
#[command(about = "Build, query and export layered configuration stores")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (added on top of the global and workspace settings)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at info level unless --log-level is given (default level: warn)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file; default: stderr)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a value, a section, or the whole store
    Get {
        store: String,
        /// Key (composite in flattened stores unless --section is given)
        key: Option<String>,
        #[arg(long)]
        section: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Write one value into the live store
    Set {
        store: String,
        key: String,
        value: String,
        #[arg(long)]
        section: Option<String>,
        /// How to interpret VALUE
        #[arg(long = "type", value_enum, default_value = "auto")]
        value_type: ValueType,
    },
    /// Write one item inside an associative value
    SetItem {
        store: String,
        key: String,
        item: String,
        value: String,
        #[arg(long)]
        section: Option<String>,
        #[arg(long = "type", value_enum, default_value = "auto")]
        value_type: ValueType,
    },
    /// Remove a key from the live store
    Delete {
        store: String,
        key: String,
        #[arg(long)]
        section: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List configured stores
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the sections of a store
    Sections { store: String },
    /// Rebuild one store, or every configured store, from its sources
    Refresh {
        store: Option<String>,
        /// Treat sources without entries as an empty configuration
        #[arg(long)]
        allow_none: bool,
        /// Print the files each source contributed
        #[arg(long)]
        show_files: bool,
    },
    /// Write a store as JSON
    Export {
        store: String,
        target: PathBuf,
        /// Read the sources instead of the live store
        #[arg(long)]
        from_sources: bool,
        #[arg(long)]
        pretty: bool,
        /// Escape slashes and non-ASCII characters
        #[arg(long)]
        escaped: bool,
    },
    /// Show the backups kept by earlier rebuilds
    Backups { store: String },
}

/// Interpretation of a value given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    /// Same coercion as source files
    Auto,
    String,
    Int,
    Float,
    Bool,
    /// Comma-separated items, each coerced like `auto`
    Array,
    /// Any JSON document
    Json,
}
