//! layerstore CLI binary
//!
//! Command-line interface for building and querying layered configuration stores.

use clap::Parser;
use layerstore::cli::{Cli, RunContext};
use layerstore::logging::{init_logging, LoggingConfig};
use layerstore::settings::{load_settings, Settings};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", layerstore::cli::map_error(&e));
            process::exit(1);
        }
    };

    let logging_config = build_logging_config(&cli, &settings);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("layerstore CLI starting");

    let context = match RunContext::new(settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error opening store database: {}", e);
            eprintln!("{}", layerstore::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", layerstore::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Logging from settings, overridden by CLI flags. Without --verbose or an
/// explicit level, logging stays at the settings level.
fn build_logging_config(cli: &Cli, settings: &Settings) -> LoggingConfig {
    let mut config = settings.logging.clone();

    if cli.verbose && cli.log_level.is_none() {
        config.level = "info".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }

    config
}
