//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::Error;

/// Map domain errors to a string for CLI output, prefixed with the error kind.
pub fn map_error(e: &Error) -> String {
    format!("error[{}]: {}", e.kind(), e)
}
