//! Source files: locating them and parsing them.

pub mod parser;
pub mod reader;

pub use parser::{coerce_scalar, parse_file, parse_str, ParseOptions};
pub use reader::SourceReader;
