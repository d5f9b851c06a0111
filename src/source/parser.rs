//! Section text parser.
//!
//! Turns one source file into a nested map. Supported syntax:
//!
//! ```text
//! ; comment
//! # comment
//! [section]
//! key = value
//! quoted = "kept as a string"
//! list[] = appended
//! map[sub] = associative entry
//! ```
//!
//! With typed coercion enabled, unquoted `null`, `true`/`false`, integers and
//! floats become the matching JSON values; everything else stays a string.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::path::Path;

/// Words that cannot be used as key names unless reserved-key escaping is on.
pub const RESERVED_WORDS: &[&str] = &["null", "yes", "no", "true", "false", "on", "off", "none"];

/// Parser switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Coerce unquoted literals to null/bool/int/float
    #[serde(default = "default_true")]
    pub typed: bool,
    /// Allow reserved words as key names
    #[serde(default)]
    pub escape_reserved_keys: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            typed: true,
            escape_reserved_keys: false,
        }
    }
}

enum KeyForm<'a> {
    Plain(&'a str),
    Append(&'a str),
    Entry(&'a str, &'a str),
}

/// Read and parse one file.
pub fn parse_file(path: &Path, sections: bool, options: ParseOptions) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text, path, sections, options)
}

/// Parse source text. `path` is only used for error messages.
///
/// When `sections` is false, headers are ignored and every key lands at the
/// top level.
pub fn parse_str(
    text: &str,
    path: &Path,
    sections: bool,
    options: ParseOptions,
) -> Result<Map<String, Value>> {
    let mut root = Map::new();
    let mut current: Option<String> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let fail = |message: String| Error::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let name = line
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .map(str::trim)
                .ok_or_else(|| fail(format!("malformed section header '{}'", line)))?;
            if name.is_empty() {
                return Err(fail("empty section name".to_string()));
            }
            if sections {
                match root
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
                {
                    Value::Object(_) => {}
                    _ => return Err(fail(format!("section '{}' clashes with a key", name))),
                }
                current = Some(name.to_string());
            }
            continue;
        }

        let (raw_key, raw_value) = line
            .split_once('=')
            .ok_or_else(|| fail(format!("expected 'key = value', found '{}'", line)))?;

        let form = parse_key(raw_key.trim()).map_err(&fail)?;
        let name = match form {
            KeyForm::Plain(n) | KeyForm::Append(n) | KeyForm::Entry(n, _) => n,
        };
        if !options.escape_reserved_keys
            && RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name))
        {
            return Err(fail(format!(
                "'{}' is a reserved word; enable reserved-key escaping to use it as a key",
                name
            )));
        }

        let value = parse_value(raw_value.trim(), options.typed).map_err(&fail)?;

        let target = if sections {
            let section = current
                .as_deref()
                .ok_or_else(|| fail(format!("key '{}' appears before any section", name)))?;
            match root.get_mut(section) {
                Some(Value::Object(map)) => map,
                _ => return Err(fail(format!("section '{}' is not a table", section))),
            }
        } else {
            &mut root
        };

        insert(target, form, value).map_err(&fail)?;
    }

    Ok(root)
}

fn parse_key(raw: &str) -> std::result::Result<KeyForm<'_>, String> {
    let form = match raw.find('[') {
        None => KeyForm::Plain(raw),
        Some(open) => {
            let name = raw[..open].trim_end();
            let inner = raw[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| format!("malformed key '{}'", raw))?
                .trim();
            if inner.is_empty() {
                KeyForm::Append(name)
            } else {
                KeyForm::Entry(name, inner)
            }
        }
    };

    let name = match form {
        KeyForm::Plain(n) | KeyForm::Append(n) | KeyForm::Entry(n, _) => n,
    };
    if name.is_empty() {
        return Err(format!("missing key name in '{}'", raw));
    }
    Ok(form)
}

fn insert(target: &mut Map<String, Value>, form: KeyForm<'_>, value: Value) -> std::result::Result<(), String> {
    match form {
        KeyForm::Plain(name) => {
            // Last assignment in a single file wins.
            target.insert(name.to_string(), value);
        }
        KeyForm::Append(name) => match target
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items.push(value),
            _ => return Err(format!("'{}' mixes list and scalar values", name)),
        },
        KeyForm::Entry(name, sub) => match target
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(map) => {
                map.insert(sub.to_string(), value);
            }
            _ => return Err(format!("'{}' mixes associative and scalar values", name)),
        },
    }
    Ok(())
}

fn parse_value(raw: &str, typed: bool) -> std::result::Result<Value, String> {
    if let Some(rest) = raw.strip_prefix('"') {
        let (text, tail) = read_double_quoted(rest)?;
        check_tail(tail)?;
        return Ok(Value::String(text));
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest
            .find('\'')
            .ok_or_else(|| "unterminated single-quoted value".to_string())?;
        check_tail(&rest[end + 1..])?;
        return Ok(Value::String(rest[..end].to_string()));
    }

    let bare = match raw.find(';') {
        Some(pos) => raw[..pos].trim_end(),
        None => raw,
    };
    Ok(if typed {
        coerce_scalar(bare)
    } else {
        Value::String(bare.to_string())
    })
}

fn read_double_quoted(rest: &str) -> std::result::Result<(String, &str), String> {
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &rest[i + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    Err("unterminated double-quoted value".to_string())
}

fn check_tail(tail: &str) -> std::result::Result<(), String> {
    let tail = tail.trim_start();
    if tail.is_empty() || tail.starts_with(';') || tail.starts_with('#') {
        Ok(())
    } else {
        Err(format!("unexpected text after quoted value: '{}'", tail))
    }
}

/// Typed coercion of an unquoted literal.
pub fn coerce_scalar(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if raw.contains(['.', 'e', 'E']) {
        if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}
