//! Mapping between merged collections and store entries.
//!
//! Sectioned-flattened stores join `(section, key)` into one composite key
//! with the store's delimiter. The delimiter is drawn from characters that
//! keys may contain but sections may not, so splitting at its first
//! occurrence always recovers the original pair.

use crate::definition::{EntryLayout, KeyMode, StoreKind};
use crate::error::{ConfigurationError, Result};
use crate::grammar::{CharClass, GrammarError, IdentKind, KeyGrammar};
use crate::merge::Collection;
use serde_json::Value;

/// A delimiter must be non-empty and use only characters that are legal in
/// keys but illegal in sections.
pub fn validate_delimiter(delimiter: &str) -> Result<(), ConfigurationError> {
    let legal = !delimiter.is_empty()
        && delimiter
            .chars()
            .all(|c| CharClass::Extended.allows(c) && !CharClass::Standard.allows(c));
    if legal {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidDelimiter(delimiter.to_string()))
    }
}

/// Join `section` and `key`, checking the composite against `grammar`.
pub fn flatten_key(
    section: &str,
    key: &str,
    delimiter: &str,
    grammar: &KeyGrammar,
) -> Result<String, GrammarError> {
    let composite = format!("{}{}{}", section, delimiter, key);
    let len = composite.chars().count();
    if len > grammar.max_len() {
        return Err(GrammarError::CompositeTooLong {
            section: section.to_string(),
            key: key.to_string(),
            len,
            max: grammar.max_len(),
        });
    }
    if !grammar.validate(&composite) {
        return Err(GrammarError::CompositeMalformed {
            section: section.to_string(),
            key: key.to_string(),
            composite,
        });
    }
    Ok(composite)
}

/// Split a composite key at the first delimiter.
pub fn split_key<'k>(composite: &'k str, delimiter: &str) -> Option<(&'k str, &'k str)> {
    composite
        .split_once(delimiter)
        .filter(|(section, key)| !section.is_empty() && !key.is_empty())
}

/// Turn a merged collection into store entries for `kind`.
///
/// Sections are checked against the name grammar. Flat keys, composite keys
/// and the keys inside a native section are checked against the key grammar.
pub fn flatten_collection(collection: Collection, kind: &StoreKind) -> Result<Vec<(String, Value)>> {
    let names = kind.name_grammar();
    let keys = kind.key_grammar();
    let mut entries = Vec::with_capacity(collection.len());

    match kind.layout() {
        EntryLayout::Flat => {
            for (key, value) in collection {
                let key = match kind.key_mode {
                    KeyMode::Flat => keys.key_convert(IdentKind::Key, &key)?,
                    KeyMode::DomainSectioned => {
                        keys.check(IdentKind::Key, &key)?;
                        key
                    }
                };
                entries.push((key, value));
            }
        }
        EntryLayout::Sectioned => {
            for (section, value) in collection {
                names.check(IdentKind::Section, &section)?;
                if let Value::Object(map) = &value {
                    for key in map.keys() {
                        keys.check(IdentKind::Key, key)?;
                    }
                }
                entries.push((section, value));
            }
        }
        EntryLayout::Flattened { delimiter } => {
            for (section, value) in collection {
                names.check(IdentKind::Section, &section)?;
                match value {
                    Value::Object(map) => {
                        for (key, value) in map {
                            let composite = flatten_key(&section, &key, &delimiter, &keys)?;
                            entries.push((composite, value));
                        }
                    }
                    other => entries.push((section, other)),
                }
            }
        }
    }

    Ok(entries)
}

/// Rebuild a collection from store entries.
pub fn unflatten_entries<I>(entries: I, layout: &EntryLayout) -> Collection
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut collection = Collection::new();
    let EntryLayout::Flattened { delimiter } = layout else {
        collection.extend(entries);
        return collection;
    };

    for (composite, value) in entries {
        match split_key(&composite, delimiter) {
            Some((section, key)) => {
                let slot = collection
                    .entry(section.to_string())
                    .or_insert_with(|| Value::Object(Collection::new()));
                if let Value::Object(map) = slot {
                    map.insert(key.to_string(), value);
                }
            }
            None => {
                collection.insert(composite, value);
            }
        }
    }
    collection
}
