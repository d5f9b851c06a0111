//! Flattening properties: composite keys split back into their parts

use layerstore::definition::{StoreKind, DEFAULT_DELIMITER};
use layerstore::flatten::{flatten_collection, flatten_key, split_key, unflatten_entries};
use layerstore::grammar::{KeyGrammar, LengthTier};
use layerstore::merge::Collection;
use proptest::prelude::*;
use serde_json::Value;

const SECTION: &str = "[A-Za-z0-9._-]{2,24}";
const KEY: &str = "[A-Za-z0-9._():\\[\\]-]{2,24}";

/// Splitting a composite key at the first delimiter recovers section and key
#[test]
fn test_flatten_then_split_is_identity() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let grammar = KeyGrammar::extended(LengthTier::Short);

    runner
        .run(&(SECTION, KEY), |(section, key)| {
            let composite = flatten_key(&section, &key, DEFAULT_DELIMITER, &grammar).unwrap();
            let (s, k) = split_key(&composite, DEFAULT_DELIMITER).unwrap();
            prop_assert_eq!(s, section.as_str());
            prop_assert_eq!(k, key.as_str());
            Ok(())
        })
        .unwrap();
}

/// Composite keys longer than the tier are always rejected as too long
#[test]
fn test_overlong_composites_rejected() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let grammar = KeyGrammar::extended(LengthTier::Short);

    runner
        .run(&(SECTION, 61usize..100), |(section, key_len)| {
            let key = "k".repeat(key_len);
            let result = flatten_key(&section, &key, DEFAULT_DELIMITER, &grammar);
            let too_long = section.len() + DEFAULT_DELIMITER.len() + key_len > grammar.max_len();
            prop_assert_eq!(result.is_err(), too_long);
            if let Err(err) = result {
                prop_assert!(err.is_too_long());
            }
            Ok(())
        })
        .unwrap();
}

/// Flattening a collection and regrouping the entries gives the collection back
#[test]
fn test_flatten_collection_round_trip() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let kind = StoreKind::sectioned_flattened();
    let layout = kind.layout();
    let sections = prop::collection::btree_map(
        SECTION,
        prop::collection::btree_map(KEY, any::<i64>(), 1..4),
        1..4,
    );

    runner
        .run(&sections, |sections| {
            let mut collection = Collection::new();
            for (section, keys) in sections {
                let keys: Collection = keys
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect();
                collection.insert(section, Value::Object(keys));
            }

            let entries = flatten_collection(collection.clone(), &kind).unwrap();
            prop_assert_eq!(unflatten_entries(entries, &layout), collection);
            Ok(())
        })
        .unwrap();
}
