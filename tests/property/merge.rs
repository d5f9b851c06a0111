//! Override merge properties: the later collection wins key by key

use layerstore::merge::{merge_override, Collection};
use proptest::collection::btree_map;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

type Sections = BTreeMap<String, BTreeMap<String, i64>>;

fn sections() -> impl Strategy<Value = Sections> {
    btree_map("[a-d]{2}", btree_map("[a-d]{2}", any::<i64>(), 0..6), 0..5)
}

fn to_collection(sections: &Sections) -> Collection {
    sections
        .iter()
        .map(|(section, keys)| (section.clone(), json!(keys)))
        .collect()
}

/// Every key of the later collection carries the later value; earlier keys
/// the later collection does not mention survive
#[test]
fn test_later_values_win() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(sections(), sections()), |(earlier, later)| {
            let mut merged = to_collection(&earlier);
            merge_override(&mut merged, to_collection(&later), true);

            for (section, keys) in &later {
                for (key, value) in keys {
                    prop_assert_eq!(&merged[section][key], &json!(value));
                }
            }
            for (section, keys) in &earlier {
                for (key, value) in keys {
                    if later.get(section).map_or(true, |k| !k.contains_key(key)) {
                        prop_assert_eq!(&merged[section][key], &json!(value));
                    }
                }
            }
            Ok(())
        })
        .unwrap();
}

/// Without sections, whole top-level values are replaced
#[test]
fn test_flat_override_replaces_values() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(sections(), sections()), |(earlier, later)| {
            let mut merged = to_collection(&earlier);
            let incoming = to_collection(&later);
            merge_override(&mut merged, incoming.clone(), false);

            for (section, value) in &incoming {
                prop_assert_eq!(merged.get(section), Some(value));
            }
            prop_assert!(merged.values().all(Value::is_object));
            Ok(())
        })
        .unwrap();
}
