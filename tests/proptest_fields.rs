//! Property-based tests using proptest
//!
//! These tests check the naming conversions and null pruning of the field
//! mapper against randomized keys and documents.

use proptest::prelude::*;
use serde_json::{Map, Value};
use zpactl::resource::fields::{camel_to_snake, snake_to_camel, FieldMapper, Fields};

/// camelCase keys as the API sends them
fn arb_camel_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}([A-Z][a-z0-9]{0,6}){0,3}"
}

/// snake_case keys as callers write them
fn arb_snake_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}(_[a-z][a-z0-9]{0,6}){0,3}"
}

/// Arbitrary JSON with nulls sprinkled at every depth
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(arb_camel_key(), inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_fields() -> impl Strategy<Value = Fields> {
    prop::collection::btree_map(arb_camel_key(), arb_json(), 0..8).prop_map(|m| m.into_iter().collect())
}

fn has_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(has_null),
        Value::Object(map) => map.values().any(has_null),
        _ => false,
    }
}

proptest! {
    /// camelCase survives a trip through snake_case
    #[test]
    fn camel_round_trips(key in arb_camel_key()) {
        prop_assert_eq!(snake_to_camel(&camel_to_snake(&key)), key);
    }

    /// snake_case survives a trip through camelCase
    #[test]
    fn snake_round_trips(key in arb_snake_key()) {
        prop_assert_eq!(camel_to_snake(&snake_to_camel(&key)), key);
    }

    /// Internal keys never carry uppercase letters
    #[test]
    fn internal_keys_are_lowercase(key in arb_camel_key()) {
        let snake = camel_to_snake(&key);
        prop_assert!(!snake.chars().any(|c| c.is_ascii_uppercase()));
    }

    /// Pruning twice is the same as pruning once
    #[test]
    fn prune_is_idempotent(value in arb_json()) {
        let once = FieldMapper::prune(value);
        let twice = FieldMapper::prune(once.clone());
        prop_assert_eq!(once, twice);
    }

    /// No null survives pruning, at any depth
    #[test]
    fn prune_leaves_no_nulls(value in arb_json()) {
        let pruned = FieldMapper::prune(value);
        // a bare null stays a bare null, there is no container to drop it from
        if !pruned.is_null() {
            prop_assert!(!has_null(&pruned));
        }
    }

    /// Outbound payloads are null-free and keep every non-null top-level key
    #[test]
    fn wire_payload_drops_only_nulls(fields in arb_fields()) {
        let internal = FieldMapper::to_internal(&fields);
        let wire = FieldMapper::to_wire(&internal);

        prop_assert!(!has_null(&Value::Object(wire.clone())));

        let expected: Vec<&String> = fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k)
            .collect();
        let actual: Vec<&String> = wire.keys().collect();
        prop_assert_eq!(actual, expected);
    }

    /// Inbound mapping never changes values, only names
    #[test]
    fn to_internal_keeps_values(fields in arb_fields()) {
        let internal = FieldMapper::to_internal(&fields);
        for (key, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
            prop_assert_eq!(internal.get(&camel_to_snake(key)), Some(value));
        }
        prop_assert!(internal.values().all(|v| !v.is_null()));
    }
}

#[test]
fn known_wire_names() {
    let mut wire = Map::new();
    wire.insert("policySetId".to_string(), Value::from("55"));
    wire.insert("ruleOrder".to_string(), Value::from("2"));
    wire.insert("description".to_string(), Value::Null);

    let internal = FieldMapper::to_internal(&wire);
    assert_eq!(internal.len(), 2);
    assert_eq!(internal["policy_set_id"], Value::from("55"));
    assert_eq!(internal["rule_order"], Value::from("2"));
}
