//! Field Mapper
//!
//! Converts between the wire naming (`camelCase`) and the internal naming
//! (`snake_case`), and strips nulls from outbound payloads.

use serde_json::{Map, Value};

/// A single object's fields
pub type Fields = Map<String, Value>;

/// Stateless wire <-> internal converter.
pub struct FieldMapper;

impl FieldMapper {
    /// Rename every key of one object to `snake_case`, dropping null values.
    ///
    /// Not recursive: nested objects keep their wire keys and are mapped
    /// explicitly by whoever owns them.
    pub fn to_internal(wire: &Fields) -> Fields {
        wire.iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (camel_to_snake(k), v.clone()))
            .collect()
    }

    /// Rename every key of one object to `camelCase`, then prune nulls at
    /// every depth.
    pub fn to_wire(internal: &Fields) -> Fields {
        let renamed = internal
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (snake_to_camel(k), v.clone()))
            .collect();
        Self::prune_map(renamed)
    }

    /// Remove nulls from maps and sequences, recursively.
    ///
    /// Idempotent: pruning a pruned value returns it unchanged.
    pub fn prune(value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(Self::prune_map(map)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(Self::prune)
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn prune_map(map: Fields) -> Fields {
        map.into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k, Self::prune(v)))
            .collect()
    }

    /// Map each object of a nested list with [`FieldMapper::to_internal`].
    /// Non-object items pass through.
    pub fn list_to_internal(items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::Object(map) => Value::Object(Self::to_internal(map)),
                other => other.clone(),
            })
            .collect()
    }

    /// Map each object of a nested list with [`FieldMapper::to_wire`].
    pub fn list_to_wire(items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                Value::Object(map) => Value::Object(Self::to_wire(map)),
                other => Self::prune(other.clone()),
            })
            .collect()
    }
}

/// `policySetId` -> `policy_set_id`: an underscore goes before every
/// uppercase letter except a leading one, then everything is lower-cased.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// `policy_set_id` -> `policySetId`: each word is capitalized (first letter
/// upper, rest lower), empty words become `_`, and the first letter of the
/// result is lower-cased.
pub fn snake_to_camel(key: &str) -> String {
    let joined: String = key
        .split('_')
        .map(|word| {
            if word.is_empty() {
                "_".to_string()
            } else {
                capitalize(word)
            }
        })
        .collect();

    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("policySetId"), "policy_set_id");
        assert_eq!(camel_to_snake("id"), "id");
        assert_eq!(camel_to_snake("lssHost"), "lss_host");
        assert_eq!(camel_to_snake("ZPNClientTypeZAPP"), "z_p_n_client_type_z_a_p_p");
        assert_eq!(camel_to_snake("ipACL"), "ip_a_c_l");
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("policy_set_id"), "policySetId");
        assert_eq!(snake_to_camel("id"), "id");
        assert_eq!(snake_to_camel("use_tls"), "useTls");
        assert_eq!(snake_to_camel("reauth_idle_timeout"), "reauthIdleTimeout");
        assert_eq!(snake_to_camel("SHOUT_CASE"), "shoutCase");
        assert_eq!(snake_to_camel("a__b"), "a_B");
        assert_eq!(snake_to_camel(""), "");
    }

    #[test]
    fn test_to_internal_drops_nulls_and_is_shallow() {
        let wire = obj(json!({
            "configSpace": "DEFAULT",
            "description": null,
            "servers": [{"serverId": "1"}],
        }));
        let internal = FieldMapper::to_internal(&wire);
        assert_eq!(
            Value::Object(internal),
            json!({"config_space": "DEFAULT", "servers": [{"serverId": "1"}]})
        );
    }

    #[test]
    fn test_to_wire_prunes_nested_nulls() {
        let internal = obj(json!({
            "name": "G1",
            "description": null,
            "enabled": true,
            "applications": [{"id": "1", "name": null}, null],
            "ui_config": {"theme": null, "tabs": [null, {"x": null}]}
        }));
        let wire = FieldMapper::to_wire(&internal);
        assert_eq!(
            Value::Object(wire),
            json!({
                "name": "G1",
                "enabled": true,
                "applications": [{"id": "1"}],
                "uiConfig": {"tabs": [{}]}
            })
        );
    }

    #[test]
    fn test_prune_keeps_falsy_values() {
        let value = json!({"a": false, "b": 0, "c": "", "d": [], "e": {}});
        assert_eq!(FieldMapper::prune(value.clone()), value);
    }

    #[test]
    fn test_list_mapping() {
        let items = vec![json!({"idpId": "7", "objectType": null}), json!("raw"), Value::Null];
        assert_eq!(
            FieldMapper::list_to_internal(&items),
            vec![json!({"idp_id": "7"}), json!("raw")]
        );
        let internal = vec![json!({"idp_id": "7", "object_type": null})];
        assert_eq!(FieldMapper::list_to_wire(&internal), vec![json!({"idpId": "7"})]);
    }
}
