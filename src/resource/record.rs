//! Resource record
//!
//! The internal (snake_case) form of one catalog resource.

use super::fields::Fields;
use crate::error::{ZpaError, ZpaResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One resource in internal naming. `id` is present once the server has
/// assigned it; `name` is the best-effort secondary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    fields: Fields,
}

impl From<Fields> for Resource {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a JSON object; anything else is a configuration error
    pub fn from_value(value: &Value) -> ZpaResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map.clone())),
            Value::Null => Ok(Self::new()),
            other => Err(ZpaError::Config(format!(
                "desired state must be an object, got {other}"
            ))),
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Server-assigned id. Numeric ids are rendered as strings.
    pub fn id(&self) -> Option<String> {
        self.get("id").and_then(scalar_to_string)
    }

    pub fn name(&self) -> Option<String> {
        self.lookup("name").and_then(scalar_to_string)
    }

    /// Resolve a dot-separated path (`config.name`, `servers.0.id`)
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;

        for part in parts {
            current = match part.parse::<usize>() {
                Ok(idx) => current.get(idx)?,
                Err(_) => current.get(part)?,
            };
        }

        (!current.is_null()).then_some(current)
    }

    /// Desired fields laid over this resource. Null desired values do not
    /// erase existing ones, and this resource's `id` always survives.
    #[must_use]
    pub fn merged_with(&self, desired: &Resource) -> Resource {
        let mut merged = self.fields.clone();
        for (key, value) in &desired.fields {
            if key == "id" || value.is_null() {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        if let Some(id) = self.fields.get("id") {
            merged.insert("id".to_string(), id.clone());
        }
        Resource::from(merged)
    }
}

/// Render a scalar JSON value as a string (ids arrive as either)
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(value: Value) -> Resource {
        Resource::from_value(&value).unwrap()
    }

    #[test]
    fn test_id_and_name() {
        let r = resource(json!({"id": 72058, "name": "G1"}));
        assert_eq!(r.id().as_deref(), Some("72058"));
        assert_eq!(r.name().as_deref(), Some("G1"));
        assert_eq!(resource(json!({"id": ""})).id(), None);
    }

    #[test]
    fn test_lookup_nested_path() {
        let r = resource(json!({
            "config": {"name": "lss-1"},
            "servers": [{"id": "s1"}, {"id": "s2"}]
        }));
        assert_eq!(r.lookup("config.name"), Some(&json!("lss-1")));
        assert_eq!(r.lookup("servers.1.id"), Some(&json!("s2")));
        assert_eq!(r.lookup("servers.5.id"), None);
        assert_eq!(r.lookup("missing"), None);
    }

    #[test]
    fn test_merge_keeps_existing_id() {
        let existing = resource(json!({"id": "1", "name": "G1", "enabled": false, "description": "old"}));
        let desired = resource(json!({"id": "999", "name": "G1", "enabled": true, "description": null}));
        let merged = existing.merged_with(&desired);

        assert_eq!(
            merged.into_value(),
            json!({"id": "1", "name": "G1", "enabled": true, "description": "old"})
        );
    }

    #[test]
    fn test_merge_without_existing_id_drops_desired_id() {
        let existing = resource(json!({"name": "G1"}));
        let desired = resource(json!({"id": "5", "enabled": true}));
        assert_eq!(existing.merged_with(&desired).id(), None);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Resource::from_value(&json!([1, 2])).is_err());
        assert_eq!(Resource::from_value(&Value::Null).unwrap(), Resource::new());
    }
}
