//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads every ZPA resource definition from the embedded
//! catalog and provides lookup functions for the rest of the crate.

use super::fields::{camel_to_snake, snake_to_camel, FieldMapper, Fields};
use super::record::{scalar_to_string, Resource};
use crate::error::{ZpaError, ZpaResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/zpa.json")];

fn default_list_key() -> String {
    "list".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// Collection path with `{customer_id}` and `{<path_param>}` placeholders
    pub path: String,
    /// Field holding the page array in list responses
    #[serde(default = "default_list_key")]
    pub list_key: String,
    /// Dot path of the lookup name inside the internal record
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Declared internal field names. `id` and `name` are always implied.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Lists of objects mapped element by element
    #[serde(default)]
    pub nested_lists: Vec<String>,
    /// Objects mapped one level deeper
    #[serde(default)]
    pub nested_objects: Vec<String>,
    /// Internal fields substituted into the path instead of sent in the body
    #[serde(default)]
    pub path_params: Vec<String>,
    /// Wire names that the generic camelCase rule cannot produce
    #[serde(default)]
    pub wire_names: HashMap<String, String>,
    #[serde(default)]
    pub read_only: bool,
    /// The endpoint answers with one object instead of a paged list
    #[serde(default)]
    pub singleton: bool,
}

impl ResourceDef {
    /// Whether `field` survives declared-field mapping
    pub fn declares(&self, field: &str) -> bool {
        field == "id" || field == "name" || self.fields.is_empty() || self.fields.iter().any(|f| f == field)
    }

    fn wire_name(&self, field: &str) -> String {
        self.wire_names
            .get(field)
            .cloned()
            .unwrap_or_else(|| snake_to_camel(field))
    }

    fn internal_name(&self, wire_key: &str) -> String {
        self.wire_names
            .iter()
            .find(|(_, wire)| wire.as_str() == wire_key)
            .map(|(field, _)| field.clone())
            .unwrap_or_else(|| camel_to_snake(wire_key))
    }

    fn is_path_only(&self, field: &str) -> bool {
        self.path_params.iter().any(|p| p == field) && !self.fields.iter().any(|f| f == field)
    }

    /// Drop the fields a write would not send
    pub fn retain_declared(&self, resource: &Resource) -> Resource {
        resource
            .fields()
            .iter()
            .filter(|(field, _)| self.declares(field) && !self.is_path_only(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect::<Fields>()
            .into()
    }

    /// Wire object -> internal record, keeping only declared fields
    pub fn map_from_wire(&self, wire: &Fields) -> Resource {
        let mut internal = Fields::new();

        for (key, value) in wire {
            if value.is_null() {
                continue;
            }
            let field = self.internal_name(key);
            if !self.declares(&field) {
                continue;
            }
            let value = match value {
                Value::Array(items) if self.nested_lists.contains(&field) => {
                    Value::Array(FieldMapper::list_to_internal(items))
                },
                Value::Object(map) if self.nested_objects.contains(&field) => {
                    Value::Object(FieldMapper::to_internal(map))
                },
                other => other.clone(),
            };
            internal.insert(field, value);
        }

        Resource::from(internal)
    }

    /// Internal record -> outbound wire payload, declared fields only,
    /// pruned of nulls at every depth
    pub fn map_to_wire(&self, resource: &Resource) -> Fields {
        let mut wire = Fields::new();

        for (field, value) in resource.fields() {
            if value.is_null() || !self.declares(field) || self.is_path_only(field) {
                continue;
            }
            let value = match value {
                Value::Array(items) if self.nested_lists.contains(field) => {
                    Value::Array(FieldMapper::list_to_wire(items))
                },
                Value::Object(map) if self.nested_objects.contains(field) => {
                    Value::Object(FieldMapper::to_wire(map))
                },
                other => other.clone(),
            };
            wire.insert(self.wire_name(field), value);
        }

        FieldMapper::prune_map(wire)
    }

    /// Expand the collection path for one customer. Path parameters are
    /// read from `values` and must be present.
    pub fn collection_path(&self, customer_id: &str, values: &Resource) -> ZpaResult<String> {
        let mut path = self
            .path
            .replace("{customer_id}", &urlencoding::encode(customer_id));

        for param in &self.path_params {
            let value = values
                .get(param)
                .and_then(scalar_to_string)
                .ok_or_else(|| ZpaError::Config(format!("{} requires `{}`", self.display_name, param)))?;
            path = path.replace(&format!("{{{param}}}"), &urlencoding::encode(&value));
        }

        Ok(path)
    }
}

/// Append an escaped id to a collection path
pub fn item_path(collection: &str, id: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), urlencoding::encode(id))
}

/// Policy rule kind from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyKindDef {
    pub display_name: String,
    /// Policy set type, e.g. `ACCESS_POLICY`
    pub policy_type: String,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
    #[serde(default)]
    pub policy_rules: HashMap<String, PolicyKindDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
            policy_rules: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
            final_config.policy_rules.extend(partial.policy_rules);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get a policy rule kind by key
pub fn get_policy_kind(key: &str) -> Option<&'static PolicyKindDef> {
    get_registry().policy_rules.get(key)
}

/// Get all resource keys
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect()
}

/// Every kind the CLI accepts, sorted
pub fn get_all_kinds() -> Vec<&'static str> {
    let registry = get_registry();
    let mut kinds: Vec<&str> = registry
        .resources
        .keys()
        .chain(registry.policy_rules.keys())
        .map(|s| s.as_str())
        .collect();
    kinds.sort_unstable();
    kinds
}
