//! Policy rule records
//!
//! Typed records whose serde form is the wire form (`camelCase`). The
//! internal form is produced level by level with [`FieldMapper`].

use crate::error::ZpaResult;
use crate::resource::{scalar_to_string, FieldMapper, Fields};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Operand object types a condition may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    App,
    AppGroup,
    Idp,
    ClientType,
    Posture,
    Saml,
    Scim,
    ScimGroup,
}

impl ObjectType {
    pub const ALL: [ObjectType; 8] = [
        Self::App,
        Self::AppGroup,
        Self::Idp,
        Self::ClientType,
        Self::Posture,
        Self::Saml,
        Self::Scim,
        Self::ScimGroup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "APP",
            Self::AppGroup => "APP_GROUP",
            Self::Idp => "IDP",
            Self::ClientType => "CLIENT_TYPE",
            Self::Posture => "POSTURE",
            Self::Saml => "SAML",
            Self::Scim => "SCIM",
            Self::ScimGroup => "SCIM_GROUP",
        }
    }

    /// Exact, case-sensitive match on the wire spelling
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ids, orders and timeouts arrive as strings or numbers
fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operand {
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub lhs: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub rhs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub idp_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

impl Operand {
    pub fn lhs(&self) -> &str {
        self.lhs.as_deref().unwrap_or("")
    }

    pub fn rhs(&self) -> &str {
        self.rhs.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negated: Option<bool>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub operands: Vec<Operand>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

/// One rule of a policy set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub policy_set_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reauth_default_rule: Option<bool>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub reauth_idle_timeout: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub reauth_timeout: Option<String>,
    /// Desired position inside the policy set
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub rule_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

fn pick<T: Clone>(preferred: &Option<T>, fallback: &Option<T>) -> Option<T> {
    preferred.clone().or_else(|| fallback.clone())
}

impl PolicyRule {
    /// Parse a wire object
    pub fn from_wire(value: &Value) -> ZpaResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Parse the internal (snake_case) form, e.g. a desired-state file
    pub fn from_internal(value: &Value) -> ZpaResult<Self> {
        let wire = map_levels(value.clone(), FieldMapper::to_wire);
        Self::from_wire(&wire)
    }

    /// Render in the internal (snake_case) form
    pub fn to_internal(&self) -> ZpaResult<Value> {
        let wire = serde_json::to_value(self)?;
        Ok(map_levels(wire, FieldMapper::to_internal))
    }

    /// Outbound payload: read-only condition and operand fields removed,
    /// nulls pruned
    pub fn to_payload(&self) -> ZpaResult<Value> {
        let value = serde_json::to_value(self.for_write())?;
        Ok(FieldMapper::prune(value))
    }

    /// Copy without the server-maintained parts of conditions and operands
    #[must_use]
    pub fn for_write(&self) -> PolicyRule {
        let conditions = self.conditions.as_ref().map(|conditions| {
            conditions
                .iter()
                .map(|c| Condition {
                    operator: c.operator.clone(),
                    negated: c.negated,
                    operands: c
                        .operands
                        .iter()
                        .map(|o| Operand {
                            object_type: o.object_type.clone(),
                            lhs: o.lhs.clone(),
                            rhs: o.rhs.clone(),
                            name: o.name.clone(),
                            idp_id: o.idp_id.clone(),
                            ..Operand::default()
                        })
                        .collect(),
                    ..Condition::default()
                })
                .collect()
        });

        PolicyRule {
            conditions,
            ..self.clone()
        }
    }

    /// Lay `self` (desired) over `existing`. The existing id is kept and a
    /// desired condition list replaces the existing one wholesale.
    #[must_use]
    pub fn merged_over(&self, existing: &PolicyRule) -> PolicyRule {
        PolicyRule {
            id: existing.id.clone(),
            name: pick(&self.name, &existing.name),
            description: pick(&self.description, &existing.description),
            action: pick(&self.action, &existing.action),
            action_id: pick(&self.action_id, &existing.action_id),
            custom_msg: pick(&self.custom_msg, &existing.custom_msg),
            default_rule: pick(&self.default_rule, &existing.default_rule),
            default_rule_name: pick(&self.default_rule_name, &existing.default_rule_name),
            operator: pick(&self.operator, &existing.operator),
            policy_set_id: pick(&existing.policy_set_id, &self.policy_set_id),
            policy_type: pick(&self.policy_type, &existing.policy_type),
            priority: pick(&self.priority, &existing.priority),
            reauth_default_rule: pick(&self.reauth_default_rule, &existing.reauth_default_rule),
            reauth_idle_timeout: pick(&self.reauth_idle_timeout, &existing.reauth_idle_timeout),
            reauth_timeout: pick(&self.reauth_timeout, &existing.reauth_timeout),
            rule_order: pick(&self.rule_order, &existing.rule_order),
            conditions: pick(&self.conditions, &existing.conditions),
        }
    }
}

/// Apply `map` to the rule object, each condition and each operand
fn map_levels(value: Value, map: fn(&Fields) -> Fields) -> Value {
    let Value::Object(top) = value else {
        return value;
    };
    let mut top = map(&top);

    if let Some(Value::Array(conditions)) = top.get_mut("conditions") {
        for condition in conditions.iter_mut() {
            let Value::Object(fields) = condition else {
                continue;
            };
            let mut mapped = map(fields);
            if let Some(Value::Array(operands)) = mapped.get_mut("operands") {
                for operand in operands.iter_mut() {
                    if let Value::Object(fields) = operand {
                        let renamed = map(fields);
                        *operand = Value::Object(renamed);
                    }
                }
            }
            *condition = Value::Object(mapped);
        }
    }

    Value::Object(top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_rule() -> Value {
        json!({
            "id": "216196257331291924",
            "name": "Allow engineering",
            "action": "ALLOW",
            "policySetId": "216196257331281233",
            "ruleOrder": "3",
            "conditions": [{
                "id": "c1",
                "operator": "OR",
                "negated": false,
                "creationTime": "1631718208",
                "operands": [
                    {"id": "o1", "objectType": "APP", "lhs": "id", "rhs": "216196257331291903"},
                    {"objectType": "SCIM_GROUP", "lhs": "216196257331281595", "rhs": "255066", "idpId": "216196257331281595"}
                ]
            }]
        })
    }

    #[test]
    fn test_object_type_parse() {
        assert_eq!(ObjectType::parse("SCIM_GROUP"), Some(ObjectType::ScimGroup));
        assert_eq!(ObjectType::parse("app"), None);
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_from_wire_accepts_numbers_for_ids() {
        let rule = PolicyRule::from_wire(&json!({"id": 42, "ruleOrder": 2, "priority": "1"})).unwrap();
        assert_eq!(rule.id.as_deref(), Some("42"));
        assert_eq!(rule.rule_order.as_deref(), Some("2"));
        assert_eq!(rule.priority.as_deref(), Some("1"));
    }

    #[test]
    fn test_internal_round_trip() {
        let rule = PolicyRule::from_wire(&wire_rule()).unwrap();
        let internal = rule.to_internal().unwrap();

        assert_eq!(internal["policy_set_id"], json!("216196257331281233"));
        assert_eq!(internal["conditions"][0]["creation_time"], json!("1631718208"));
        assert_eq!(internal["conditions"][0]["operands"][1]["idp_id"], json!("216196257331281595"));
        assert_eq!(internal["conditions"][0]["operands"][0]["object_type"], json!("APP"));

        assert_eq!(PolicyRule::from_internal(&internal).unwrap(), rule);
    }

    #[test]
    fn test_payload_strips_read_only_fields() {
        let rule = PolicyRule::from_wire(&wire_rule()).unwrap();
        let payload = rule.to_payload().unwrap();
        let condition = &payload["conditions"][0];

        assert_eq!(payload["id"], json!("216196257331291924"));
        assert!(condition.get("id").is_none());
        assert!(condition.get("creationTime").is_none());
        assert!(condition["operands"][0].get("id").is_none());
        assert_eq!(condition["operands"][1]["idpId"], json!("216196257331281595"));
    }

    #[test]
    fn test_merge_keeps_existing_id_and_fills_gaps() {
        let existing = PolicyRule::from_wire(&wire_rule()).unwrap();
        let desired = PolicyRule {
            id: Some("999".into()),
            name: Some("Allow engineering".into()),
            action: Some("DENY".into()),
            ..PolicyRule::default()
        };

        let merged = desired.merged_over(&existing);
        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.action.as_deref(), Some("DENY"));
        assert_eq!(merged.conditions, existing.conditions);
        assert_eq!(merged.rule_order.as_deref(), Some("3"));
    }
}
