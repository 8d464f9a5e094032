//! Policy rule service
//!
//! [`ResourceApi`] for the rules of one global policy set. Every write is
//! validated first and followed by a re-read and an optional reorder.

use super::model::PolicyRule;
use super::reorder::ReorderCoordinator;
use super::validator::{PolicyConditionValidator, ReferenceLookup};
use crate::error::{ZpaError, ZpaResult};
use crate::resource::{scalar_to_string, Applied, PolicyKindDef, ResourceApi};
use crate::zpa::client::ZpaClient;
use async_trait::async_trait;
use serde_json::Value;

/// `policySet/{set}/rule/{id}` for the client's customer
pub fn rule_path(client: &ZpaClient, policy_set_id: &str, rule_id: &str) -> String {
    client.mgmt_v1_path(&format!(
        "policySet/{}/rule/{}",
        urlencoding::encode(policy_set_id),
        urlencoding::encode(rule_id)
    ))
}

/// Read one rule; `None` for anything but a 200
pub async fn fetch_rule(client: &ZpaClient, policy_set_id: &str, rule_id: &str) -> ZpaResult<Option<PolicyRule>> {
    let response = client.get(&rule_path(client, policy_set_id, rule_id)).await?;
    if response.status != 200 {
        return Ok(None);
    }
    response.json.as_ref().map(PolicyRule::from_wire).transpose()
}

/// Id of the global policy set of `policy_type`
pub async fn resolve_policy_set(client: &ZpaClient, policy_type: &str) -> ZpaResult<String> {
    let path = client.mgmt_v1_path(&format!("policySet/policyType/{}", urlencoding::encode(policy_type)));
    let response = client.get(&path).await?;

    if response.status != 200 {
        return Err(ZpaError::fatal("GET", &path, Some(response.status), response.raw));
    }

    response
        .field("id")
        .and_then(scalar_to_string)
        .ok_or_else(|| ZpaError::NotFound(format!("global policy set for {policy_type}")))
}

pub struct PolicyRuleApi<'a, L> {
    client: &'a ZpaClient,
    display_name: String,
    policy_type: String,
    policy_set_id: String,
    validator: PolicyConditionValidator<L>,
}

impl<'a, L: ReferenceLookup> PolicyRuleApi<'a, L> {
    /// Resolve the policy set of `kind` and build the service
    pub async fn connect(client: &'a ZpaClient, kind: &PolicyKindDef, lookup: L) -> ZpaResult<Self> {
        let policy_set_id = resolve_policy_set(client, &kind.policy_type).await?;
        tracing::debug!("{} live in policy set {}", kind.display_name, policy_set_id);
        Ok(Self::new(client, kind, &policy_set_id, lookup))
    }

    pub fn new(client: &'a ZpaClient, kind: &PolicyKindDef, policy_set_id: &str, lookup: L) -> Self {
        Self {
            client,
            display_name: kind.display_name.clone(),
            policy_type: kind.policy_type.clone(),
            policy_set_id: policy_set_id.to_string(),
            validator: PolicyConditionValidator::new(lookup),
        }
    }

    pub fn policy_set_id(&self) -> &str {
        &self.policy_set_id
    }

    pub fn policy_type(&self) -> &str {
        &self.policy_type
    }

    /// Validated wire payload for a write
    async fn prepare(&self, rule: &PolicyRule) -> ZpaResult<Value> {
        let outbound = PolicyRule {
            policy_set_id: Some(self.policy_set_id.clone()),
            ..rule.for_write()
        };
        self.validator
            .validate(outbound.conditions.as_deref().unwrap_or(&[]))
            .await?;
        outbound.to_payload()
    }

    /// Re-read the written rule, then move it when the requested position
    /// differs from where it landed
    async fn settle(
        &self,
        rule_id: Option<String>,
        written: PolicyRule,
        desired_order: Option<String>,
    ) -> ZpaResult<Applied<PolicyRule>> {
        let current = match rule_id {
            Some(id) => fetch_rule(self.client, &self.policy_set_id, &id)
                .await?
                .unwrap_or(written),
            None => written,
        };

        let wanted = desired_order.filter(|order| current.rule_order.as_ref() != Some(order));
        let outcome = ReorderCoordinator::new(self.client, &self.policy_set_id)
            .reorder_if_requested(current, wanted.as_deref())
            .await;

        Ok(Applied {
            item: outcome.rule,
            warnings: outcome.warning.into_iter().collect(),
        })
    }
}

#[async_trait]
impl<L: ReferenceLookup> ResourceApi for PolicyRuleApi<'_, L> {
    type Item = PolicyRule;

    fn kind(&self) -> &str {
        &self.display_name
    }

    fn id_of(&self, item: &PolicyRule) -> Option<String> {
        item.id.clone()
    }

    fn name_of(&self, item: &PolicyRule) -> Option<String> {
        item.name.clone()
    }

    fn merge(&self, existing: &PolicyRule, desired: &PolicyRule) -> PolicyRule {
        desired.merged_over(existing)
    }

    fn is_unchanged(&self, existing: &PolicyRule, merged: &PolicyRule) -> bool {
        existing.for_write() == merged.for_write()
    }

    fn render(&self, item: &PolicyRule) -> ZpaResult<Value> {
        item.to_internal()
    }

    async fn get_by_id(&self, id: &str) -> ZpaResult<Option<PolicyRule>> {
        fetch_rule(self.client, &self.policy_set_id, id).await
    }

    async fn list_all(&self) -> ZpaResult<Vec<PolicyRule>> {
        let path = self.client.mgmt_v1_path(&format!(
            "policySet/rules/policyType/{}",
            urlencoding::encode(&self.policy_type)
        ));
        self.client
            .paginate_all(&path, "list")
            .await?
            .iter()
            .map(PolicyRule::from_wire)
            .collect()
    }

    async fn create(&self, desired: &PolicyRule) -> ZpaResult<Applied<PolicyRule>> {
        let fresh = PolicyRule {
            id: None,
            ..desired.clone()
        };
        let payload = self.prepare(&fresh).await?;
        let path = self
            .client
            .mgmt_v1_path(&format!("policySet/{}/rule", urlencoding::encode(&self.policy_set_id)));

        let response = self.client.post(&path, Some(&payload)).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("POST", &path, Some(response.status), response.raw));
        }

        let created_id = response.field("id").and_then(scalar_to_string);
        let written = match response.json.as_ref() {
            Some(json) if json.is_object() => PolicyRule::from_wire(json)?,
            _ => fresh,
        };
        self.settle(created_id, written, desired.rule_order.clone()).await
    }

    async fn update(&self, merged: &PolicyRule, desired: &PolicyRule) -> ZpaResult<Applied<PolicyRule>> {
        let id = merged
            .id
            .clone()
            .ok_or_else(|| ZpaError::NotFound(format!("{} without id", self.display_name)))?;
        let payload = self.prepare(merged).await?;
        let path = rule_path(self.client, &self.policy_set_id, &id);

        let response = self.client.put(&path, Some(&payload)).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("PUT", &path, Some(response.status), response.raw));
        }

        // merged carries the stale order of the existing rule; only a
        // caller-supplied order may move it
        self.settle(Some(id), merged.clone(), desired.rule_order.clone()).await
    }

    async fn delete(&self, id: &str) -> ZpaResult<u16> {
        let path = rule_path(self.client, &self.policy_set_id, id);
        let response = self.client.delete(&path).await?;
        if response.status > 299 {
            return Err(ZpaError::fatal("DELETE", &path, Some(response.status), response.raw));
        }
        Ok(response.status)
    }
}
