//! Reorder Coordinator
//!
//! Moves a rule to a requested position after it has been written. A failed
//! reorder never undoes the write; it is reported as a warning.

use super::model::PolicyRule;
use super::service::{fetch_rule, rule_path};
use crate::zpa::client::ZpaClient;
use crate::zpa::http::sanitize_for_log;

/// Rule after a reorder attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderOutcome {
    pub rule: PolicyRule,
    pub warning: Option<String>,
}

impl ReorderOutcome {
    fn untouched(rule: PolicyRule) -> Self {
        Self { rule, warning: None }
    }

    fn warn(rule: PolicyRule, message: String) -> Self {
        tracing::warn!("{}", message);
        Self {
            rule,
            warning: Some(message),
        }
    }
}

pub struct ReorderCoordinator<'a> {
    client: &'a ZpaClient,
    policy_set_id: &'a str,
}

impl<'a> ReorderCoordinator<'a> {
    pub fn new(client: &'a ZpaClient, policy_set_id: &'a str) -> Self {
        Self { client, policy_set_id }
    }

    pub fn reorder_path(&self, rule_id: &str, order: &str) -> String {
        format!(
            "{}/reorder/{}",
            rule_path(self.client, self.policy_set_id, rule_id),
            urlencoding::encode(order)
        )
    }

    /// Without an order the rule comes back unchanged. With one, the rule is
    /// moved and re-fetched.
    pub async fn reorder_if_requested(&self, rule: PolicyRule, desired_order: Option<&str>) -> ReorderOutcome {
        let Some(order) = desired_order.map(str::trim).filter(|o| !o.is_empty()) else {
            return ReorderOutcome::untouched(rule);
        };

        let Some(rule_id) = rule.id.clone() else {
            return ReorderOutcome::warn(rule, format!("cannot move a rule without id to position {order}"));
        };

        if !matches!(order.parse::<u32>(), Ok(n) if n > 0) {
            return ReorderOutcome::warn(rule, format!("invalid rule order \"{order}\" for rule {rule_id}"));
        }

        let path = self.reorder_path(&rule_id, order);
        tracing::info!("moving rule {} to position {}", rule_id, order);

        match self.client.put(&path, None).await {
            Ok(response) if response.status <= 299 => {},
            Ok(response) => {
                return ReorderOutcome::warn(
                    rule,
                    format!(
                        "reordering rule {} to {} failed with status {}: {}",
                        rule_id,
                        order,
                        response.status,
                        sanitize_for_log(&response.raw)
                    ),
                );
            },
            Err(e) => {
                return ReorderOutcome::warn(rule, format!("reordering rule {rule_id} to {order} failed: {e}"));
            },
        }

        match fetch_rule(self.client, self.policy_set_id, &rule_id).await {
            Ok(Some(moved)) => ReorderOutcome::untouched(moved),
            Ok(None) => ReorderOutcome::warn(rule, format!("rule {rule_id} could not be re-read after reorder")),
            Err(e) => ReorderOutcome::warn(rule, format!("rule {rule_id} could not be re-read after reorder: {e}")),
        }
    }
}
