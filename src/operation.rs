//! Operation boundary
//!
//! One call in, one result out: credentials, a resource kind, the desired
//! state and a verb. Each run signs in on its own.

use crate::config::Settings;
use crate::error::{ZpaError, ZpaResult};
use crate::policy::{ApiReferenceLookup, PolicyRule, PolicyRuleApi};
use crate::resource::{
    get_all_kinds, get_policy_kind, get_resource, Action, CatalogApi, Reconciled, Resource, ResourceApi,
    ResourceDef, ResourceReconciler,
};
use crate::zpa::auth::Credentials;
use crate::zpa::client::ZpaClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::Instrument;
use uuid::Uuid;

/// What to do with the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    #[default]
    Present,
    Absent,
    Query,
}

impl FromStr for Verb {
    type Err = ZpaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            "query" | "gathered" => Ok(Self::Query),
            other => Err(ZpaError::Config(format!("unknown state \"{other}\""))),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// Result handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub changed: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Resolved target of an operation
enum Target {
    Catalog(&'static ResourceDef),
    Policy(&'static crate::resource::PolicyKindDef),
}

impl Target {
    fn resolve(kind: &str) -> ZpaResult<Self> {
        if let Some(def) = get_resource(kind) {
            return Ok(Self::Catalog(def));
        }
        if let Some(policy) = get_policy_kind(kind) {
            return Ok(Self::Policy(policy));
        }
        Err(ZpaError::Config(format!(
            "unknown resource kind \"{}\" (expected one of: {})",
            kind,
            get_all_kinds().join(", ")
        )))
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub credentials: Credentials,
    /// Catalog or policy rule kind, e.g. `segment_group`
    pub kind: String,
    /// Desired state in internal (snake_case) naming
    pub desired: Value,
    pub verb: Verb,
}

impl Operation {
    pub fn new(credentials: Credentials, kind: &str, desired: Value, verb: Verb) -> Self {
        Self {
            credentials,
            kind: kind.to_string(),
            desired,
            verb,
        }
    }

    /// Sign in and run against the API described by `settings`
    pub async fn run(&self, settings: &Settings) -> ZpaResult<OperationResult> {
        let span = tracing::info_span!(
            "operation",
            id = %Uuid::new_v4(),
            kind = %self.kind,
            verb = %self.verb
        );

        async {
            settings.validate()?;
            // fail on an unknown kind before signing in
            Target::resolve(&self.kind)?;
            let client = ZpaClient::connect(&self.credentials, settings).await?;
            self.run_with(&client).await
        }
        .instrument(span)
        .await
    }

    /// Run with an already signed-in client
    pub async fn run_with(&self, client: &ZpaClient) -> ZpaResult<OperationResult> {
        match Target::resolve(&self.kind)? {
            Target::Catalog(def) => {
                let desired = Resource::from_value(&self.desired)?;
                let api = CatalogApi::new(client, def, &desired)?;

                if def.singleton {
                    return match self.verb {
                        Verb::Query => Ok(OperationResult {
                            changed: false,
                            data: api.fetch_singleton().await?.into_value(),
                            warnings: Vec::new(),
                        }),
                        verb => Err(ZpaError::Config(format!(
                            "{} only support query, not {verb}",
                            def.display_name
                        ))),
                    };
                }

                reconcile(ResourceReconciler::new(api), self.verb, &desired).await
            },
            Target::Policy(kind) => {
                let desired = PolicyRule::from_internal(&self.desired)?;
                let api = PolicyRuleApi::connect(client, kind, ApiReferenceLookup::new(client)).await?;
                reconcile(ResourceReconciler::new(api), self.verb, &desired).await
            },
        }
    }
}

async fn reconcile<A: ResourceApi>(
    reconciler: ResourceReconciler<A>,
    verb: Verb,
    desired: &A::Item,
) -> ZpaResult<OperationResult> {
    let api = reconciler.api();

    match verb {
        Verb::Present => {
            let outcome = reconciler.upsert(desired).await?;
            finish(api, outcome)
        },
        Verb::Absent => {
            let outcome = reconciler.ensure_absent(desired).await?;
            finish(api, outcome)
        },
        Verb::Query => {
            let id = api.id_of(desired);
            let name = api.name_of(desired);
            let items = reconciler.query(id.as_deref(), name.as_deref()).await?;
            let data = items
                .iter()
                .map(|item| api.render(item))
                .collect::<ZpaResult<Vec<_>>>()?;
            Ok(OperationResult {
                changed: false,
                data: Value::Array(data),
                warnings: Vec::new(),
            })
        },
    }
}

fn finish<A: ResourceApi>(api: &A, outcome: Reconciled<A::Item>) -> ZpaResult<OperationResult> {
    tracing::info!("{} {:?}", api.kind(), outcome.action);
    let data = match (&outcome.action, &outcome.item) {
        (Action::Absent, _) | (_, None) => Value::Object(Default::default()),
        (_, Some(item)) => api.render(item)?,
    };

    Ok(OperationResult {
        changed: outcome.changed(),
        data,
        warnings: outcome.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parsing() {
        assert_eq!("present".parse::<Verb>().unwrap(), Verb::Present);
        assert_eq!("ABSENT".parse::<Verb>().unwrap(), Verb::Absent);
        assert_eq!("gathered".parse::<Verb>().unwrap(), Verb::Query);
        assert!("deleted".parse::<Verb>().is_err());
        assert_eq!(Verb::default(), Verb::Present);
    }

    #[test]
    fn test_target_resolution() {
        assert!(matches!(Target::resolve("segment_group"), Ok(Target::Catalog(_))));
        assert!(matches!(Target::resolve("policy_access_rule"), Ok(Target::Policy(_))));
        match Target::resolve("vpc") {
            Err(ZpaError::Config(msg)) => assert!(msg.contains("segment_group")),
            _ => panic!("expected a config error"),
        }
    }

    #[test]
    fn test_result_serialization_skips_empty_warnings() {
        let result = OperationResult {
            changed: true,
            data: serde_json::json!({"id": "1"}),
            warnings: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({"changed": true, "data": {"id": "1"}})
        );
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_before_sign_in() {
        let op = Operation::new(
            Credentials::new("id", "secret", "7200"),
            "nope",
            Value::Null,
            Verb::Query,
        );
        // unroutable base URL: reaching the network would fail differently
        let settings = Settings {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        assert!(matches!(op.run(&settings).await, Err(ZpaError::Config(_))));
    }
}
