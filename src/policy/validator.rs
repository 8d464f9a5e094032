//! Policy Condition Validator
//!
//! Checks that every operand of a rule references something that exists
//! before the rule is written.

use super::model::{Condition, ObjectType, Operand};
use crate::error::{ZpaError, ZpaResult};
use crate::zpa::client::ZpaClient;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Client types a CLIENT_TYPE operand may name
pub const CLIENT_TYPES: &[&str] = &[
    "zpn_client_type_zapp",
    "zpn_client_type_exporter",
    "zpn_client_type_browser_isolation",
    "zpn_client_type_machine_tunnel",
    "zpn_client_type_ip_anchoring",
    "zpn_client_type_edge_connector",
    "zpn_client_type_slogger",
];

/// Operand side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lhs => f.write_str("LHS"),
            Self::Rhs => f.write_str("RHS"),
        }
    }
}

/// First operand that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("when operand object type is {object_type} {side} must be {expected}, value is \"{actual}\"")]
    Reference {
        object_type: ObjectType,
        side: Side,
        expected: &'static str,
        actual: String,
    },

    #[error("invalid operand object type \"{0}\"")]
    InvalidObjectType(String),
}

/// Kinds of object an operand can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    ApplicationSegment,
    SegmentGroup,
    Idp,
    PostureProfile,
    SamlAttribute,
    ScimAttribute,
    ScimGroup,
}

/// Existence checks used by the validator
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    /// `Ok(false)` when the object does not exist. `Err` only when the
    /// lookup itself could not be carried out.
    async fn exists(&self, kind: ReferenceKind, id: &str) -> ZpaResult<bool>;
}

/// [`ReferenceLookup`] against the live API
pub struct ApiReferenceLookup<'a> {
    client: &'a ZpaClient,
    posture_udids: OnceCell<HashSet<String>>,
}

impl<'a> ApiReferenceLookup<'a> {
    pub fn new(client: &'a ZpaClient) -> Self {
        Self {
            client,
            posture_udids: OnceCell::new(),
        }
    }

    async fn posture_udids(&self) -> ZpaResult<&HashSet<String>> {
        self.posture_udids
            .get_or_try_init(|| async {
                let profiles = self
                    .client
                    .paginate_all(&self.client.mgmt_v2_path("posture"), "list")
                    .await?;
                Ok(profiles
                    .iter()
                    .filter_map(|p| p.get("postureUdid").and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect())
            })
            .await
    }
}

#[async_trait]
impl ReferenceLookup for ApiReferenceLookup<'_> {
    async fn exists(&self, kind: ReferenceKind, id: &str) -> ZpaResult<bool> {
        let id_segment = urlencoding::encode(id);
        let response = match kind {
            ReferenceKind::PostureProfile => return Ok(self.posture_udids().await?.contains(id)),
            ReferenceKind::ApplicationSegment => {
                self.client
                    .get(&self.client.mgmt_v1_path(&format!("application/{id_segment}")))
                    .await
            },
            ReferenceKind::SegmentGroup => {
                self.client
                    .get_strict(&self.client.mgmt_v1_path(&format!("segmentGroup/{id_segment}")))
                    .await
            },
            ReferenceKind::Idp => {
                self.client
                    .get_strict(&self.client.mgmt_v1_path(&format!("idp/{id_segment}")))
                    .await
            },
            ReferenceKind::SamlAttribute => {
                self.client
                    .get_strict(&self.client.mgmt_v1_path(&format!("samlAttribute/{id_segment}")))
                    .await
            },
            ReferenceKind::ScimAttribute => {
                self.client
                    .get_strict(&self.client.mgmt_v1_path(&format!("idp/scimattribute/{id_segment}")))
                    .await
            },
            ReferenceKind::ScimGroup => {
                self.client
                    .get_strict(&self.client.userconfig_v1_path(&format!("scimgroup/{id_segment}")))
                    .await
            },
        };

        match response {
            Ok(response) => Ok(response.status == 200),
            // a 404 that outlived the retry budget
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Validates rule conditions against a [`ReferenceLookup`]
pub struct PolicyConditionValidator<L> {
    lookup: L,
}

impl<L: ReferenceLookup> PolicyConditionValidator<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Conditions in order, operands in order; stops at the first failure
    pub async fn validate(&self, conditions: &[Condition]) -> ZpaResult<()> {
        for condition in conditions {
            for operand in &condition.operands {
                if let Some(failure) = self.check_operand(operand).await? {
                    tracing::warn!("{}", failure);
                    return Err(ZpaError::Validation(failure));
                }
            }
        }
        Ok(())
    }

    /// `Ok(None)` when the operand is valid
    pub async fn check_operand(&self, operand: &Operand) -> ZpaResult<Option<ValidationFailure>> {
        let raw_type = operand.object_type.as_deref().unwrap_or("");
        let Some(object_type) = ObjectType::parse(raw_type) else {
            return Ok(Some(ValidationFailure::InvalidObjectType(raw_type.to_string())));
        };

        let fail = |side: Side, expected: &'static str, actual: &str| -> ZpaResult<Option<ValidationFailure>> {
            Ok(Some(ValidationFailure::Reference {
                object_type,
                side,
                expected,
                actual: actual.to_string(),
            }))
        };

        match object_type {
            ObjectType::App | ObjectType::AppGroup | ObjectType::Idp => {
                let (kind, expected) = match object_type {
                    ObjectType::App => (ReferenceKind::ApplicationSegment, "an existing application segment ID"),
                    ObjectType::AppGroup => (ReferenceKind::SegmentGroup, "an existing segment group ID"),
                    _ => (ReferenceKind::Idp, "an existing IDP ID"),
                };
                let (side, value) = reference_of(operand);
                if !self.resolves(kind, value).await? {
                    return fail(side, expected, value);
                }
            },
            ObjectType::ClientType => {
                let (side, value) = reference_of(operand);
                if !CLIENT_TYPES.contains(&value) {
                    return fail(side, "a supported client type", value);
                }
            },
            ObjectType::Posture => {
                if !self.resolves(ReferenceKind::PostureProfile, operand.lhs()).await? {
                    return fail(Side::Lhs, "a valid posture profile ID", operand.lhs());
                }
                if !matches!(operand.rhs(), "true" | "false") {
                    return fail(Side::Rhs, "\"true\" or \"false\"", operand.rhs());
                }
            },
            ObjectType::Saml | ObjectType::Scim => {
                let (kind, expected) = if object_type == ObjectType::Saml {
                    (ReferenceKind::SamlAttribute, "a valid SAML attribute ID")
                } else {
                    (ReferenceKind::ScimAttribute, "a valid SCIM attribute ID")
                };
                if !self.resolves(kind, operand.lhs()).await? {
                    return fail(Side::Lhs, expected, operand.lhs());
                }
                if operand.rhs().is_empty() {
                    return fail(Side::Rhs, "a non-empty attribute value", operand.rhs());
                }
            },
            ObjectType::ScimGroup => {
                if !self.resolves(ReferenceKind::Idp, operand.lhs()).await? {
                    return fail(Side::Lhs, "a valid IDP ID", operand.lhs());
                }
                if !self.resolves(ReferenceKind::ScimGroup, operand.rhs()).await? {
                    return fail(Side::Rhs, "an existing SCIM group ID", operand.rhs());
                }
            },
        }

        Ok(None)
    }

    async fn resolves(&self, kind: ReferenceKind, id: &str) -> ZpaResult<bool> {
        if id.is_empty() {
            return Ok(false);
        }
        self.lookup.exists(kind, id).await
    }
}

/// `lhs = "id"` carries the reference in `rhs`; otherwise it is in `lhs`
fn reference_of(operand: &Operand) -> (Side, &str) {
    if operand.lhs() == "id" {
        (Side::Rhs, operand.rhs())
    } else {
        (Side::Lhs, operand.lhs())
    }
}
