//! Policy rules
//!
//! Typed rule records, the condition validator that gates every write, the
//! reorder step and the rule service that ties them to a policy set.

mod model;
mod reorder;
mod service;
mod validator;

pub use model::{Condition, ObjectType, Operand, PolicyRule};
pub use reorder::{ReorderCoordinator, ReorderOutcome};
pub use service::{fetch_rule, resolve_policy_set, rule_path, PolicyRuleApi};
pub use validator::{
    ApiReferenceLookup, PolicyConditionValidator, ReferenceKind, ReferenceLookup, Side, ValidationFailure,
    CLIENT_TYPES,
};
