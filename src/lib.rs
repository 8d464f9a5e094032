//! Declarative control-plane client for Zscaler Private Access.
//!
//! Brings ZPA resources and access/timeout/forwarding policy rules to a
//! desired state: find by id or name, merge, create, update or delete.
//!
//! - [`zpa`] - sign-in, the retrying HTTP client and pagination
//! - [`resource`] - field mapping, the embedded resource catalog and the
//!   generic reconciler
//! - [`policy`] - policy rule records, condition validation and reordering
//! - [`operation`] - the single entry point used by the CLI

pub mod config;
pub mod error;
pub mod operation;
pub mod policy;
pub mod resource;
pub mod zpa;

pub use error::{ZpaError, ZpaResult};
pub use operation::{Operation, OperationResult, Verb};
