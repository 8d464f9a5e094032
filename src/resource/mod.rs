//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing ZPA resources.
//! Resource definitions are loaded from JSON at compile time, so a new kind
//! that follows the usual collection/item layout needs no code.
//!
//! # Architecture
//!
//! - [`fields`] - Wire <-> internal key conversion and null pruning
//! - [`record`] - The internal resource record
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`reconciler`] - Generic find/merge/create/update/delete logic
//! - [`generic`] - The catalog-driven [`ResourceApi`] implementation
//!
//! # Example
//!
//! ```ignore
//! use zpactl::resource::{get_resource, CatalogApi, Resource, ResourceReconciler};
//!
//! async fn ensure_group(client: &ZpaClient) -> zpactl::ZpaResult<()> {
//!     let def = get_resource("segment_group").unwrap();
//!     let desired = Resource::from_value(&serde_json::json!({"name": "G1", "enabled": true}))?;
//!     let reconciler = ResourceReconciler::new(CatalogApi::new(client, def, &desired)?);
//!     reconciler.upsert(&desired).await?;
//!     Ok(())
//! }
//! ```

pub mod fields;
mod generic;
mod reconciler;
mod record;
mod registry;

pub use fields::{FieldMapper, Fields};
pub use generic::CatalogApi;
pub use reconciler::{Action, Applied, Reconciled, ResourceApi, ResourceReconciler};
pub use record::{scalar_to_string, Resource};
pub use registry::*;
