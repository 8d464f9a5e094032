//! ZPA API interaction module
//!
//! This module provides the core functionality for talking to the Zscaler
//! Private Access management API: sign-in, the retrying HTTP client and
//! pagination.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials and the client-credentials sign-in
//! - [`client`] - Main ZPA client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//! - [`retry`] - Backoff policy shared by every call
//!
//! # Example
//!
//! ```ignore
//! use zpactl::zpa::{auth::Credentials, client::ZpaClient};
//! use zpactl::config::Settings;
//!
//! async fn example() -> zpactl::ZpaResult<()> {
//!     let client = ZpaClient::connect(&Credentials::from_env()?, &Settings::default()).await?;
//!     let groups = client
//!         .paginate_all(&client.mgmt_v1_path("segmentGroup"), "list")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod retry;
