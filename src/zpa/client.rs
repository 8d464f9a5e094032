//! ZPA Client
//!
//! Main client for interacting with the ZPA management API, combining
//! authentication, HTTP and pagination.

use super::auth::{AuthSession, Credentials};
use super::http::{ApiResponse, ZpaHttpClient};
use crate::config::Settings;
use crate::error::{ZpaError, ZpaResult};
use futures::{stream, Stream, TryStreamExt};
use reqwest::Method;
use serde_json::Value;

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Field carrying the page count in list responses
const TOTAL_PAGES_FIELD: &str = "totalPages";

/// Main ZPA client: one signed-in session, one customer.
#[derive(Clone, Debug)]
pub struct ZpaClient {
    pub session: AuthSession,
    pub http: ZpaHttpClient,
    customer_id: String,
    page_size: u32,
}

impl ZpaClient {
    /// Create a new ZPA client and sign in
    pub async fn connect(credentials: &Credentials, settings: &Settings) -> ZpaResult<Self> {
        let http = ZpaHttpClient::new(&settings.base_url, settings.timeout(), settings.retry_policy())?;
        let session = AuthSession::authenticate(&http, credentials).await?;

        Ok(Self::with_session(session, http, &credentials.customer_id).with_page_size(settings.page_size))
    }

    /// Assemble a client from an existing session
    pub fn with_session(session: AuthSession, http: ZpaHttpClient, customer_id: &str) -> Self {
        Self {
            session,
            http,
            customer_id: customer_id.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Make an authenticated request
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> ZpaResult<ApiResponse> {
        self.http
            .send(method, path, Some(self.session.token()), body)
            .await
    }

    /// Make a GET request to the ZPA API
    pub async fn get(&self, path: &str) -> ZpaResult<ApiResponse> {
        self.send(Method::GET, path, None).await
    }

    /// GET that treats a terminal 400 as a hard failure instead of handing
    /// it back for inspection
    pub async fn get_strict(&self, path: &str) -> ZpaResult<ApiResponse> {
        let response = self.get(path).await?;
        if response.status == 400 {
            return Err(ZpaError::fatal("GET", path, Some(400), response.raw));
        }
        Ok(response)
    }

    /// Make a POST request to the ZPA API
    pub async fn post(&self, path: &str, body: Option<&Value>) -> ZpaResult<ApiResponse> {
        self.send(Method::POST, path, body).await
    }

    /// Make a PUT request to the ZPA API
    pub async fn put(&self, path: &str, body: Option<&Value>) -> ZpaResult<ApiResponse> {
        self.send(Method::PUT, path, body).await
    }

    /// Make a DELETE request to the ZPA API
    pub async fn delete(&self, path: &str) -> ZpaResult<ApiResponse> {
        self.send(Method::DELETE, path, None).await
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    /// Build a management API v1 path scoped to the customer
    pub fn mgmt_v1_path(&self, resource: &str) -> String {
        format!(
            "/mgmtconfig/v1/admin/customers/{}/{}",
            self.customer_id,
            resource.trim_start_matches('/')
        )
    }

    /// Build a management API v2 path scoped to the customer
    pub fn mgmt_v2_path(&self, resource: &str) -> String {
        format!(
            "/mgmtconfig/v2/admin/customers/{}/{}",
            self.customer_id,
            resource.trim_start_matches('/')
        )
    }

    /// Build a user-config API path scoped to the customer
    pub fn userconfig_v1_path(&self, resource: &str) -> String {
        format!(
            "/userconfig/v1/customers/{}/{}",
            self.customer_id,
            resource.trim_start_matches('/')
        )
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Walk a list endpoint page by page, starting from page zero.
    ///
    /// The stream ends after the page the server reports as final, or at the
    /// first page whose list field is empty or missing. A page answered with
    /// anything but `expected_status` ends the stream with
    /// [`ZpaError::Fetch`].
    pub fn pages<'a>(
        &'a self,
        base_path: &'a str,
        list_key: &'a str,
        page_size: u32,
        expected_status: u16,
    ) -> impl Stream<Item = ZpaResult<Vec<Value>>> + 'a {
        let separator = if base_path.contains('?') { '&' } else { '?' };

        stream::try_unfold(Some(0u32), move |next| async move {
            let Some(page) = next else {
                return Ok(None);
            };

            let path = format!("{base_path}{separator}page={page}&pagesize={page_size}");
            let response = self.get(&path).await?;

            if response.status != expected_status {
                return Err(ZpaError::Fetch {
                    resource: list_key.to_string(),
                    path: base_path.to_string(),
                    message: response.message().unwrap_or("unknown").to_string(),
                });
            }

            let items = response
                .field(list_key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if items.is_empty() {
                tracing::debug!("{} page {} is empty, stopping", base_path, page);
                return Ok(None);
            }

            let total_pages = response.field(TOTAL_PAGES_FIELD).and_then(parse_count);
            let next = match total_pages {
                Some(total) if page + 1 < total => Some(page + 1),
                _ => None,
            };

            tracing::debug!(
                "{} page {} returned {} items (totalPages={:?})",
                base_path,
                page,
                items.len(),
                total_pages
            );

            Ok(Some((items, next)))
        })
    }

    /// Fetch all items of a list endpoint (auto-paginate)
    pub async fn paginate(
        &self,
        base_path: &str,
        list_key: &str,
        page_size: u32,
        expected_status: u16,
    ) -> ZpaResult<Vec<Value>> {
        self.pages(base_path, list_key, page_size, expected_status)
            .try_concat()
            .await
    }

    /// [`ZpaClient::paginate`] with the client's page size and a 200 expectation
    pub async fn paginate_all(&self, base_path: &str, list_key: &str) -> ZpaResult<Vec<Value>> {
        self.paginate(base_path, list_key, self.page_size, 200).await
    }
}

/// `totalPages` arrives as a number or as a numeric string
fn parse_count(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok()
}
