//! HTTP utilities for ZPA REST API calls

use super::retry::RetryPolicy;
use crate::error::{ZpaError, ZpaResult};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops non-printable characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let total = body.chars().count();
    let truncated = if total > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A decoded response: status code, raw body and the body parsed as JSON
/// when it parses.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub json: Option<Value>,
    pub raw: String,
}

impl ApiResponse {
    pub fn new(status: u16, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let json = if raw.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw).ok()
        };
        Self { status, json, raw }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` field the service puts in error bodies.
    pub fn message(&self) -> Option<&str> {
        self.json.as_ref()?.get("message")?.as_str()
    }

    /// Look up a top-level field of the JSON body.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.json.as_ref()?.get(key)
    }
}

/// HTTP client wrapper for ZPA API calls.
///
/// Every request, login included, goes through the same [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct ZpaHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ZpaHttpClient {
    /// Create a new HTTP client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> ZpaResult<Self> {
        url::Url::parse(base_url)?;

        let client = Client::builder()
            .user_agent(concat!("zpactl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a JSON request with retries.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&SecretString>,
        body: Option<&Value>,
    ) -> ZpaResult<ApiResponse> {
        let url = self.url_for(path);
        let url = url.as_str();
        let label = method.to_string();
        self.retry
            .execute(&label, path, move || {
                self.send_once(method.clone(), url, path, token, body)
            })
            .await
    }

    /// Send a form-encoded POST with retries (used for sign-in).
    pub async fn send_form(&self, path: &str, form: &[(&str, &str)]) -> ZpaResult<ApiResponse> {
        let url = self.url_for(path);
        let url = url.as_str();
        self.retry
            .execute("POST", path, move || async move {
                tracing::debug!("POST {} (form)", url);
                let request = self
                    .client
                    .post(url)
                    .header(ACCEPT, "application/json")
                    .form(form);
                Self::finish(request, "POST", path).await
            })
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        path: &str,
        token: Option<&SecretString>,
        body: Option<&Value>,
    ) -> ZpaResult<ApiResponse> {
        tracing::debug!("{} {}", method, url);

        let label = method.to_string();
        let is_delete = method == Method::DELETE;
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");

        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        // DELETE never carries a JSON null body
        match body {
            Some(Value::Null) if is_delete => {},
            Some(body) => request = request.json(body),
            None => {},
        }

        Self::finish(request, &label, path).await
    }

    async fn finish(
        request: reqwest::RequestBuilder,
        method: &str,
        path: &str,
    ) -> ZpaResult<ApiResponse> {
        let transient = |reason: String| ZpaError::Transient {
            method: method.to_string(),
            path: path.to_string(),
            reason,
        };

        let response = request
            .send()
            .await
            .map_err(|e| transient(format!("failed to send request: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transient(format!("failed to read response body: {e}")))?;

        if status >= 400 {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} {} - {} - {}", method, path, status, sanitize_for_log(&body));
        } else {
            tracing::debug!("API response: {} {} - {}", method, path, status);
        }

        Ok(ApiResponse::new(status, body))
    }
}

/// Short operator-facing hint for a failing status
pub fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Authentication failed. Check ZPA_CLIENT_ID and ZPA_CLIENT_SECRET."),
        403 => Some("Permission denied. Check the API key role and ZPA_CUSTOMER_ID."),
        404 => Some("Resource not found."),
        409 => Some("Resource conflict. The resource may already exist or be in use."),
        429 => Some("Rate limit exceeded. Please try again later."),
        500 | 502 | 503 | 504 => Some("ZPA service temporarily unavailable. Please try again."),
        _ => None,
    }
}
