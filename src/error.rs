//! Error types for the ZPA control-plane client.

use crate::policy::ValidationFailure;
use thiserror::Error;

/// Result type alias using `ZpaError`.
pub type ZpaResult<T> = Result<T, ZpaError>;

/// Errors that can occur while reconciling resources against ZPA.
#[derive(Debug, Error)]
pub enum ZpaError {
    /// Login never produced a usable bearer token.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network failure or retryable status. Absorbed by the retry policy
    /// unless it is the last thing seen before the budget ran out.
    #[error("Transient failure calling {method} {path}: {reason}")]
    Transient {
        method: String,
        path: String,
        reason: String,
    },

    /// A policy operand references something that does not exist.
    #[error("validating policy rule conditions failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Lookup by id or name came back empty.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Retry budget exhausted, or a write answered with an unexpected status.
    #[error("{operation} {path} failed{}: {body}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    FatalHttp {
        operation: String,
        path: String,
        status: Option<u16>,
        body: String,
    },

    /// A page of a paginated listing came back with an unexpected status.
    #[error("Failed to fetch {resource} from {path} due to error: {message}")]
    Fetch {
        resource: String,
        path: String,
        message: String,
    },

    /// Missing credentials, bad settings, unknown resource kind.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Building the underlying HTTP client failed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZpaError {
    /// Whether the retry policy may try the call again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status attached to a fatal failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FatalHttp { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn fatal(
        operation: &str,
        path: &str,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::FatalHttp {
            operation: operation.to_string(),
            path: path.to_string(),
            status,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_message_includes_status_and_body() {
        let err = ZpaError::fatal("POST", "/signin", Some(503), "{\"message\":\"down\"}");
        assert_eq!(
            err.to_string(),
            "POST /signin failed with status 503: {\"message\":\"down\"}"
        );
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_fatal_message_without_status() {
        let err = ZpaError::fatal("GET", "/x", None, "connection refused");
        assert_eq!(err.to_string(), "GET /x failed: connection refused");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        let transient = ZpaError::Transient {
            method: "GET".into(),
            path: "/x".into(),
            reason: "status 502".into(),
        };
        assert!(transient.is_transient());
        assert!(!ZpaError::NotFound("x".into()).is_transient());
        assert!(!ZpaError::Authentication("x".into()).is_transient());
    }
}
