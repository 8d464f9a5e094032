//! ZPA Authentication
//!
//! Handles the client-credentials sign-in against `/signin` and holds the
//! resulting bearer token for the lifetime of one client.

use super::http::{sanitize_for_log, ZpaHttpClient};
use crate::error::{ZpaError, ZpaResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;

pub const ENV_CLIENT_ID: &str = "ZPA_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ZPA_CLIENT_SECRET";
pub const ENV_CUSTOMER_ID: &str = "ZPA_CUSTOMER_ID";

const SIGNIN_PATH: &str = "/signin";

/// API credentials, supplied once per client and never mutated.
///
/// The [`Debug`] impl redacts the secret.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub customer_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("customer_id", &self.customer_id)
            .finish()
    }
}

impl Credentials {
    pub fn new(client_id: &str, client_secret: &str, customer_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: SecretString::from(client_secret.to_string()),
            customer_id: customer_id.to_string(),
        }
    }

    /// Read credentials from `ZPA_CLIENT_ID`, `ZPA_CLIENT_SECRET` and
    /// `ZPA_CUSTOMER_ID`.
    pub fn from_env() -> ZpaResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Credentials::from_env`] with a pluggable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ZpaResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ZpaError::Config(format!("missing required environment variable {key}")))
        };

        Ok(Self {
            client_id: required(ENV_CLIENT_ID)?,
            client_secret: SecretString::from(required(ENV_CLIENT_SECRET)?),
            customer_id: required(ENV_CUSTOMER_ID)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SigninResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// A signed-in session. No refresh: if the service invalidates the token,
/// later calls fail and the failure is surfaced.
#[derive(Clone)]
pub struct AuthSession {
    token: SecretString,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AuthSession {
    /// Sign in with the client-credentials form and keep the bearer token.
    pub async fn authenticate(http: &ZpaHttpClient, credentials: &Credentials) -> ZpaResult<Self> {
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
        ];

        let response = http.send_form(SIGNIN_PATH, &form).await.map_err(|e| {
            ZpaError::Authentication(format!(
                "sign-in request failed, verify {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET}: {e}"
            ))
        })?;

        if response.status > 299 {
            return Err(ZpaError::Authentication(format!(
                "sign-in rejected with status {}, verify {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET}: {}",
                response.status,
                sanitize_for_log(&response.raw)
            )));
        }

        let Some(body) = response.json else {
            return Err(ZpaError::Authentication(
                "sign-in response had no JSON body".to_string(),
            ));
        };

        let token = serde_json::from_value::<SigninResponse>(body)
            .ok()
            .and_then(|r| r.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ZpaError::Authentication("sign-in response did not contain an access_token".to_string())
            })?;

        tracing::info!("Signed in as client {}", credentials.client_id);

        Ok(Self {
            token: SecretString::from(token),
        })
    }

    /// Build a session around a token obtained elsewhere.
    pub fn from_token(token: &str) -> Self {
        Self {
            token: SecretString::from(token.to_string()),
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}
