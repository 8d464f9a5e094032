//! Exponential backoff with jitter, shared by every ZPA call (login included).
//!
//! The policy is a plain value handed to [`ZpaHttpClient`](super::http::ZpaHttpClient)
//! so tests can swap the jitter source and the sleeper for deterministic ones.

use super::http::ApiResponse;
use crate::error::{ZpaError, ZpaResult};
use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Predicate deciding whether a status ends the retry loop.
pub type TerminalStatus = fn(u16) -> bool;

/// Statuses below 299 succeed. 400 is also terminal: the service answers
/// validation problems with 400 and the caller inspects that body itself.
#[must_use]
pub fn default_terminal_status(status: u16) -> bool {
    status < 299 || status == 400
}

/// Source of the additive `uniform(0, 1)` second of jitter.
pub trait JitterSource: Send + Sync {
    fn jitter(&self) -> f64;
}

/// Uniform jitter in `[0, 1)` seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformJitter;

impl JitterSource for UniformJitter {
    fn jitter(&self) -> f64 {
        rand::rng().random_range(0.0..1.0)
    }
}

/// Constant jitter, for tests and reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn jitter(&self) -> f64 {
        self.0
    }
}

/// How the policy waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Retry policy configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every retry after it.
    pub base_delay: Duration,
    jitter: Arc<dyn JitterSource>,
    sleeper: Arc<dyn Sleeper>,
    terminal: TerminalStatus,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter: Arc::new(UniformJitter),
            sleeper: Arc::new(TokioSleeper),
            terminal: default_terminal_status,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_terminal_status(mut self, terminal: TerminalStatus) -> Self {
        self.terminal = terminal;
        self
    }

    #[must_use]
    pub fn is_terminal(&self, status: u16) -> bool {
        (self.terminal)(status)
    }

    /// `base * 2^attempt + jitter`, with `attempt` counted from zero.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let jitter = self.jitter.jitter().clamp(0.0, 1.0);
        exponential.saturating_add(Duration::from_secs_f64(jitter))
    }

    /// Run `call` until it yields a terminal status, fails with a
    /// non-transient error, or the retry budget is spent.
    ///
    /// Exhausting the budget returns [`ZpaError::FatalHttp`] carrying the
    /// last response body (or the last transport error).
    pub async fn execute<F, Fut>(&self, method: &str, path: &str, mut call: F) -> ZpaResult<ApiResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ZpaResult<ApiResponse>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let (status, body) = match call().await {
                Ok(response) if self.is_terminal(response.status) => {
                    if attempt > 0 {
                        debug!(method, path, attempts = attempt + 1, "call settled after retries");
                    }
                    return Ok(response);
                }
                Ok(response) => (Some(response.status), response.raw),
                Err(err) if err.is_transient() => (None, err.to_string()),
                Err(err) => return Err(err),
            };

            if attempt >= self.max_retries {
                warn!(method, path, attempts = attempt + 1, ?status, "max retries reached");
                return Err(ZpaError::fatal(
                    method,
                    path,
                    status,
                    format!("Reached max retries: {body}"),
                ));
            }

            let delay = self.delay_for(attempt);
            warn!(
                method,
                path,
                attempt = attempt + 1,
                ?status,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying after transient failure"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
