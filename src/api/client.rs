//! Retry- and rotation-aware wrapper around a pool of [`GenerativeClient`]s.
//!
//! Implements the outer-loop-over-keys, inner-loop-over-retries algorithm:
//! apply rate-limit admission, invoke the SDK, classify any failure, and
//! either backoff-retry, rotate to the next key, or propagate a terminal
//! error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::config::ApiClientConfig;
use crate::api::key_pool::KeyPool;
use crate::api::provider::{GenerateRequest, GenerateResponse, GenerativeClient};
use crate::api::providers::gemini::GeminiRestClient;
use crate::api::retry::{backoff_delay, with_jitter};
use crate::credential::Credential;
use crate::error::ApiError;
use crate::rate_limiter::RateLimiter;

/// Builds one [`GenerativeClient`] per credential and wraps them with
/// throttling, retry, and rotation.
pub struct ApiClient {
    pool: KeyPool,
    rate_limiter: RateLimiter,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Builds a client from a [`ApiClientConfig`] and a rate limiter shared
    /// across the whole job.
    ///
    /// For [`Credential::ApiKeys`], one [`GeminiRestClient`] is built per
    /// key. [`Credential::ServiceAccount`] and [`Credential::Default`] are
    /// treated as a single-identity pool using the ambient credential the
    /// REST client's transport already applies.
    #[must_use]
    pub fn new(config: ApiClientConfig, rate_limiter: RateLimiter) -> Self {
        let clients: Vec<Arc<dyn GenerativeClient>> = match &config.credential {
            Credential::ApiKeys(keys) => keys
                .iter()
                .map(|key| Arc::new(GeminiRestClient::new(key.clone())) as Arc<dyn GenerativeClient>)
                .collect(),
            Credential::ServiceAccount { .. } | Credential::Default => {
                vec![Arc::new(GeminiRestClient::new(String::new())) as Arc<dyn GenerativeClient>]
            }
        };

        Self {
            pool: KeyPool::new(clients),
            rate_limiter,
            config,
        }
    }

    /// Constructs an [`ApiClient`] directly from pre-built clients, for
    /// tests that need to inject a mock [`GenerativeClient`].
    #[must_use]
    pub fn from_clients(
        clients: Vec<Arc<dyn GenerativeClient>>,
        config: ApiClientConfig,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            pool: KeyPool::new(clients),
            rate_limiter,
            config,
        }
    }

    /// Runs the full retry/rotation algorithm for one generation request.
    ///
    /// # Errors
    ///
    /// - [`ApiError::ContentSafety`] immediately on a content-safety refusal
    ///   (the translator handles this at a higher layer).
    /// - [`ApiError::InvalidRequest`] when a single-credential pool receives
    ///   an invalid-request refusal, or when a multi-key pool exhausts
    ///   rotation on invalid-request errors.
    /// - [`ApiError::AllKeysExhausted`] when rotation finds no eligible key.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let key_count = self.pool.len().await;
        let supports_rotation = key_count > 1;

        loop {
            let current_index = self.pool.current_index().await;

            match self.try_current_key(request).await {
                Ok(response) => return Ok(response),
                Err(KeyOutcome::ContentSafety(err)) => return Err(err),
                Err(KeyOutcome::InvalidRequest(err)) => {
                    if !supports_rotation {
                        return Err(err);
                    }
                    warn!(key_index = current_index, "invalid request, rotating key");
                    self.pool.rotate().await?;
                }
                Err(KeyOutcome::QuotaExhausted) => {
                    self.pool.mark_quota_exhausted(current_index).await;
                    if !supports_rotation {
                        return Err(ApiError::AllKeysExhausted);
                    }
                    debug!(key_index = current_index, "quota exhausted, rotating key");
                    self.pool.rotate().await?;
                }
                Err(KeyOutcome::RetriesExhausted) => {
                    if !supports_rotation {
                        return Err(ApiError::AllKeysExhausted);
                    }
                    self.pool.rotate().await?;
                }
            }
        }
    }

    /// Runs the inner retry loop (backoff on transient failures) against
    /// the currently selected key.
    async fn try_current_key(&self, request: &GenerateRequest) -> Result<GenerateResponse, KeyOutcome> {
        for attempt in 0..self.config.max_retries {
            self.rate_limiter.admit().await;

            let result = self
                .pool
                .with_current(|client| {
                    let request = request.clone();
                    let timeout = self.config.timeout;
                    async move { client.generate(&request, timeout).await }
                })
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(ApiError::ContentSafety { message }) => {
                    return Err(KeyOutcome::ContentSafety(ApiError::ContentSafety { message }))
                }
                Err(ApiError::QuotaExhausted { .. }) => return Err(KeyOutcome::QuotaExhausted),
                Err(ApiError::InvalidRequest { message }) => {
                    return Err(KeyOutcome::InvalidRequest(ApiError::InvalidRequest {
                        message,
                    }))
                }
                Err(ApiError::RateLimited { message }) | Err(ApiError::Other(message)) => {
                    debug!(attempt, %message, "retryable failure, backing off");
                    let delay = with_jitter(backoff_delay(attempt), jitter_fraction());
                    tokio::time::sleep(delay).await;
                }
                Err(ApiError::Timeout(_) | ApiError::Transport(_) | ApiError::Decode(_)) => {
                    let delay = with_jitter(backoff_delay(attempt), jitter_fraction());
                    tokio::time::sleep(delay).await;
                }
                Err(ApiError::AllKeysExhausted) => return Err(KeyOutcome::RetriesExhausted),
            }
        }

        Err(KeyOutcome::RetriesExhausted)
    }
}

fn jitter_fraction() -> f64 {
    use rand::Rng;
    rand::rng().random_range(0.0..0.2)
}

enum KeyOutcome {
    ContentSafety(ApiError),
    InvalidRequest(ApiError),
    QuotaExhausted,
    RetriesExhausted,
}
