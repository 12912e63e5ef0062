//! Construction-time configuration for [`crate::api::client::ApiClient`].

use std::time::Duration;

use crate::api::retry::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::credential::Credential;

/// Parameters needed to build an [`crate::api::client::ApiClient`] from a
/// resolved [`Credential`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// The resolved credential.
    pub credential: Credential,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Maximum in-key retries before rotating to the next credential.
    pub max_retries: u32,
}

impl ApiClientConfig {
    /// Builds a config with the default timeout and retry count.
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the max retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
