//! Credential resolution for the generative API.
//!
//! Modeled as a tagged variant rather than an inheritance hierarchy: the
//! three supported modes are mutually exclusive and resolved once, at
//! `ApiClient` construction.

use serde::{Deserialize, Serialize};

/// How the pipeline authenticates against the generative API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// One or more API keys. The client builds one sub-client per key and
    /// rotates between them on quota exhaustion or invalid-request errors.
    ApiKeys(Vec<String>),
    /// A cloud service-account credential (Vertex AI-style). No rotation is
    /// possible; there is exactly one identity.
    ServiceAccount {
        /// Path to the service-account credential file.
        file: String,
        /// Cloud project identifier.
        project: String,
        /// Cloud region/location.
        location: String,
    },
    /// Rely on whatever ambient credential the environment provides (e.g. a
    /// default application credential). No rotation is possible.
    Default,
}

impl Credential {
    /// Number of distinct identities this credential can rotate between.
    #[must_use]
    pub fn key_count(&self) -> usize {
        match self {
            Self::ApiKeys(keys) => keys.len(),
            Self::ServiceAccount { .. } | Self::Default => 1,
        }
    }

    /// Whether this credential mode supports rotating between multiple
    /// identities on failure.
    #[must_use]
    pub const fn supports_rotation(&self) -> bool {
        matches!(self, Self::ApiKeys(_))
    }
}

/// Wire representation used when reading credentials out of a job config
/// file or CLI flags, before they're resolved into a [`Credential`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// Explicit API keys, if any.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Whether to use the Vertex AI / service-account path.
    #[serde(default)]
    pub use_vertex_ai: bool,
    /// Service-account credential file path, required when `use_vertex_ai`.
    #[serde(default)]
    pub service_account_file_path: Option<String>,
    /// Cloud project, required when `use_vertex_ai`.
    #[serde(default)]
    pub gcp_project: Option<String>,
    /// Cloud location, required when `use_vertex_ai`.
    #[serde(default)]
    pub gcp_location: Option<String>,
}

impl CredentialSpec {
    /// Resolves this spec into a concrete [`Credential`].
    ///
    /// Precedence: explicit API keys, then Vertex AI service account (if
    /// `use_vertex_ai` and the required fields are present), else
    /// [`Credential::Default`].
    #[must_use]
    pub fn resolve(self) -> Credential {
        if !self.api_keys.is_empty() {
            return Credential::ApiKeys(self.api_keys);
        }
        if self.use_vertex_ai {
            if let (Some(project), Some(location)) = (self.gcp_project, self.gcp_location) {
                return Credential::ServiceAccount {
                    file: self.service_account_file_path.unwrap_or_default(),
                    project,
                    location,
                };
            }
        }
        Credential::Default
    }
}
