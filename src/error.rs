//! Domain error types for the translation pipeline.
//!
//! Each component owns a focused error enum; [`PipelineError`] aggregates
//! them for callers that cross component boundaries (the orchestrator, the
//! CLI). Library code returns `Result<T, XError>` from the owning module and
//! converts with `?` via `#[from]` where a caller needs the aggregate.

use thiserror::Error;

/// Convenience alias for pipeline-level results.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from [`crate::chunk`].
#[derive(Debug, Error)]
pub enum ChunkError {
    /// `max_size` was zero or negative.
    #[error("max_size must be greater than 0, got {0}")]
    InvalidMaxSize(i64),
}

/// Errors from [`crate::rate_limiter`].
#[derive(Debug, Error)]
pub enum RateLimiterError {
    /// `rpm` is not a valid non-negative value.
    #[error("requests_per_minute must be >= 0, got {0}")]
    InvalidRpm(i64),
}

/// Classification of an API failure, used to drive the retry/rotation
/// algorithm in [`crate::api::retry`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was refused on content-safety grounds. Non-retryable at
    /// this layer; the translator handles it via recursive splitting.
    #[error("content safety refusal: {message}")]
    ContentSafety {
        /// Raw message or reason reported by the API.
        message: String,
    },

    /// Quota exhausted for the current credential.
    #[error("quota exhausted: {message}")]
    QuotaExhausted {
        /// Raw message reported by the API.
        message: String,
    },

    /// Transient rate limiting, not quota exhaustion (429/503/timeout).
    #[error("rate limited: {message}")]
    RateLimited {
        /// Raw message reported by the API.
        message: String,
    },

    /// The request itself was invalid (bad model name, auth, permissions).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Raw message reported by the API.
        message: String,
    },

    /// No credential in the pool is currently eligible (all in cooldown or
    /// exhausted).
    #[error("all API keys exhausted")]
    AllKeysExhausted,

    /// Request exceeded the configured HTTP timeout.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport-level failure (connection, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be decoded as the expected shape.
    #[error("response decode error: {0}")]
    Decode(String),

    /// Generic/unclassified failure from the SDK boundary.
    #[error("api error: {0}")]
    Other(String),
}

impl ApiError {
    /// Whether this error is retryable with backoff (not a hard stop).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Transport(_) | Self::Other(_)
        )
    }
}

/// Errors from [`crate::translator`].
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The prompt template is missing a placeholder required by the active
    /// configuration (fatal at job start; no API calls are made).
    #[error("prompt template is missing required placeholder {{{{{placeholder}}}}}")]
    MissingPlaceholder {
        /// The placeholder name (without braces) that was required.
        placeholder: String,
    },

    /// The underlying API call failed in a way the safety-retry loop could
    /// not resolve.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Translation was cancelled before completion.
    #[error("translation cancelled")]
    Cancelled,
}

/// Errors from [`crate::glossary`].
#[derive(Debug, Error)]
pub enum GlossaryError {
    /// Underlying API failure while extracting terms.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Failed to read or write the glossary JSON file.
    #[error("glossary I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the glossary JSON structure.
    #[error("glossary JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from [`crate::filestore`].
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Underlying filesystem failure.
    #[error("file I/O error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Metadata JSON failed to parse.
    #[error("metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input file was not valid UTF-8.
    #[error("input file is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

/// Errors from [`crate::config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field was missing.
    #[error("missing required configuration field: {0}")]
    MissingField(String),

    /// A configuration field had an invalid value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The config file could not be read or parsed.
    #[error("failed to load config file {path}: {source}")]
    FileLoad {
        /// Path to the config file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file content was not valid JSON.
    #[error("invalid config file JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from [`crate::orchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Fatal configuration problem; nothing was executed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The job's scratch/metadata files could not be maintained.
    #[error(transparent)]
    FileStore(#[from] FileStoreError),

    /// The prompt template was invalid for the active configuration.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Input chunking failed.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Aggregate error type for cross-component callers (orchestrator, CLI).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// See [`ChunkError`].
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    /// See [`RateLimiterError`].
    #[error(transparent)]
    RateLimiter(#[from] RateLimiterError),
    /// See [`ApiError`].
    #[error(transparent)]
    Api(#[from] ApiError),
    /// See [`TranslationError`].
    #[error(transparent)]
    Translation(#[from] TranslationError),
    /// See [`GlossaryError`].
    #[error(transparent)]
    Glossary(#[from] GlossaryError),
    /// See [`FileStoreError`].
    #[error(transparent)]
    FileStore(#[from] FileStoreError),
    /// See [`OrchestratorError`].
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}
