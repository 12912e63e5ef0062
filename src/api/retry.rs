//! Error classification and retry policy for the generative API.
//!
//! Pattern tables below mirror the reference client's exception
//! classification exactly (same substrings, same grouping) so that
//! classification behavior is a faithful port rather than a guess.

use std::time::Duration;

use crate::api::provider::{ThinkingConfig, ThinkingLevel};
use crate::error::ApiError;

/// Substrings identifying a transient rate-limit/overload condition that is
/// not quota exhaustion.
pub const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rateLimitExceeded",
    "429",
    "Too Many Requests",
    "QUOTA_EXCEEDED",
    "The model is overloaded",
    "503",
    "Service Unavailable",
    "Resource has been exhausted",
    "RESOURCE_EXHAUSTED",
];

/// Substrings identifying a content-safety refusal.
pub const CONTENT_SAFETY_PATTERNS: &[&str] = &[
    "PROHIBITED_CONTENT",
    "SAFETY",
    "response was blocked",
    "BLOCKED_PROMPT",
    "SAFETY_BLOCKED",
    "blocked due to safety",
    "INTERNAL",
    "500",
    "504",
    "DEADLINE_EXCEEDED",
];

/// Substrings identifying a malformed or unauthorized request.
pub const INVALID_REQUEST_PATTERNS: &[&str] = &[
    "Invalid API key",
    "API key not valid",
    "Permission denied",
    "Invalid model name",
    "model is not found",
    "400 Bad Request",
    "Invalid JSON payload",
    "Could not find model",
    "invalid_scope",
    "INVALID_ARGUMENT",
    "UNAUTHENTICATED",
    "PERMISSION_DENIED",
    "NOT_FOUND",
];

/// Substrings that specifically indicate quota exhaustion (a subset of
/// rate-limit-shaped messages that should cause immediate key rotation
/// rather than in-place backoff).
pub const QUOTA_EXHAUSTED_PATTERNS: &[&str] =
    &["RESOURCE_EXHAUSTED", "QUOTA_EXCEEDED", "ResourceExhausted"];

/// Default HTTP timeout for a single generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(500);
/// Default cooldown window after a key reports quota exhaustion.
pub const QUOTA_COOLDOWN: Duration = Duration::from_secs(100);
/// Default maximum retries within a single key before rotating.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Initial backoff delay for rate-limit retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
/// Backoff growth factor per retry.
pub const BACKOFF_FACTOR: u32 = 2;
/// Backoff cap.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a raw error message from the transport layer should be handled by
/// the retry/rotation loop in [`crate::api::client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Non-retryable at this layer; propagate immediately.
    ContentSafety,
    /// Mark the current key's cooldown and rotate immediately.
    QuotaExhausted,
    /// Retry with backoff; rotate only after `max_retries` is exhausted.
    RateLimited,
    /// Rotate key (multi-key mode) or fail (single-credential mode).
    InvalidRequest,
    /// Treat as retryable with backoff, same as rate-limited.
    Other,
}

/// Classifies a raw error message using the pattern tables above.
///
/// Content-safety is checked first since some patterns (`"SAFETY"`,
/// `"INTERNAL"`) would otherwise also match the rate-limit table; quota
/// exhaustion is checked before generic rate-limiting since it is a subset
/// condition requiring a different response (rotate, not backoff).
#[must_use]
pub fn classify(message: &str) -> Classification {
    if matches_any(message, CONTENT_SAFETY_PATTERNS) {
        return Classification::ContentSafety;
    }
    if matches_any(message, QUOTA_EXHAUSTED_PATTERNS) {
        return Classification::QuotaExhausted;
    }
    if matches_any(message, RATE_LIMIT_PATTERNS) {
        return Classification::RateLimited;
    }
    if matches_any(message, INVALID_REQUEST_PATTERNS) {
        return Classification::InvalidRequest;
    }
    Classification::Other
}

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| message.contains(p))
}

/// Converts a classified raw message into the corresponding [`ApiError`]
/// variant.
#[must_use]
pub fn classify_to_error(message: &str) -> ApiError {
    match classify(message) {
        Classification::ContentSafety => ApiError::ContentSafety {
            message: message.to_string(),
        },
        Classification::QuotaExhausted => ApiError::QuotaExhausted {
            message: message.to_string(),
        },
        Classification::RateLimited | Classification::Other => ApiError::RateLimited {
            message: message.to_string(),
        },
        Classification::InvalidRequest => ApiError::InvalidRequest {
            message: message.to_string(),
        },
    }
}

/// Computes the backoff delay for retry attempt `attempt` (0-indexed),
/// before jitter, capped at [`MAX_BACKOFF`].
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = BACKOFF_FACTOR.saturating_pow(attempt);
    INITIAL_BACKOFF
        .saturating_mul(multiplier)
        .min(MAX_BACKOFF)
}

/// Adds up to 20% jitter to a backoff delay so concurrent retries don't
/// synchronize.
#[must_use]
pub fn with_jitter(delay: Duration, jitter_fraction: f64) -> Duration {
    delay.mul_f64(1.0 + jitter_fraction.clamp(0.0, 1.0))
}

/// Resolves the model-family-dependent thinking parameter from a model
/// name. `gemini-3` models get a coarse level (default
/// [`ThinkingLevel::High`]); `gemini-2.5` models get an explicit budget
/// (default disabled, `-1`); any other family has no thinking parameter.
///
/// Encoded as a lookup so new model families are added here without
/// touching the retry/rotation core.
#[must_use]
pub fn thinking_kind_for_model(model_name: &str, explicit_budget: Option<i32>) -> Option<ThinkingConfig> {
    if model_name.contains("gemini-3") {
        Some(ThinkingConfig::Level(ThinkingLevel::High))
    } else if model_name.contains("gemini-2.5") {
        Some(ThinkingConfig::Budget(explicit_budget.unwrap_or(-1)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_content_safety() {
        assert_eq!(
            classify("response was blocked: SAFETY"),
            Classification::ContentSafety
        );
    }

    #[test]
    fn classifies_quota_exhaustion() {
        assert_eq!(
            classify("429 RESOURCE_EXHAUSTED: quota exceeded"),
            Classification::QuotaExhausted
        );
    }

    #[test]
    fn classifies_rate_limit_without_quota() {
        assert_eq!(
            classify("503 Service Unavailable"),
            Classification::RateLimited
        );
    }

    #[test]
    fn classifies_invalid_request() {
        assert_eq!(
            classify("400 Bad Request: Invalid API key"),
            Classification::InvalidRequest
        );
    }

    #[test]
    fn classifies_unknown_as_other() {
        assert_eq!(classify("connection reset by peer"), Classification::Other);
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
        assert_eq!(backoff_delay(10), MAX_BACKOFF);
    }

    #[test]
    fn jitter_never_decreases_delay() {
        let base = Duration::from_secs(10);
        assert!(with_jitter(base, 0.2) >= base);
    }

    #[test]
    fn thinking_config_for_gemini_3() {
        assert_eq!(
            thinking_kind_for_model("gemini-3-pro", None),
            Some(ThinkingConfig::Level(ThinkingLevel::High))
        );
    }

    #[test]
    fn thinking_config_for_gemini_2_5_defaults_disabled() {
        assert_eq!(
            thinking_kind_for_model("gemini-2.5-flash", None),
            Some(ThinkingConfig::Budget(-1))
        );
    }

    #[test]
    fn thinking_config_explicit_budget_takes_precedence() {
        assert_eq!(
            thinking_kind_for_model("gemini-2.5-flash", Some(4096)),
            Some(ThinkingConfig::Budget(4096))
        );
    }

    #[test]
    fn thinking_config_absent_for_other_families() {
        assert_eq!(thinking_kind_for_model("gemini-2.0-flash", None), None);
    }
}
