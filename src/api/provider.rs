//! Pluggable generative-API provider trait.
//!
//! Implementations translate provider-agnostic [`GenerateRequest`]/
//! [`GenerateResponse`] into vendor-specific SDK or HTTP calls. This keeps
//! retry, rotation, and throttling logic in [`crate::api::client`] fully
//! decoupled from any one vendor's transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// One turn of conversation history sent ahead of the user prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// `"user"` or `"model"`.
    pub role: String,
    /// Text parts making up this turn.
    pub parts: Vec<String>,
}

/// Model-family-dependent "thinking" parameter, resolved by
/// [`crate::api::retry::thinking_kind_for_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingConfig {
    /// `gemini-3`-family models: a coarse enum level.
    Level(ThinkingLevel),
    /// `gemini-2.5`-family models: an explicit token budget. `-1` disables
    /// thinking.
    Budget(i32),
}

/// Coarse thinking-effort level for `gemini-3`-family models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThinkingLevel {
    Low,
    Medium,
    #[default]
    High,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The user-facing prompt text (already has `{{slot}}`/glossary
    /// placeholders substituted).
    pub prompt: String,
    /// Model identifier, e.g. `"gemini-2.0-flash"`.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus-sampling `top_p`.
    pub top_p: f64,
    /// Optional system instruction.
    pub system_instruction: Option<String>,
    /// Optional prefill/jailbreak history sent before `prompt`.
    pub history: Vec<HistoryTurn>,
    /// Model-family-dependent thinking parameter, if applicable.
    pub thinking: Option<ThinkingConfig>,
    /// When set, the caller wants a parsed JSON object back; the provider
    /// sets `response_mime_type = application/json` and the client attempts
    /// to parse the response.
    pub json_mode: bool,
}

impl GenerateRequest {
    /// A request with only the required fields set and every optional one
    /// at its default (no system instruction, no history, no thinking, no
    /// JSON mode).
    #[must_use]
    pub fn new(prompt: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model_name: model_name.into(),
            temperature: 0.7,
            top_p: 0.9,
            system_instruction: None,
            history: Vec::new(),
            thinking: None,
            json_mode: false,
        }
    }
}

/// The outcome of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateResponse {
    /// Plain text output.
    Text(String),
    /// A successfully parsed JSON object, returned when the request set
    /// `json_mode` and parsing succeeded.
    Structured(serde_json::Value),
}

impl GenerateResponse {
    /// Returns the response as text, pretty-printing a structured value if
    /// that's what was returned.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl PartialEq<serde_json::Value> for GenerateResponse {
    fn eq(&self, other: &serde_json::Value) -> bool {
        matches!(self, Self::Structured(v) if v == other)
    }
}

/// Normalized model metadata, returned by [`GenerativeClient::list_models`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Fully qualified model name (e.g. `"models/gemini-2.0-flash"`).
    pub name: String,
    /// Short name (e.g. `"gemini-2.0-flash"`).
    pub short_name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Model description.
    pub description: String,
    /// Maximum input tokens.
    pub input_token_limit: u64,
    /// Maximum output tokens.
    pub output_token_limit: u64,
    /// Supported generation methods (e.g. `"generateContent"`).
    pub supported_actions: Vec<String>,
}

/// Trait for generative-API backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls) for a
/// specific credential while presenting a uniform interface to
/// [`crate::api::client::ApiClient`]'s retry and rotation logic.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &'static str;

    /// Executes a single generation request with the given timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, timeout, or a classified
    /// API refusal (content safety, quota, rate limit, invalid request).
    async fn generate(
        &self,
        request: &GenerateRequest,
        timeout: std::time::Duration,
    ) -> Result<GenerateResponse, ApiError>;

    /// Lists models available to this credential.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or an authentication
    /// refusal.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError>;
}
