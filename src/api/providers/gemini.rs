//! Concrete [`GenerativeClient`] backed by the public Gemini REST API.
//!
//! Speaks the `models/{model}:generateContent` and `models` endpoints
//! directly over `reqwest`, since the generative-API SDK itself is treated
//! as an external primitive this crate only needs one faithful
//! implementation of.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::provider::{
    GenerateRequest, GenerateResponse, GenerativeClient, HistoryTurn, ModelInfo, ThinkingConfig,
    ThinkingLevel,
};
use crate::api::retry::classify_to_error;
use crate::error::ApiError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A single Gemini-key-backed client.
pub struct GeminiRestClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiRestClient {
    /// Builds a client for one API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, API_BASE)
    }

    /// Builds a client against a custom base URL, for tests.
    #[must_use]
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Builds the full `contents` array sent to the API: the prefill
    /// history followed by the current prompt as a trailing user turn. An
    /// empty prompt means the history already ends on a user turn with the
    /// chunk text inlaid into it (see `Translator::build_history`), so no
    /// extra turn is appended.
    fn build_contents(request: &GenerateRequest) -> Vec<Value> {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(history_turn_to_content)
            .collect();
        if !request.prompt.is_empty() {
            contents.push(json!({
                "role": "user",
                "parts": [{"text": request.prompt}],
            }));
        }
        contents
    }

    fn build_generation_config(request: &GenerateRequest) -> Value {
        let mut config = json!({
            "temperature": request.temperature,
            "topP": request.top_p,
        });

        if request.json_mode {
            config["responseMimeType"] = json!("application/json");
        }

        if let Some(thinking) = &request.thinking {
            config["thinkingConfig"] = match thinking {
                ThinkingConfig::Level(level) => json!({ "thinkingLevel": thinking_level_str(*level) }),
                ThinkingConfig::Budget(budget) => json!({ "thinkingBudget": budget }),
            };
        }

        config
    }

    fn safety_settings() -> Value {
        const CATEGORIES: &[&str] = &[
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ];
        Value::Array(
            CATEGORIES
                .iter()
                .map(|category| {
                    json!({ "category": category, "threshold": "BLOCK_NONE" })
                })
                .collect(),
        )
    }
}

fn thinking_level_str(level: ThinkingLevel) -> &'static str {
    match level {
        ThinkingLevel::Low => "LOW",
        ThinkingLevel::Medium => "MEDIUM",
        ThinkingLevel::High => "HIGH",
    }
}

fn history_turn_to_content(turn: &HistoryTurn) -> Value {
    json!({
        "role": turn.role,
        "parts": turn.parts.iter().map(|text| json!({"text": text})).collect::<Vec<_>>(),
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<RawModel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawModel {
    name: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputTokenLimit", default)]
    input_token_limit: u64,
    #[serde(rename = "outputTokenLimit", default)]
    output_token_limit: u64,
    #[serde(rename = "supportedGenerationMethods", default)]
    supported_generation_methods: Vec<String>,
}

#[async_trait]
impl GenerativeClient for GeminiRestClient {
    fn name(&self) -> &'static str {
        "gemini-rest"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<GenerateResponse, ApiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model_name, self.api_key
        );

        let mut body = json!({
            "contents": Self::build_contents(request),
            "generationConfig": Self::build_generation_config(request),
            "safetySettings": Self::safety_settings(),
        });

        if let Some(system) = &request.system_instruction {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(timeout)
                } else {
                    ApiError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_to_error(&format!("{status}: {text}")));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(classify_to_error(reason));
        }

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| ApiError::Other("no candidates in response".to_string()))?;

        if let Some(reason) = &candidate.finish_reason {
            if reason == "SAFETY" || reason == "PROHIBITED_CONTENT" {
                return Err(classify_to_error(reason));
            }
        }

        let output_text = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.clone())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if request.json_mode {
            if let Ok(value) = extract_json(&output_text) {
                return Ok(GenerateResponse::Structured(value));
            }
        }

        Ok(GenerateResponse::Text(output_text))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_to_error(&format!("{status}: {text}")));
        }

        let parsed: ModelsResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| {
                let short_name = m
                    .name
                    .rsplit('/')
                    .next()
                    .unwrap_or(&m.name)
                    .to_string();
                ModelInfo {
                    short_name,
                    name: m.name,
                    display_name: m.display_name,
                    description: m.description,
                    input_token_limit: m.input_token_limit,
                    output_token_limit: m.output_token_limit,
                    supported_actions: m.supported_generation_methods,
                }
            })
            .collect())
    }
}

/// Parses a JSON object out of model output, tolerating ```json fences.
fn extract_json(text: &str) -> Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .strip_suffix("```")
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(without_fence)
}
