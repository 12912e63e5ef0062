//! Per-chunk prompt construction, generative-API invocation, and
//! content-safety recursive splitting.

pub mod prompt;

use std::sync::Arc;

use futures_util::future::join_all;

use crate::api::provider::{GenerateRequest, HistoryTurn};
use crate::api::retry::thinking_kind_for_model;
use crate::api::ApiClient;
use crate::chunk::{split_by_sentences, split_in_two};
use crate::config::JobConfig;
use crate::error::{ApiError, TranslationError};
use crate::glossary::GlossaryEntry;
use crate::translator::prompt::{build_prompt, render_glossary_context, NO_GLOSSARY_CONTEXT};

/// A function the owner (orchestrator) registers so the translator can ask
/// whether the job has been asked to stop. Modeled as an injected callback
/// rather than a back-reference to avoid a cyclic dependency between
/// Translator and Orchestrator.
pub type StopCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Builds prompts, invokes the generative API, and performs content-safety
/// recursive splitting on refusal.
pub struct Translator {
    api_client: Arc<ApiClient>,
    config: Arc<JobConfig>,
    stop_check: StopCheck,
}

impl Translator {
    /// Builds a translator bound to one job's config and API client.
    #[must_use]
    pub fn new(api_client: Arc<ApiClient>, config: Arc<JobConfig>, stop_check: StopCheck) -> Self {
        Self {
            api_client,
            config,
            stop_check,
        }
    }

    /// Translates a single chunk, with no content-safety recovery. Callers
    /// that want the recursive-split behavior should use
    /// [`Self::translate_with_safety_retry`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::Cancelled`] if the stop-check fires
    /// before the API call, or [`TranslationError::Api`] on any API
    /// failure, including content-safety refusals (the caller decides
    /// whether to recurse).
    pub async fn translate(
        &self,
        chunk_text: &str,
        glossary: &[GlossaryEntry],
    ) -> Result<String, TranslationError> {
        if (self.stop_check)() {
            return Err(TranslationError::Cancelled);
        }

        let glossary_context = if self.config.enable_dynamic_glossary_injection {
            render_glossary_context(
                glossary,
                chunk_text,
                self.config.max_glossary_entries_per_chunk_injection,
                self.config.max_glossary_chars_per_chunk_injection,
            )
        } else {
            NO_GLOSSARY_CONTEXT.to_string()
        };

        let rendered = build_prompt(&self.config.prompt_template, &glossary_context, chunk_text);
        let (history, user_prompt) = self.build_history(&rendered, chunk_text);

        let mut request = GenerateRequest::new(user_prompt, self.config.model_name.clone());
        request.temperature = self.config.temperature;
        request.top_p = self.config.top_p;
        request.history = history;
        request.system_instruction = self.config.prefill_system_instruction.clone();
        request.thinking = thinking_kind_for_model(&self.config.model_name, None);

        let response = self.api_client.generate(&request).await?;
        Ok(response.into_text())
    }

    /// Builds the prefill history (if enabled) and the final user-turn
    /// prompt, per the prefill/jailbreak contract: if any history turn
    /// contains `{{slot}}`, the chunk text is inlaid into the history on a
    /// deep copy. A trailing single-space user turn is appended only when
    /// the injected history ends on the model role (generative APIs reject
    /// histories ending there); when it already ends on a user turn, the
    /// injected history is sent as-is with no extra turn. Otherwise the
    /// rendered prompt is sent as a new user turn ahead of unmodified
    /// history.
    fn build_history(&self, rendered_prompt: &str, chunk_text: &str) -> (Vec<HistoryTurn>, String) {
        if !self.config.enable_prefill_translation || self.config.prefill_cached_history.is_empty() {
            return (Vec::new(), rendered_prompt.to_string());
        }

        let slot_in_history = self
            .config
            .prefill_cached_history
            .iter()
            .any(|turn| turn.parts.iter().any(|part| part.contains("{{slot}}")));

        if slot_in_history {
            let history: Vec<HistoryTurn> = self
                .config
                .prefill_cached_history
                .iter()
                .map(|turn| HistoryTurn {
                    role: turn.role.clone(),
                    parts: turn
                        .parts
                        .iter()
                        .map(|part| part.replace("{{slot}}", chunk_text))
                        .collect(),
                })
                .collect();
            let ends_on_model = self
                .config
                .prefill_cached_history
                .last()
                .map(|t| t.role == "model")
                .unwrap_or(false);
            if ends_on_model {
                (history, " ".to_string())
            } else {
                (history, String::new())
            }
        } else {
            let history = self
                .config
                .prefill_cached_history
                .iter()
                .map(|turn| HistoryTurn {
                    role: turn.role.clone(),
                    parts: turn.parts.clone(),
                })
                .collect();
            (history, rendered_prompt.to_string())
        }
    }

    /// Translates `chunk_text`, recovering from content-safety refusals by
    /// recursively halving the chunk and translating both halves in
    /// parallel. Never returns an error for content-safety or
    /// per-sub-chunk failures: an unresolvable fragment becomes an inline
    /// failure marker so the output file stays contiguous. Returns
    /// [`TranslationError::Cancelled`] only if the stop-check fires before
    /// any work starts.
    pub async fn translate_with_safety_retry(
        &self,
        chunk_text: &str,
        glossary: &[GlossaryEntry],
        depth: u32,
    ) -> String {
        if (self.stop_check)() {
            return failure_marker(chunk_text, "cancelled");
        }

        match self.translate(chunk_text, glossary).await {
            Ok(text) => text,
            Err(TranslationError::Api(ApiError::ContentSafety { message })) => {
                self.recover_from_content_safety(chunk_text, glossary, depth, &message)
                    .await
            }
            Err(TranslationError::Cancelled) => failure_marker(chunk_text, "cancelled"),
            Err(err) => failure_marker(chunk_text, &err.to_string()),
        }
    }

    async fn recover_from_content_safety(
        &self,
        chunk_text: &str,
        glossary: &[GlossaryEntry],
        depth: u32,
        reason: &str,
    ) -> String {
        if chunk_text.len() <= self.config.min_content_safety_chunk_size
            || depth > self.config.max_content_safety_split_attempts
        {
            return failure_marker(chunk_text, reason);
        }

        let halves = split_in_two(chunk_text, 0.3)
            .map(|segments| segments.into_iter().map(|s| s.text).collect::<Vec<_>>())
            .unwrap_or_else(|_| vec![chunk_text.to_string()]);

        let halves = if halves.len() < 2 {
            split_by_sentences(chunk_text, 1)
                .into_iter()
                .map(|s| s.text)
                .collect::<Vec<_>>()
        } else {
            halves
        };

        if halves.len() < 2 {
            return failure_marker(chunk_text, reason);
        }

        if (self.stop_check)() {
            return failure_marker(chunk_text, "cancelled");
        }

        let futures = halves
            .iter()
            .map(|half| self.translate_with_safety_retry(half, glossary, depth + 1));
        let translated = join_all(futures).await;

        translated.join("\n\n")
    }
}

/// Builds the literal failure-marker string embedded in output when a
/// chunk cannot be translated. The original text follows the marker,
/// truncated, so the output file stays contiguous and auditable.
fn failure_marker(chunk_text: &str, reason: &str) -> String {
    const TRUNCATE_AT: usize = 200;
    let truncated: String = chunk_text.chars().take(TRUNCATE_AT).collect();
    let suffix = if chunk_text.chars().count() > TRUNCATE_AT {
        "…"
    } else {
        ""
    };
    format!("[translation failure: {reason}] {truncated}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::provider::{GenerateResponse, GenerativeClient, ModelInfo};
    use crate::api::ApiClientConfig;
    use crate::credential::Credential;
    use crate::rate_limiter::RateLimiter;
    use crate::config::PrefillTurn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct RefusesOnPattern {
        refuse_substring: &'static str,
    }

    #[async_trait]
    impl GenerativeClient for RefusesOnPattern {
        fn name(&self) -> &'static str {
            "refuses-on-pattern"
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
            _timeout: Duration,
        ) -> Result<GenerateResponse, ApiError> {
            if request.prompt.contains(self.refuse_substring) {
                Err(ApiError::ContentSafety {
                    message: "SAFETY".to_string(),
                })
            } else {
                Ok(GenerateResponse::Text(format!("[TR]{}", request.prompt)))
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn translator_with(client: impl GenerativeClient + 'static) -> Translator {
        translator_with_min_safety_size(client, 100)
    }

    fn translator_with_min_safety_size(
        client: impl GenerativeClient + 'static,
        min_content_safety_chunk_size: usize,
    ) -> Translator {
        let config = Arc::new(
            JobConfig::builder()
                .prompt_template("{{slot}}")
                .min_content_safety_chunk_size(min_content_safety_chunk_size)
                .build()
                .unwrap_or_else(|e| unreachable!("{e}")),
        );
        let api_client = Arc::new(ApiClient::from_clients(
            vec![Arc::new(client)],
            ApiClientConfig::new(Credential::Default),
            RateLimiter::new(0),
        ));
        Translator::new(api_client, config, Arc::new(|| false))
    }

    fn translator_with_prefill_history(history: Vec<PrefillTurn>) -> Translator {
        let base = JobConfig::builder()
            .prompt_template("{{slot}}")
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        let config = Arc::new(JobConfig {
            enable_prefill_translation: true,
            prefill_cached_history: history,
            ..base
        });
        let api_client = Arc::new(ApiClient::from_clients(
            vec![Arc::new(RefusesOnPattern {
                refuse_substring: "never-matches",
            })],
            ApiClientConfig::new(Credential::Default),
            RateLimiter::new(0),
        ));
        Translator::new(api_client, config, Arc::new(|| false))
    }

    #[tokio::test]
    async fn translate_substitutes_slot_and_returns_api_text() {
        let translator = translator_with(RefusesOnPattern {
            refuse_substring: "never-matches",
        });
        let result = translator
            .translate("hello world", &[])
            .await
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(result, "[TR]hello world");
    }

    #[tokio::test]
    async fn translate_respects_stop_check() {
        let config = Arc::new(
            JobConfig::builder()
                .prompt_template("{{slot}}")
                .build()
                .unwrap_or_else(|e| unreachable!("{e}")),
        );
        let api_client = Arc::new(ApiClient::from_clients(
            vec![Arc::new(RefusesOnPattern {
                refuse_substring: "never",
            })],
            ApiClientConfig::new(Credential::Default),
            RateLimiter::new(0),
        ));
        let translator = Translator::new(api_client, config, Arc::new(|| true));
        let result = translator.translate("hello", &[]).await;
        assert!(matches!(result, Err(TranslationError::Cancelled)));
    }

    #[tokio::test]
    async fn safety_retry_recovers_by_splitting_around_forbidden_fragment() {
        let translator =
            translator_with_min_safety_size(RefusesOnPattern { refuse_substring: "X" }, 1);
        let result = translator
            .translate_with_safety_retry("aaa X bbb", &[], 0)
            .await;
        assert!(result.contains("[translation failure:"));
        assert!(result.contains("[TR]"));
    }

    #[tokio::test]
    async fn safety_retry_gives_up_below_min_chunk_size() {
        let translator = translator_with(RefusesOnPattern { refuse_substring: "x" });
        let result = translator.translate_with_safety_retry("x", &[], 0).await;
        assert!(result.starts_with("[translation failure:"));
    }

    #[tokio::test]
    async fn safety_retry_succeeds_when_no_refusal() {
        let translator = translator_with(RefusesOnPattern {
            refuse_substring: "never-matches",
        });
        let result = translator
            .translate_with_safety_retry("clean text", &[], 0)
            .await;
        assert_eq!(result, "[TR]clean text");
    }

    #[tokio::test]
    async fn safety_retry_respects_cancellation_before_recursing() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = Arc::clone(&called);
        let config = Arc::new(
            JobConfig::builder()
                .prompt_template("{{slot}}")
                .build()
                .unwrap_or_else(|e| unreachable!("{e}")),
        );
        let api_client = Arc::new(ApiClient::from_clients(
            vec![Arc::new(RefusesOnPattern { refuse_substring: "X" })],
            ApiClientConfig::new(Credential::Default),
            RateLimiter::new(0),
        ));
        let translator = Translator::new(
            api_client,
            config,
            Arc::new(move || {
                called_clone.store(true, Ordering::SeqCst);
                true
            }),
        );
        let result = translator
            .translate_with_safety_retry("aaa X bbb", &[], 0)
            .await;
        assert!(result.contains("cancelled"));
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn build_history_appends_nothing_when_history_already_ends_on_user() {
        let translator = translator_with_prefill_history(vec![
            PrefillTurn {
                role: "user".to_string(),
                parts: vec!["priming turn".to_string()],
            },
            PrefillTurn {
                role: "model".to_string(),
                parts: vec!["acknowledged".to_string()],
            },
            PrefillTurn {
                role: "user".to_string(),
                parts: vec!["{{slot}}".to_string()],
            },
        ]);

        let (history, prompt) = translator.build_history("ignored", "the chunk text");

        assert_eq!(prompt, "");
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].role, "user");
        assert_eq!(history[2].parts, vec!["the chunk text".to_string()]);
    }

    #[test]
    fn build_history_collapses_to_single_space_when_history_ends_on_model() {
        let translator = translator_with_prefill_history(vec![
            PrefillTurn {
                role: "user".to_string(),
                parts: vec!["{{slot}}".to_string()],
            },
            PrefillTurn {
                role: "model".to_string(),
                parts: vec!["acknowledged".to_string()],
            },
        ]);

        let (history, prompt) = translator.build_history("ignored", "the chunk text");

        assert_eq!(prompt, " ");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].parts, vec!["the chunk text".to_string()]);
    }
}
