//! Job configuration, resolved explicit values → environment variables →
//! defaults, the same precedence chain the agent-orchestration configs in
//! this codebase's lineage have always used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::credential::{Credential, CredentialSpec};
use crate::error::ConfigError;

/// Default requests-per-minute (0 = unlimited).
pub const DEFAULT_RPM: u32 = 60;
/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 6000;
/// Default model name.
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default nucleus-sampling `top_p`.
pub const DEFAULT_TOP_P: f64 = 0.9;
/// Default source-language hint.
pub const DEFAULT_NOVEL_LANGUAGE: &str = "auto";
/// Default source-language fallback when auto-detection is inconclusive.
pub const DEFAULT_NOVEL_LANGUAGE_FALLBACK: &str = "ja";
/// Default target translation language.
pub const DEFAULT_TARGET_LANGUAGE: &str = "ko";
/// Default maximum glossary entries injected per chunk.
pub const DEFAULT_MAX_GLOSSARY_ENTRIES_PER_CHUNK: usize = 3;
/// Default maximum glossary characters injected per chunk.
pub const DEFAULT_MAX_GLOSSARY_CHARS_PER_CHUNK: usize = 500;
/// Default fraction of segments sampled during glossary extraction.
pub const DEFAULT_GLOSSARY_SAMPLING_RATIO: f64 = 0.10;
/// Default sampling temperature used for glossary-extraction calls.
pub const DEFAULT_GLOSSARY_EXTRACTION_TEMPERATURE: f64 = 0.3;
/// Default suffix appended to the input stem to name the glossary file.
pub const DEFAULT_GLOSSARY_SUFFIX: &str = "_glossary.json";
/// Default cap on the total number of glossary entries retained.
pub const DEFAULT_MAX_TOTAL_GLOSSARY_ENTRIES: usize = 500;
/// Default maximum content-safety split attempts (recursion depth).
pub const DEFAULT_MAX_CONTENT_SAFETY_SPLIT_ATTEMPTS: u32 = 3;
/// Default floor below which content-safety splitting gives up.
pub const DEFAULT_MIN_CONTENT_SAFETY_CHUNK_SIZE: usize = 100;
/// Default glossary sampling strategy.
pub const DEFAULT_GLOSSARY_SAMPLING_METHOD: GlossarySamplingMethod = GlossarySamplingMethod::Uniform;

/// The default prompt template, carried over from the reference
/// configuration this pipeline's prompting contract was distilled from.
/// Must contain `{{slot}}`; contains `{{glossary_context}}` as well so it
/// works whether or not dynamic glossary injection is enabled.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a professional novel translator.\n\nGlossary:\n{{glossary_context}}\n\nTranslate the following text faithfully, preserving tone and meaning:\n\n{{slot}}";

/// How segments are sampled for glossary extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlossarySamplingMethod {
    /// Evenly stepped indices across the segment list.
    Uniform,
    /// Randomly chosen indices.
    Random,
}

/// Fully resolved configuration for a translation job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Resolved credential for the generative API.
    pub credential: Credential,
    /// Model identifier passed to the generative API.
    pub model_name: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus-sampling `top_p`.
    pub top_p: f64,
    /// Requests per minute; 0 disables throttling.
    pub requests_per_minute: u32,
    /// Worker pool size.
    pub max_workers: usize,
    /// Maximum chunk size in bytes.
    pub chunk_size: usize,
    /// Source-language hint ("auto" to detect).
    pub novel_language: String,
    /// Source-language fallback when detection is inconclusive.
    pub novel_language_fallback: String,
    /// Target translation language.
    pub target_translation_language: String,
    /// Prompt template; must contain `{{slot}}`.
    pub prompt_template: String,
    /// Whether prefill/jailbreak history is prepended to requests.
    pub enable_prefill_translation: bool,
    /// System instruction used only in prefill mode.
    pub prefill_system_instruction: Option<String>,
    /// Conversation history turns sent ahead of the user prompt in prefill
    /// mode.
    pub prefill_cached_history: Vec<PrefillTurn>,
    /// Whether per-chunk glossary entries are injected into the prompt.
    pub enable_dynamic_glossary_injection: bool,
    /// Path to the glossary JSON file to read/write.
    pub glossary_json_path: Option<PathBuf>,
    /// Maximum glossary entries injected per chunk.
    pub max_glossary_entries_per_chunk_injection: usize,
    /// Maximum glossary characters injected per chunk.
    pub max_glossary_chars_per_chunk_injection: usize,
    /// Fraction of segments sampled during glossary extraction, in `[0, 1]`.
    pub glossary_sampling_ratio: f64,
    /// Sampling strategy for glossary extraction.
    pub glossary_sampling_method: GlossarySamplingMethod,
    /// Sampling temperature for glossary-extraction calls.
    pub glossary_extraction_temperature: f64,
    /// Suffix appended to the input stem to name the glossary output file.
    pub glossary_output_json_filename_suffix: String,
    /// Cap on the number of glossary entries retained after aggregation.
    pub max_total_glossary_entries: usize,
    /// Whether content-safety refusals trigger recursive splitting.
    pub use_content_safety_retry: bool,
    /// Maximum recursion depth for content-safety splitting.
    pub max_content_safety_split_attempts: u32,
    /// Minimum chunk size below which content-safety splitting gives up.
    pub min_content_safety_chunk_size: usize,
    /// Whether the post-processing pass runs over the merged output.
    pub enable_post_processing: bool,
}

/// One turn of prefill/jailbreak conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillTurn {
    /// `"user"` or `"model"`.
    pub role: String,
    /// Text parts making up this turn.
    pub parts: Vec<String>,
}

impl JobConfig {
    /// Creates a new builder for [`JobConfig`].
    #[must_use]
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    /// A stable fingerprint of this configuration, excluding credentials,
    /// used to decide whether a prior job's metadata still applies.
    ///
    /// Any field that changes the *meaning* of the translation (model,
    /// prompt, chunking, language, safety policy) participates; fields that
    /// only affect throughput or logging do not.
    #[must_use]
    pub fn config_hash(&self) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.model_name.hash(&mut hasher);
        self.temperature.to_bits().hash(&mut hasher);
        self.top_p.to_bits().hash(&mut hasher);
        self.chunk_size.hash(&mut hasher);
        self.novel_language.hash(&mut hasher);
        self.novel_language_fallback.hash(&mut hasher);
        self.target_translation_language.hash(&mut hasher);
        self.prompt_template.hash(&mut hasher);
        self.enable_prefill_translation.hash(&mut hasher);
        self.prefill_system_instruction.hash(&mut hasher);
        for turn in &self.prefill_cached_history {
            turn.role.hash(&mut hasher);
            turn.parts.hash(&mut hasher);
        }
        self.enable_dynamic_glossary_injection.hash(&mut hasher);
        self.max_glossary_entries_per_chunk_injection
            .hash(&mut hasher);
        self.max_glossary_chars_per_chunk_injection
            .hash(&mut hasher);
        self.use_content_safety_retry.hash(&mut hasher);
        self.max_content_safety_split_attempts.hash(&mut hasher);
        self.min_content_safety_chunk_size.hash(&mut hasher);
        self.enable_post_processing.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// On-disk / CLI-flag representation of a job configuration, before
/// credential resolution and default-filling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfigFile {
    /// See [`CredentialSpec`].
    #[serde(flatten)]
    pub credential: CredentialSpec,
    /// See [`JobConfig::model_name`].
    pub model_name: Option<String>,
    /// See [`JobConfig::temperature`].
    pub temperature: Option<f64>,
    /// See [`JobConfig::top_p`].
    pub top_p: Option<f64>,
    /// See [`JobConfig::requests_per_minute`].
    pub requests_per_minute: Option<u32>,
    /// See [`JobConfig::max_workers`].
    pub max_workers: Option<usize>,
    /// See [`JobConfig::chunk_size`].
    pub chunk_size: Option<usize>,
    /// See [`JobConfig::novel_language`].
    pub novel_language: Option<String>,
    /// See [`JobConfig::novel_language_fallback`].
    pub novel_language_fallback: Option<String>,
    /// See [`JobConfig::target_translation_language`].
    pub target_translation_language: Option<String>,
    /// See [`JobConfig::prompt_template`].
    pub prompts: Option<String>,
    /// See [`JobConfig::enable_prefill_translation`].
    pub enable_prefill_translation: Option<bool>,
    /// See [`JobConfig::prefill_system_instruction`].
    pub prefill_system_instruction: Option<String>,
    /// See [`JobConfig::prefill_cached_history`].
    #[serde(default)]
    pub prefill_cached_history: Vec<PrefillTurn>,
    /// See [`JobConfig::enable_dynamic_glossary_injection`].
    pub enable_dynamic_glossary_injection: Option<bool>,
    /// See [`JobConfig::glossary_json_path`].
    pub glossary_json_path: Option<PathBuf>,
    /// See [`JobConfig::max_glossary_entries_per_chunk_injection`].
    pub max_glossary_entries_per_chunk_injection: Option<usize>,
    /// See [`JobConfig::max_glossary_chars_per_chunk_injection`].
    pub max_glossary_chars_per_chunk_injection: Option<usize>,
    /// See [`JobConfig::glossary_sampling_ratio`]. Expressed as a percentage
    /// (e.g. `10.0` for 10%), matching the external configuration surface.
    pub glossary_sampling_ratio: Option<f64>,
    /// See [`JobConfig::glossary_sampling_method`].
    pub glossary_sampling_method: Option<GlossarySamplingMethod>,
    /// See [`JobConfig::glossary_extraction_temperature`].
    pub glossary_extraction_temperature: Option<f64>,
    /// See [`JobConfig::glossary_output_json_filename_suffix`].
    pub glossary_output_json_filename_suffix: Option<String>,
    /// See [`JobConfig::max_total_glossary_entries`].
    pub max_total_glossary_entries: Option<usize>,
    /// See [`JobConfig::use_content_safety_retry`].
    pub use_content_safety_retry: Option<bool>,
    /// See [`JobConfig::max_content_safety_split_attempts`].
    pub max_content_safety_split_attempts: Option<u32>,
    /// See [`JobConfig::min_content_safety_chunk_size`].
    pub min_content_safety_chunk_size: Option<usize>,
    /// See [`JobConfig::enable_post_processing`].
    pub enable_post_processing: Option<bool>,
}

/// Builder for [`JobConfig`]: explicit setters → environment variables →
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct JobConfigBuilder {
    credential: Option<CredentialSpec>,
    model_name: Option<String>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    requests_per_minute: Option<u32>,
    max_workers: Option<usize>,
    chunk_size: Option<usize>,
    novel_language: Option<String>,
    novel_language_fallback: Option<String>,
    target_translation_language: Option<String>,
    prompt_template: Option<String>,
    enable_prefill_translation: Option<bool>,
    prefill_system_instruction: Option<String>,
    prefill_cached_history: Option<Vec<PrefillTurn>>,
    enable_dynamic_glossary_injection: Option<bool>,
    glossary_json_path: Option<PathBuf>,
    max_glossary_entries_per_chunk_injection: Option<usize>,
    max_glossary_chars_per_chunk_injection: Option<usize>,
    glossary_sampling_ratio: Option<f64>,
    glossary_sampling_method: Option<GlossarySamplingMethod>,
    glossary_extraction_temperature: Option<f64>,
    glossary_output_json_filename_suffix: Option<String>,
    max_total_glossary_entries: Option<usize>,
    use_content_safety_retry: Option<bool>,
    max_content_safety_split_attempts: Option<u32>,
    min_content_safety_chunk_size: Option<usize>,
    enable_post_processing: Option<bool>,
}

impl JobConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.requests_per_minute.is_none() {
            self.requests_per_minute = std::env::var("NOVEL_TRANSLATE_RPM")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_workers.is_none() {
            self.max_workers = std::env::var("NOVEL_TRANSLATE_MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.model_name.is_none() {
            self.model_name = std::env::var("NOVEL_TRANSLATE_MODEL").ok();
        }
        if self.credential.is_none() {
            if let Ok(keys) = std::env::var("NOVEL_TRANSLATE_API_KEYS") {
                self.credential = Some(CredentialSpec {
                    api_keys: keys.split(',').map(str::to_string).collect(),
                    ..Default::default()
                });
            }
        }
        self
    }

    /// Loads overrides from a JSON config file, merging onto whatever is
    /// already set (explicit setters and `from_env` still take precedence
    /// over file values applied afterward, so call this first if file
    /// values should be the lowest-priority layer).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileLoad`] if the file cannot be read, or
    /// [`ConfigError::Json`] if it is not valid JSON.
    pub fn from_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileLoad {
            path: path.display().to_string(),
            source,
        })?;
        let file: JobConfigFile = serde_json::from_str(&contents)?;
        self = self.apply_file(file);
        Ok(self)
    }

    fn apply_file(mut self, file: JobConfigFile) -> Self {
        macro_rules! fill {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = file.$field;
                }
            };
        }
        if self.credential.is_none()
            && (!file.credential.api_keys.is_empty() || file.credential.use_vertex_ai)
        {
            self.credential = Some(file.credential);
        }
        fill!(model_name);
        fill!(temperature);
        fill!(top_p);
        fill!(requests_per_minute);
        fill!(max_workers);
        fill!(chunk_size);
        fill!(novel_language);
        fill!(novel_language_fallback);
        fill!(target_translation_language);
        fill!(enable_prefill_translation);
        fill!(prefill_system_instruction);
        fill!(enable_dynamic_glossary_injection);
        fill!(glossary_json_path);
        fill!(max_glossary_entries_per_chunk_injection);
        fill!(max_glossary_chars_per_chunk_injection);
        fill!(glossary_sampling_method);
        fill!(glossary_extraction_temperature);
        fill!(glossary_output_json_filename_suffix);
        fill!(max_total_glossary_entries);
        fill!(use_content_safety_retry);
        fill!(max_content_safety_split_attempts);
        fill!(min_content_safety_chunk_size);
        fill!(enable_post_processing);

        if self.prompt_template.is_none() {
            self.prompt_template = file.prompts;
        }
        if self.prefill_cached_history.is_none() && !file.prefill_cached_history.is_empty() {
            self.prefill_cached_history = Some(file.prefill_cached_history);
        }
        if self.glossary_sampling_ratio.is_none() {
            self.glossary_sampling_ratio = file.glossary_sampling_ratio.map(|pct| pct / 100.0);
        }
        self
    }

    /// Sets the credential spec directly (e.g. from CLI flags).
    #[must_use]
    pub fn credential(mut self, spec: CredentialSpec) -> Self {
        self.credential = Some(spec);
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets `top_p`.
    #[must_use]
    pub const fn top_p(mut self, p: f64) -> Self {
        self.top_p = Some(p);
        self
    }

    /// Sets requests-per-minute (0 disables throttling).
    #[must_use]
    pub const fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    /// Sets the maximum chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Sets the source-language hint.
    #[must_use]
    pub fn novel_language(mut self, lang: impl Into<String>) -> Self {
        self.novel_language = Some(lang.into());
        self
    }

    /// Sets the target translation language.
    #[must_use]
    pub fn target_translation_language(mut self, lang: impl Into<String>) -> Self {
        self.target_translation_language = Some(lang.into());
        self
    }

    /// Sets the prompt template.
    #[must_use]
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Enables dynamic glossary injection.
    #[must_use]
    pub const fn enable_dynamic_glossary_injection(mut self, enabled: bool) -> Self {
        self.enable_dynamic_glossary_injection = Some(enabled);
        self
    }

    /// Sets the glossary JSON path.
    #[must_use]
    pub fn glossary_json_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.glossary_json_path = Some(path.into());
        self
    }

    /// Sets whether content-safety refusals trigger recursive splitting.
    #[must_use]
    pub const fn use_content_safety_retry(mut self, enabled: bool) -> Self {
        self.use_content_safety_retry = Some(enabled);
        self
    }

    /// Sets whether the post-processing pass runs.
    #[must_use]
    pub const fn enable_post_processing(mut self, enabled: bool) -> Self {
        self.enable_post_processing = Some(enabled);
        self
    }

    /// Sets the minimum chunk size below which content-safety splitting
    /// gives up and emits a failure marker instead of recursing further.
    #[must_use]
    pub const fn min_content_safety_chunk_size(mut self, n: usize) -> Self {
        self.min_content_safety_chunk_size = Some(n);
        self
    }

    /// Sets the maximum recursion depth for content-safety splitting.
    #[must_use]
    pub const fn max_content_safety_split_attempts(mut self, n: u32) -> Self {
        self.max_content_safety_split_attempts = Some(n);
        self
    }

    /// Builds the [`JobConfig`], filling any unset field with its default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the resolved prompt template
    /// is empty, or if `glossary_sampling_ratio` falls outside `[0, 1]`.
    pub fn build(self) -> Result<JobConfig, ConfigError> {
        let prompt_template = self
            .prompt_template
            .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());
        if prompt_template.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "prompts".to_string(),
                reason: "prompt template must not be empty".to_string(),
            });
        }

        let glossary_sampling_ratio = self
            .glossary_sampling_ratio
            .unwrap_or(DEFAULT_GLOSSARY_SAMPLING_RATIO);
        if !(0.0..=1.0).contains(&glossary_sampling_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "glossary_sampling_ratio".to_string(),
                reason: format!("must be within [0, 1], got {glossary_sampling_ratio}"),
            });
        }

        Ok(JobConfig {
            credential: self.credential.unwrap_or_default().resolve(),
            model_name: self
                .model_name
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
            requests_per_minute: self.requests_per_minute.unwrap_or(DEFAULT_RPM),
            max_workers: self
                .max_workers
                .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, |n| n.get())),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            novel_language: self
                .novel_language
                .unwrap_or_else(|| DEFAULT_NOVEL_LANGUAGE.to_string()),
            novel_language_fallback: self
                .novel_language_fallback
                .unwrap_or_else(|| DEFAULT_NOVEL_LANGUAGE_FALLBACK.to_string()),
            target_translation_language: self
                .target_translation_language
                .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string()),
            prompt_template,
            enable_prefill_translation: self.enable_prefill_translation.unwrap_or(false),
            prefill_system_instruction: self.prefill_system_instruction,
            prefill_cached_history: self.prefill_cached_history.unwrap_or_default(),
            enable_dynamic_glossary_injection: self
                .enable_dynamic_glossary_injection
                .unwrap_or(false),
            glossary_json_path: self.glossary_json_path,
            max_glossary_entries_per_chunk_injection: self
                .max_glossary_entries_per_chunk_injection
                .unwrap_or(DEFAULT_MAX_GLOSSARY_ENTRIES_PER_CHUNK),
            max_glossary_chars_per_chunk_injection: self
                .max_glossary_chars_per_chunk_injection
                .unwrap_or(DEFAULT_MAX_GLOSSARY_CHARS_PER_CHUNK),
            glossary_sampling_ratio,
            glossary_sampling_method: self
                .glossary_sampling_method
                .unwrap_or(DEFAULT_GLOSSARY_SAMPLING_METHOD),
            glossary_extraction_temperature: self
                .glossary_extraction_temperature
                .unwrap_or(DEFAULT_GLOSSARY_EXTRACTION_TEMPERATURE),
            glossary_output_json_filename_suffix: self
                .glossary_output_json_filename_suffix
                .unwrap_or_else(|| DEFAULT_GLOSSARY_SUFFIX.to_string()),
            max_total_glossary_entries: self
                .max_total_glossary_entries
                .unwrap_or(DEFAULT_MAX_TOTAL_GLOSSARY_ENTRIES),
            use_content_safety_retry: self.use_content_safety_retry.unwrap_or(true),
            max_content_safety_split_attempts: self
                .max_content_safety_split_attempts
                .unwrap_or(DEFAULT_MAX_CONTENT_SAFETY_SPLIT_ATTEMPTS),
            min_content_safety_chunk_size: self
                .min_content_safety_chunk_size
                .unwrap_or(DEFAULT_MIN_CONTENT_SAFETY_CHUNK_SIZE),
            enable_post_processing: self.enable_post_processing.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_spec() {
        let config = JobConfig::builder()
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.requests_per_minute, DEFAULT_RPM);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.credential, Credential::Default);
        assert!(config.use_content_safety_retry);
        assert!(config.enable_post_processing);
        assert!(!config.enable_dynamic_glossary_injection);
    }

    #[test]
    fn builder_custom_values_override_defaults() {
        let config = JobConfig::builder()
            .model_name("gemini-2.5-pro")
            .requests_per_minute(120)
            .chunk_size(1000)
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(config.model_name, "gemini-2.5-pro");
        assert_eq!(config.requests_per_minute, 120);
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn builder_rejects_empty_prompt_template() {
        let result = JobConfig::builder().prompt_template("   ").build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn builder_rejects_out_of_range_sampling_ratio() {
        let mut builder = JobConfig::builder();
        builder.glossary_sampling_ratio = Some(1.5);
        assert!(matches!(
            builder.build(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn config_hash_is_stable_and_excludes_credentials() {
        let a = JobConfig::builder()
            .credential(CredentialSpec {
                api_keys: vec!["key-a".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        let b = JobConfig::builder()
            .credential(CredentialSpec {
                api_keys: vec!["key-b".to_string()],
                ..Default::default()
            })
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn config_hash_changes_with_model_name() {
        let a = JobConfig::builder()
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        let b = JobConfig::builder()
            .model_name("gemini-2.5-pro")
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_ne!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn from_file_loads_json_config() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| unreachable!("{e}"));
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"model_name": "gemini-2.5-flash", "requests_per_minute": 30}"#,
        )
        .unwrap_or_else(|e| unreachable!("{e}"));

        let config = JobConfig::builder()
            .from_file(&path)
            .unwrap_or_else(|e| unreachable!("{e}"))
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(config.model_name, "gemini-2.5-flash");
        assert_eq!(config.requests_per_minute, 30);
    }

    #[test]
    fn from_file_rejects_missing_path() {
        let result = JobConfig::builder().from_file(Path::new("/no/such/file.json"));
        assert!(matches!(result, Err(ConfigError::FileLoad { .. })));
    }

    #[test]
    fn explicit_setters_take_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| unreachable!("{e}"));
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model_name": "from-file"}"#)
            .unwrap_or_else(|e| unreachable!("{e}"));

        let config = JobConfig::builder()
            .model_name("from-setter")
            .from_file(&path)
            .unwrap_or_else(|e| unreachable!("{e}"))
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(config.model_name, "from-setter");
    }
}
