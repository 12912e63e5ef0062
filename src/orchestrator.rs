//! Top-level translation job: metadata reconciliation, chunk scheduling,
//! progress aggregation, cancellation, and final merge.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::api::{ApiClient, ApiClientConfig};
use crate::chunk::{self, Segment};
use crate::config::JobConfig;
use crate::error::{FileStoreError, OrchestratorError};
use crate::filestore::FileStore;
use crate::glossary::GlossaryEntry;
use crate::metadata::{JobMetadata, JobStatus};
use crate::postprocess;
use crate::progress::TranslationProgress;
use crate::rate_limiter::RateLimiter;
use crate::translator::prompt::validate_template;
use crate::translator::Translator;

/// How a job should reconcile against any existing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resume if `config_hash` and `total_chunks` match; otherwise start
    /// fresh (the default CLI behavior).
    Auto,
    /// Resume is required to have matching metadata; mismatched metadata
    /// still forces a fresh start rather than corrupting output.
    Resume,
    /// Always discard any existing metadata/output and start fresh.
    ForceNew,
}

/// Cooperative cancellation handle shared between the orchestrator and its
/// caller (e.g. a signal handler installed by the CLI).
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a fresh, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Counters {
    processed: usize,
    successful: usize,
    failed: usize,
}

/// Drives one translation job end-to-end.
pub struct Orchestrator {
    config: Arc<JobConfig>,
    api_client: Arc<ApiClient>,
}

impl Orchestrator {
    /// Builds an orchestrator from a resolved job configuration.
    #[must_use]
    pub fn new(config: JobConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.requests_per_minute);
        let api_config = ApiClientConfig::new(config.credential.clone());
        let config = Arc::new(config);
        let api_client = Arc::new(ApiClient::new(api_config, rate_limiter));
        Self { config, api_client }
    }

    /// Runs a translation job against `input_path`, writing to
    /// `output_path`, reporting progress via `on_progress`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on configuration validation failure,
    /// chunking failure, or filestore failure. Per-chunk translation
    /// failures never abort the job; they are recorded in the returned
    /// metadata instead.
    pub async fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        mode: RunMode,
        cancellation: CancellationFlag,
        mut on_progress: impl FnMut(TranslationProgress) + Send,
    ) -> Result<JobMetadata, OrchestratorError> {
        validate_template(
            &self.config.prompt_template,
            self.config.enable_dynamic_glossary_injection,
        )?;

        let store = FileStore::new(input_path, output_path);
        let input_text = store.read_input(input_path).await?;
        let segments = chunk::split(&input_text, self.config.chunk_size)?;
        let total_chunks = segments.len();
        let config_hash = self.config.config_hash();
        let now = unix_now();

        let existing = store.load_metadata().await?;
        let (mut metadata, is_resume) =
            reconcile(existing, mode, &config_hash, total_chunks, input_path, now);

        if !is_resume {
            store.delete_for_fresh_start().await?;
        }

        let glossary = load_glossary(&self.config)?;

        metadata.status = JobStatus::InProgress;
        store.save_metadata(&metadata).await?;

        let pending: Vec<usize> = metadata.pending_indices();
        let counters = Arc::new(Mutex::new(Counters {
            processed: metadata.translated_chunks.len(),
            successful: metadata.translated_chunks.len(),
            failed: metadata.failed_chunks.len(),
        }));

        on_progress(TranslationProgress::starting(
            total_chunks,
            metadata.translated_chunks.len(),
        ));

        if pending.is_empty() {
            return self
                .finish(&store, &mut metadata, cancellation.is_cancelled())
                .await;
        }

        let by_index: BTreeMap<usize, &Segment> =
            segments.iter().map(|s| (s.index, s)).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let metadata_lock = Arc::new(Mutex::new(()));
        let store = Arc::new(store);

        let mut join_set = JoinSet::new();
        for index in pending {
            if cancellation.is_cancelled() {
                break;
            }
            let Some(segment) = by_index.get(&index) else {
                continue;
            };
            let text = segment.text.clone();
            let semaphore = Arc::clone(&semaphore);
            let translator = self.build_translator(cancellation.clone());
            let glossary = glossary.clone();
            let store = Arc::clone(&store);
            let cancellation = cancellation.clone();

            let use_safety_retry = self.config.use_content_safety_retry;
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                if cancellation.is_cancelled() {
                    return None;
                }
                let result = if use_safety_retry {
                    translator.translate_with_safety_retry(&text, &glossary, 0).await
                } else {
                    match translator.translate(&text, &glossary).await {
                        Ok(text) => text,
                        Err(err) => format!("[translation failure: {err}] {text}"),
                    }
                };
                if cancellation.is_cancelled() {
                    return None;
                }
                Some((index, result))
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let Ok(Some((index, result))) = joined else {
                continue;
            };
            let failed = result.starts_with("[translation failure:");
            store.append_chunk(index, &result).await?;

            let _guard = metadata_lock.lock().await;
            if failed {
                metadata.record_failure(index, result);
            } else {
                metadata.record_success(index, unix_now());
            }
            metadata.touch(unix_now());
            store.save_metadata(&metadata).await?;
            drop(_guard);

            let mut c = counters.lock().await;
            c.processed += 1;
            if failed {
                c.failed += 1;
            } else {
                c.successful += 1;
            }
            on_progress(TranslationProgress {
                total: total_chunks,
                processed: c.processed,
                successful: c.successful,
                failed: c.failed,
                status_message: format!("chunk {index} done"),
                current_index: Some(index),
                last_error: None,
            });
        }

        self.finish(&store, &mut metadata, cancellation.is_cancelled())
            .await
    }

    fn build_translator(&self, cancellation: CancellationFlag) -> Translator {
        let stop_check = Arc::new(move || cancellation.is_cancelled());
        Translator::new(Arc::clone(&self.api_client), Arc::clone(&self.config), stop_check)
    }

    async fn finish(
        &self,
        store: &FileStore,
        metadata: &mut JobMetadata,
        cancelled: bool,
    ) -> Result<JobMetadata, OrchestratorError> {
        let merged = store.load_merge_sources().await?;
        store.write_sidecar(&merged).await?;

        let concatenated = merged
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");
        let final_text = if self.config.enable_post_processing {
            postprocess::process(&concatenated)
        } else {
            concatenated
        };
        store.write_output(&final_text).await?;
        store.delete_scratch().await?;

        metadata.status = metadata.implied_terminal_status(cancelled);
        metadata.touch(unix_now());
        store.save_metadata(metadata).await?;

        Ok(metadata.clone())
    }
}

fn reconcile(
    existing: Option<JobMetadata>,
    mode: RunMode,
    config_hash: &str,
    total_chunks: usize,
    input_path: &Path,
    now: u64,
) -> (JobMetadata, bool) {
    match (mode, existing) {
        (RunMode::ForceNew, _) => (
            JobMetadata::new(input_path.display().to_string(), total_chunks, config_hash.to_string(), now),
            false,
        ),
        (_, Some(meta)) if meta.is_resumable(config_hash, total_chunks) => (meta, true),
        (_, _) => (
            JobMetadata::new(input_path.display().to_string(), total_chunks, config_hash.to_string(), now),
            false,
        ),
    }
}

fn load_glossary(config: &JobConfig) -> Result<Vec<GlossaryEntry>, OrchestratorError> {
    if !config.enable_dynamic_glossary_injection {
        return Ok(Vec::new());
    }
    let Some(path) = config.glossary_json_path.as_deref() else {
        return Ok(Vec::new());
    };
    crate::glossary::load(path)
        .map_err(|e| OrchestratorError::FileStore(to_filestore_error(e)))
}

fn to_filestore_error(err: crate::error::GlossaryError) -> FileStoreError {
    match err {
        crate::error::GlossaryError::Io(e) => FileStoreError::Io {
            path: "glossary".to_string(),
            source: e,
        },
        crate::error::GlossaryError::Json(e) => FileStoreError::Json(e),
        crate::error::GlossaryError::Api(_) => FileStoreError::Io {
            path: "glossary".to_string(),
            source: std::io::Error::other("unexpected API error while loading glossary"),
        },
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
