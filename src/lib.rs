//! Batch translation pipeline for large text files via a remote
//! generative-language API: resumable chunk scheduling, rate limiting,
//! API-key rotation, content-safety recursive splitting, and dynamic
//! glossary injection.

pub mod api;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod filestore;
pub mod glossary;
pub mod metadata;
pub mod orchestrator;
pub mod postprocess;
pub mod progress;
pub mod rate_limiter;
pub mod translator;

pub use config::{JobConfig, JobConfigBuilder};
pub use error::{OrchestratorError, PipelineError};
pub use metadata::{JobMetadata, JobStatus};
pub use orchestrator::{CancellationFlag, Orchestrator, RunMode};
pub use progress::{GlossaryProgress, TranslationProgress};
