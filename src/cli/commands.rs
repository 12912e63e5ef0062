//! CLI command implementations: resolves a [`Cli`] invocation into a
//! [`JobConfig`], then drives either glossary extraction or a full
//! translation job.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cli::parser::Cli;
use crate::config::JobConfig;
use crate::credential::CredentialSpec;
use crate::error::PipelineError;
use crate::orchestrator::{CancellationFlag, Orchestrator, RunMode};
use crate::progress::TranslationProgress;

/// Runs the command described by `cli` to completion, printing progress to
/// stderr and returning a short human-readable summary line.
///
/// # Errors
///
/// Returns [`PipelineError`] on configuration, I/O, or translation failure.
pub async fn execute(cli: &Cli) -> Result<String, PipelineError> {
    let config = build_config(cli)?;

    if cli.extract_glossary_only {
        return execute_glossary_only(cli, &config).await;
    }

    if cli.input_files.len() > 1 && cli.output.is_some() {
        return Err(PipelineError::Config(crate::error::ConfigError::InvalidValue {
            field: "output".to_string(),
            reason: "an explicit -o/--output path cannot be shared across multiple input files"
                .to_string(),
        }));
    }

    let run_mode = resolve_run_mode(cli);
    let orchestrator = Orchestrator::new(config);
    let mut summaries = Vec::with_capacity(cli.input_files.len());

    for input in &cli.input_files {
        let output = output_path_for(input, cli.output.as_deref());
        let cancellation = CancellationFlag::new();
        let metadata = orchestrator
            .run(input, &output, run_mode, cancellation, |progress| {
                print_progress(&progress);
            })
            .await?;
        summaries.push(format!(
            "{}: {:?} ({}/{} translated, {} failed)",
            input.display(),
            metadata.status,
            metadata.translated_chunks.len(),
            metadata.total_chunks,
            metadata.failed_chunks.len()
        ));
    }

    Ok(summaries.join("\n"))
}

async fn execute_glossary_only(cli: &Cli, config: &JobConfig) -> Result<String, PipelineError> {
    let api_config = crate::api::ApiClientConfig::new(config.credential.clone());
    let rate_limiter = crate::rate_limiter::RateLimiter::new(config.requests_per_minute);
    let api_client = crate::api::ApiClient::new(api_config, rate_limiter);

    let mut summaries = Vec::with_capacity(cli.input_files.len());
    for input in &cli.input_files {
        let text = tokio::fs::read_to_string(input)
            .await
            .map_err(|source| crate::error::FileStoreError::Io {
                path: input.display().to_string(),
                source,
            })?;
        let output_path = glossary_output_path(input, config);
        crate::glossary::extract_and_save(
            &api_client,
            config,
            &text,
            &output_path,
            config.glossary_json_path.as_deref(),
            |progress| {
                let _ = writeln!(
                    io::stderr(),
                    "glossary {}: {}/{} ({})",
                    input.display(),
                    progress.processed_segments,
                    progress.total_segments,
                    progress.status_message
                );
            },
        )
        .await?;
        summaries.push(format!("{}: glossary written to {}", input.display(), output_path.display()));
    }
    Ok(summaries.join("\n"))
}

fn build_config(cli: &Cli) -> Result<JobConfig, PipelineError> {
    let mut builder = JobConfig::builder();

    if !cli.api_keys.is_empty() {
        builder = builder.credential(CredentialSpec {
            api_keys: cli.api_keys.clone(),
            use_vertex_ai: cli.use_vertex_ai,
            gcp_project: cli.gcp_project.clone(),
            gcp_location: cli.gcp_location.clone(),
            ..Default::default()
        });
    } else if cli.use_vertex_ai {
        builder = builder.credential(CredentialSpec {
            use_vertex_ai: true,
            gcp_project: cli.gcp_project.clone(),
            gcp_location: cli.gcp_location.clone(),
            ..Default::default()
        });
    }

    if let Some(model) = &cli.model {
        builder = builder.model_name(model.clone());
    }
    if let Some(rpm) = cli.rpm {
        builder = builder.requests_per_minute(rpm);
    }
    if let Some(chunk_size) = cli.chunk_size {
        builder = builder.chunk_size(chunk_size);
    }
    if let Some(max_workers) = cli.max_workers {
        builder = builder.max_workers(max_workers);
    }
    if let Some(lang) = &cli.novel_language {
        builder = builder.novel_language(lang.clone());
    }
    if let Some(lang) = &cli.target_language {
        builder = builder.target_translation_language(lang.clone());
    }
    if cli.enable_dynamic_glossary_injection {
        builder = builder.enable_dynamic_glossary_injection(true);
    }
    if let Some(path) = &cli.glossary_json_path {
        builder = builder.glossary_json_path(path.clone());
    }

    builder = builder.from_env();
    if let Some(config_path) = &cli.config {
        builder = builder.from_file(config_path)?;
    }

    Ok(builder.build()?)
}

fn resolve_run_mode(cli: &Cli) -> RunMode {
    if cli.force_new {
        RunMode::ForceNew
    } else if cli.resume {
        RunMode::Resume
    } else {
        RunMode::Auto
    }
}

fn output_path_for(input: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| sibling_with_suffix(input, ".out"), Path::to_path_buf)
}

fn glossary_output_path(input: &Path, config: &JobConfig) -> PathBuf {
    sibling_with_suffix(input, &config.glossary_output_json_filename_suffix)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn print_progress(progress: &TranslationProgress) {
    let _ = writeln!(
        io::stderr(),
        "{}/{} translated ({} failed) - {}",
        progress.processed,
        progress.total,
        progress.failed,
        progress.status_message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_for_defaults_to_dot_out_suffix() {
        let path = output_path_for(Path::new("/tmp/book.txt"), None);
        assert_eq!(path, PathBuf::from("/tmp/book.txt.out"));
    }

    #[test]
    fn output_path_for_prefers_explicit_path() {
        let path = output_path_for(Path::new("/tmp/book.txt"), Some(Path::new("/tmp/ko.txt")));
        assert_eq!(path, PathBuf::from("/tmp/ko.txt"));
    }

    #[test]
    fn resolve_run_mode_force_new_takes_precedence() {
        let cli = Cli {
            input_files: vec![PathBuf::from("a.txt")],
            output: None,
            config: None,
            resume: false,
            force_new: true,
            extract_glossary_only: false,
            api_keys: Vec::new(),
            use_vertex_ai: false,
            gcp_project: None,
            gcp_location: None,
            novel_language: None,
            target_language: None,
            model: None,
            rpm: None,
            chunk_size: None,
            max_workers: None,
            enable_dynamic_glossary_injection: false,
            glossary_json_path: None,
            verbose: false,
        };
        assert_eq!(resolve_run_mode(&cli), RunMode::ForceNew);
    }

    #[test]
    fn glossary_output_path_uses_configured_suffix() {
        let config = JobConfig::builder()
            .build()
            .unwrap_or_else(|e| unreachable!("{e}"));
        let path = glossary_output_path(Path::new("/tmp/book.txt"), &config);
        assert_eq!(path, PathBuf::from("/tmp/book.txt_glossary.json"));
    }
}
