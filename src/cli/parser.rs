//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Batch-translate one or more text files via a remote generative-language
/// API, with resumable chunk scheduling, key rotation, and glossary
/// injection.
#[derive(Parser, Debug)]
#[command(name = "novel-translate")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  novel-translate book.txt                          # translate, writing book.txt.out next to it
  novel-translate book.txt -o ko.txt --rpm 30        # custom output path and throttling
  novel-translate book.txt --resume                  # continue a previously started job
  novel-translate book.txt --extract-glossary-only   # only extract and save the glossary
  novel-translate a.txt b.txt -c job.json            # batch-translate with a shared config file
"#)]
pub struct Cli {
    /// Input text file(s) to translate.
    #[arg(required = true)]
    pub input_files: Vec<PathBuf>,

    /// Output file path. Defaults to `<input>.out` per input file; may not
    /// be used together with more than one input file, since one explicit
    /// path can't be shared across multiple outputs.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to a JSON configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Resume a previously started job; fails back to a fresh job if the
    /// prior metadata's config hash or chunk count no longer matches.
    #[arg(long, conflicts_with = "force_new")]
    pub resume: bool,

    /// Discard any existing metadata/output and start a fresh job.
    #[arg(long)]
    pub force_new: bool,

    /// Only extract and save the glossary; do not translate.
    #[arg(long)]
    pub extract_glossary_only: bool,

    /// Comma-separated Gemini API keys, rotated on rate limit/quota errors.
    #[arg(long, value_delimiter = ',')]
    pub api_keys: Vec<String>,

    /// Use Vertex AI with a service account instead of API keys.
    #[arg(long)]
    pub use_vertex_ai: bool,

    /// GCP project ID, required with `--use-vertex-ai`.
    #[arg(long)]
    pub gcp_project: Option<String>,

    /// GCP location, required with `--use-vertex-ai`.
    #[arg(long)]
    pub gcp_location: Option<String>,

    /// Source-language hint ("auto" to detect).
    #[arg(long)]
    pub novel_language: Option<String>,

    /// Target translation language.
    #[arg(long)]
    pub target_language: Option<String>,

    /// Model identifier passed to the generative API.
    #[arg(long)]
    pub model: Option<String>,

    /// Requests per minute; 0 disables throttling.
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Maximum chunk size in bytes.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Worker pool size. Defaults to CPU count.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Inject per-chunk glossary entries into the translation prompt.
    #[arg(long)]
    pub enable_dynamic_glossary_injection: bool,

    /// Path to the glossary JSON file to read from and write to.
    #[arg(long)]
    pub glossary_json_path: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}
