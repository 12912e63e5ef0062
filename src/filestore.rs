//! Filesystem access for a translation job: input/output text, the
//! chunk-indexed scratch/sidecar files, and persisted [`JobMetadata`].
//!
//! Block format shared by the scratch file and the `.chunked.txt` sidecar:
//! `##CHUNK_INDEX: N##\n<text>\n##END_CHUNK##\n\n`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::FileStoreError;
use crate::metadata::JobMetadata;
use crate::postprocess::{CHUNK_INDEX_PREFIX, END_CHUNK_MARKER};

fn io_err(path: &Path, source: std::io::Error) -> FileStoreError {
    FileStoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Owns the on-disk paths for one translation job and serializes writes to
/// the scratch file and metadata file, mirroring the "writes are serialized
/// through a single mutex; readers always reload from disk" discipline.
pub struct FileStore {
    output_path: PathBuf,
    metadata_path: PathBuf,
    scratch_path: PathBuf,
    sidecar_path: PathBuf,
    scratch_lock: Mutex<()>,
    metadata_lock: Mutex<()>,
}

impl FileStore {
    /// Derives all job paths from `input_path` and `output_path`.
    #[must_use]
    pub fn new(input_path: &Path, output_path: &Path) -> Self {
        let metadata_path = sibling_with_suffix(input_path, "_metadata.json");
        let scratch_path = sibling_with_suffix(output_path, ".current_run.tmp");
        let sidecar_path = sibling_with_suffix(output_path, ".chunked.txt");
        Self {
            output_path: output_path.to_path_buf(),
            metadata_path,
            scratch_path,
            sidecar_path,
            scratch_lock: Mutex::new(()),
            metadata_lock: Mutex::new(()),
        }
    }

    /// Path of the final output file.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Path of the persisted metadata file.
    #[must_use]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Path of the append-only scratch file for the current run.
    #[must_use]
    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }

    /// Path of the resumability sidecar.
    #[must_use]
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// Reads the input file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a read failure, or
    /// [`FileStoreError::InvalidUtf8`] if the bytes are not valid UTF-8.
    pub async fn read_input(&self, input_path: &Path) -> Result<String, FileStoreError> {
        let bytes = tokio::fs::read(input_path)
            .await
            .map_err(|e| io_err(input_path, e))?;
        String::from_utf8(bytes).map_err(|e| FileStoreError::InvalidUtf8(e.to_string()))
    }

    /// Loads metadata if present, returning `None` if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a read failure other than
    /// not-found, or [`FileStoreError::Json`] on malformed JSON.
    pub async fn load_metadata(&self) -> Result<Option<JobMetadata>, FileStoreError> {
        match tokio::fs::read(&self.metadata_path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.metadata_path, e)),
        }
    }

    /// Overwrites the metadata file with `metadata`, serialized through a
    /// single mutex so concurrent workers never interleave writes.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a write failure.
    pub async fn save_metadata(&self, metadata: &JobMetadata) -> Result<(), FileStoreError> {
        let _guard = self.metadata_lock.lock().await;
        let json = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(&self.metadata_path, json)
            .await
            .map_err(|e| io_err(&self.metadata_path, e))
    }

    /// Appends one chunk block to the scratch file, serialized per job.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a write failure.
    pub async fn append_chunk(&self, index: usize, text: &str) -> Result<(), FileStoreError> {
        let _guard = self.scratch_lock.lock().await;
        let block = format_block(index, text);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.scratch_path)
            .await
            .map_err(|e| io_err(&self.scratch_path, e))?;
        file.write_all(block.as_bytes())
            .await
            .map_err(|e| io_err(&self.scratch_path, e))
    }

    /// Reconstructs the translated-chunks map from the scratch file, the
    /// previous final output's sidecar, and the previous final output
    /// itself (in ascending priority: sidecar first, scratch last), so
    /// newly translated indices override previously persisted ones.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a read failure other than
    /// not-found.
    pub async fn load_merge_sources(&self) -> Result<BTreeMap<usize, String>, FileStoreError> {
        let mut merged = BTreeMap::new();
        if let Some(sidecar) = read_optional(&self.sidecar_path).await? {
            merged.extend(parse_blocks(&sidecar));
        }
        if let Some(scratch) = read_optional(&self.scratch_path).await? {
            merged.extend(parse_blocks(&scratch));
        }
        Ok(merged)
    }

    /// Writes `merged` as the chunk-indexed sidecar file.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a write failure.
    pub async fn write_sidecar(&self, merged: &BTreeMap<usize, String>) -> Result<(), FileStoreError> {
        let content = render_blocks(merged);
        tokio::fs::write(&self.sidecar_path, content)
            .await
            .map_err(|e| io_err(&self.sidecar_path, e))
    }

    /// Writes `final_text` as the marker-free final output.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a write failure.
    pub async fn write_output(&self, final_text: &str) -> Result<(), FileStoreError> {
        tokio::fs::write(&self.output_path, final_text)
            .await
            .map_err(|e| io_err(&self.output_path, e))
    }

    /// Deletes the scratch file, tolerating it already being absent.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a deletion failure other than
    /// not-found.
    pub async fn delete_scratch(&self) -> Result<(), FileStoreError> {
        delete_tolerating_missing(&self.scratch_path).await
    }

    /// Deletes the output and metadata files, used when a prior job must be
    /// discarded in favor of a fresh run.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] on a deletion failure other than
    /// not-found.
    pub async fn delete_for_fresh_start(&self) -> Result<(), FileStoreError> {
        delete_tolerating_missing(&self.output_path).await?;
        delete_tolerating_missing(&self.metadata_path).await
    }
}

async fn delete_tolerating_missing(path: &Path) -> Result<(), FileStoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(_) if !path.exists() => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, FileStoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn format_block(index: usize, text: &str) -> String {
    format!("{CHUNK_INDEX_PREFIX} {index}##\n{text}\n{END_CHUNK_MARKER}\n\n")
}

fn render_blocks(merged: &BTreeMap<usize, String>) -> String {
    merged
        .iter()
        .map(|(index, text)| format_block(*index, text))
        .collect()
}

/// Parses `##CHUNK_INDEX: N##\n...\n##END_CHUNK##` blocks out of scratch or
/// sidecar content. Malformed or truncated trailing blocks are skipped
/// rather than causing the whole reconstruction to fail.
fn parse_blocks(content: &str) -> BTreeMap<usize, String> {
    let mut blocks = BTreeMap::new();
    let mut rest = content;
    while let Some(start) = rest.find(CHUNK_INDEX_PREFIX) {
        let after_prefix = &rest[start + CHUNK_INDEX_PREFIX.len()..];
        let Some(hash_end) = after_prefix.find("##") else {
            break;
        };
        let index_str = after_prefix[..hash_end].trim();
        let Ok(index) = index_str.parse::<usize>() else {
            rest = &after_prefix[hash_end + 2..];
            continue;
        };
        let body_start = hash_end + 2;
        let Some(body_start) = after_prefix[body_start..]
            .find('\n')
            .map(|i| body_start + i + 1)
        else {
            break;
        };
        let Some(end_marker) = after_prefix[body_start..].find(END_CHUNK_MARKER) else {
            break;
        };
        let text = after_prefix[body_start..body_start + end_marker]
            .trim_end_matches('\n')
            .to_string();
        blocks.insert(index, text);
        rest = &after_prefix[body_start + end_marker + END_CHUNK_MARKER.len()..];
    }
    blocks
}
