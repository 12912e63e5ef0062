//! Persisted job state, enabling resumable translation runs.
//!
//! The orchestrator exclusively owns a [`JobMetadata`] for the life of a
//! job and serializes writes to it; readers always reload from disk before
//! writing to avoid lost updates from a concurrent process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Metadata and work set computed, no chunks dispatched yet.
    Initialized,
    /// Workers are actively translating.
    InProgress,
    /// All chunks succeeded.
    Completed,
    /// All chunks were attempted but at least one failed.
    CompletedWithErrors,
    /// Cancelled before completion.
    Stopped,
    /// A fatal, job-level error occurred before any chunks were dispatched.
    Error,
}

/// Persisted state for one translation job, stored beside the input file as
/// `<input>_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Absolute path to the input file.
    pub input_file: String,
    /// Total number of chunks the input was split into.
    pub total_chunks: usize,
    /// Stable fingerprint of the job configuration, excluding credentials.
    pub config_hash: String,
    /// Unix seconds at job creation.
    pub creation_time: u64,
    /// Unix seconds of the last metadata write.
    pub last_updated: u64,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Chunk index (as a string key) to completion timestamp.
    pub translated_chunks: BTreeMap<String, u64>,
    /// Chunk index (as a string key) to last error message.
    pub failed_chunks: BTreeMap<String, String>,
}

impl JobMetadata {
    /// Creates fresh metadata for a new job.
    #[must_use]
    pub fn new(input_file: String, total_chunks: usize, config_hash: String, now: u64) -> Self {
        Self {
            input_file,
            total_chunks,
            config_hash,
            creation_time: now,
            last_updated: now,
            status: JobStatus::Initialized,
            translated_chunks: BTreeMap::new(),
            failed_chunks: BTreeMap::new(),
        }
    }

    /// Whether this metadata can be resumed against a job with
    /// `config_hash` and `total_chunks` matching the newly computed values.
    #[must_use]
    pub fn is_resumable(&self, config_hash: &str, total_chunks: usize) -> bool {
        self.config_hash == config_hash
            && self.total_chunks == total_chunks
            && self.status != JobStatus::Error
    }

    /// Indices not yet present in `translated_chunks`.
    #[must_use]
    pub fn pending_indices(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|i| !self.translated_chunks.contains_key(&i.to_string()))
            .collect()
    }

    /// Indices currently recorded as failed.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed_chunks
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect()
    }

    /// Records a successful translation of `index`, removing it from
    /// `failed_chunks` if a prior attempt had failed.
    pub fn record_success(&mut self, index: usize, completed_at: u64) {
        let key = index.to_string();
        self.failed_chunks.remove(&key);
        self.translated_chunks.insert(key, completed_at);
    }

    /// Records a failed translation of `index`. The index must not already
    /// be present in `translated_chunks`; a prior success is not
    /// overwritten by a later failure of a retry that was never attempted.
    pub fn record_failure(&mut self, index: usize, error: String) {
        let key = index.to_string();
        if !self.translated_chunks.contains_key(&key) {
            self.failed_chunks.insert(key, error);
        }
    }

    /// Computes the terminal status implied by the current counts.
    #[must_use]
    pub fn implied_terminal_status(&self, cancelled: bool) -> JobStatus {
        if cancelled {
            return JobStatus::Stopped;
        }
        if self.translated_chunks.len() == self.total_chunks && self.failed_chunks.is_empty() {
            JobStatus::Completed
        } else {
            JobStatus::CompletedWithErrors
        }
    }

    /// Touches `last_updated` to `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(total: usize) -> JobMetadata {
        JobMetadata::new("/tmp/input.txt".to_string(), total, "hash".to_string(), 0)
    }

    #[test]
    fn pending_indices_starts_as_everything() {
        let meta = metadata(3);
        assert_eq!(meta.pending_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn record_success_removes_from_pending_and_failed() {
        let mut meta = metadata(3);
        meta.record_failure(1, "boom".to_string());
        meta.record_success(1, 100);
        assert_eq!(meta.pending_indices(), vec![0, 2]);
        assert!(meta.failed_chunks.is_empty());
    }

    #[test]
    fn index_never_in_both_maps_simultaneously() {
        let mut meta = metadata(2);
        meta.record_success(0, 10);
        meta.record_failure(0, "late failure, should not override".to_string());
        assert!(!meta.failed_chunks.contains_key("0"));
        assert!(meta.translated_chunks.contains_key("0"));
    }

    #[test]
    fn is_resumable_requires_matching_hash_and_total() {
        let meta = metadata(5);
        assert!(meta.is_resumable("hash", 5));
        assert!(!meta.is_resumable("different-hash", 5));
        assert!(!meta.is_resumable("hash", 6));
    }

    #[test]
    fn error_status_is_never_resumable() {
        let mut meta = metadata(5);
        meta.status = JobStatus::Error;
        assert!(!meta.is_resumable("hash", 5));
    }

    #[test]
    fn implied_terminal_status_completed_when_all_succeed() {
        let mut meta = metadata(2);
        meta.record_success(0, 1);
        meta.record_success(1, 2);
        assert_eq!(meta.implied_terminal_status(false), JobStatus::Completed);
    }

    #[test]
    fn implied_terminal_status_completed_with_errors() {
        let mut meta = metadata(2);
        meta.record_success(0, 1);
        meta.record_failure(1, "err".to_string());
        assert_eq!(
            meta.implied_terminal_status(false),
            JobStatus::CompletedWithErrors
        );
    }

    #[test]
    fn implied_terminal_status_stopped_on_cancellation() {
        let meta = metadata(2);
        assert_eq!(meta.implied_terminal_status(true), JobStatus::Stopped);
    }

    #[test]
    fn serializes_status_as_snake_case() {
        let meta = metadata(1);
        let json = serde_json::to_string(&meta).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(json.contains("\"status\":\"initialized\""));
    }
}
