//! Bilingual glossary extraction, aggregation, and persistence.
//!
//! Samples a subset of segments, asks the generative API to extract
//! `{keyword, translated_keyword, target_language, occurrence_count}`
//! tuples from each, and merges the results into a deduplicated, capped,
//! sorted JSON array.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::api::{ApiClient, GenerateRequest};
use crate::chunk::{split, Segment};
use crate::config::{GlossarySamplingMethod, JobConfig};
use crate::error::GlossaryError;
use crate::progress::GlossaryProgress;

/// A single bilingual glossary term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Source-language term.
    pub keyword: String,
    /// Target-language translation of `keyword`.
    pub translated_keyword: String,
    /// Target language this translation applies to.
    pub target_language: String,
    /// Number of times this term was observed across sampled segments.
    pub occurrence_count: u64,
}

/// Extracts a glossary from `novel_text`, merges in `seed_path` if given,
/// and writes the result to `output_path`.
///
/// # Errors
///
/// Returns [`GlossaryError`] if the seed or output file cannot be read or
/// written.
pub async fn extract_and_save(
    api_client: &ApiClient,
    config: &JobConfig,
    novel_text: &str,
    output_path: &Path,
    seed_path: Option<&Path>,
    mut on_progress: impl FnMut(GlossaryProgress),
) -> Result<(), GlossaryError> {
    let segments = split(novel_text, config.chunk_size).unwrap_or_else(|_| Vec::new());
    let sample = sample_segments(
        &segments,
        config.glossary_sampling_ratio,
        config.glossary_sampling_method,
    );

    let mut aggregated: HashMap<(String, String), GlossaryEntry> = HashMap::new();
    let total = sample.len();

    on_progress(GlossaryProgress {
        total_segments: total,
        processed_segments: 0,
        status_message: "starting glossary extraction".to_string(),
        extracted_entries_count: 0,
    });

    for (processed, segment) in sample.iter().enumerate() {
        match extract_from_segment(api_client, config, &segment.text).await {
            Ok(entries) => merge_entries(&mut aggregated, entries),
            Err(err) => warn!(index = segment.index, %err, "glossary extraction failed for segment, skipping"),
        }

        on_progress(GlossaryProgress {
            total_segments: total,
            processed_segments: processed + 1,
            status_message: format!("extracted from segment {}/{}", processed + 1, total),
            extracted_entries_count: aggregated.len(),
        });
    }

    if let Some(seed_path) = seed_path {
        if seed_path.exists() {
            let seed_text = std::fs::read_to_string(seed_path)?;
            let seed_entries: Vec<GlossaryEntry> = serde_json::from_str(&seed_text)?;
            merge_entries(&mut aggregated, seed_entries);
        }
    }

    let mut entries: Vec<GlossaryEntry> = aggregated.into_values().collect();
    sort_entries(&mut entries);
    entries.truncate(config.max_total_glossary_entries);

    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(output_path, json)?;

    Ok(())
}

/// Selects which segments to sample for extraction, per the configured
/// method and ratio. Always samples at least one segment when any exist.
#[must_use]
pub fn sample_segments(
    segments: &[Segment],
    ratio: f64,
    method: GlossarySamplingMethod,
) -> Vec<Segment> {
    if segments.is_empty() {
        return Vec::new();
    }

    let count = ((segments.len() as f64) * ratio).ceil().max(1.0) as usize;
    let count = count.min(segments.len());

    match method {
        GlossarySamplingMethod::Uniform => {
            let step = segments.len() as f64 / count as f64;
            (0..count)
                .map(|i| {
                    let idx = ((i as f64) * step) as usize;
                    segments[idx.min(segments.len() - 1)].clone()
                })
                .collect()
        }
        GlossarySamplingMethod::Random => {
            let mut indices: Vec<usize> = (0..segments.len()).collect();
            indices.shuffle(&mut rand::rng());
            indices.truncate(count);
            indices.sort_unstable();
            indices.into_iter().map(|i| segments[i].clone()).collect()
        }
    }
}

async fn extract_from_segment(
    api_client: &ApiClient,
    config: &JobConfig,
    segment_text: &str,
) -> Result<Vec<GlossaryEntry>, GlossaryError> {
    let mut request = GenerateRequest::new(extraction_prompt(segment_text), &config.model_name);
    request.temperature = config.glossary_extraction_temperature;
    request.top_p = config.top_p;
    request.json_mode = true;

    let response = api_client.generate(&request).await?;
    let value = match response {
        crate::api::GenerateResponse::Structured(v) => v,
        crate::api::GenerateResponse::Text(text) => serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({"terms": []})),
    };

    let terms = value
        .get("terms")
        .and_then(|t| t.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(terms
        .into_iter()
        .filter_map(|t| serde_json::from_value(t).ok())
        .collect())
}

fn extraction_prompt(segment_text: &str) -> String {
    format!(
        "Extract named entities, places, and recurring terms from the following text. \
         Respond with JSON: {{\"terms\": [{{\"keyword\": ..., \"translated_keyword\": ..., \
         \"target_language\": ..., \"occurrence_count\": ...}}]}}.\n\nText:\n{segment_text}"
    )
}

/// Merges `entries` into `aggregated`, deduplicating on
/// `(keyword.lower, target_language.lower)` and summing occurrence counts.
/// On a tie, the first-seen translation for a keyword is kept.
pub fn merge_entries(
    aggregated: &mut HashMap<(String, String), GlossaryEntry>,
    entries: Vec<GlossaryEntry>,
) {
    for entry in entries {
        let key = (
            entry.keyword.to_lowercase(),
            entry.target_language.to_lowercase(),
        );
        aggregated
            .entry(key)
            .and_modify(|existing| existing.occurrence_count += entry.occurrence_count)
            .or_insert(entry);
    }
}

/// Sorts entries by occurrence count descending, then keyword ascending.
pub fn sort_entries(entries: &mut [GlossaryEntry]) {
    entries.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| a.keyword.to_lowercase().cmp(&b.keyword.to_lowercase()))
    });
}

/// Loads a glossary JSON file, returning an empty list if it doesn't exist.
///
/// # Errors
///
/// Returns [`GlossaryError`] if the file exists but cannot be read or
/// parsed.
pub fn load(path: &Path) -> Result<Vec<GlossaryEntry>, GlossaryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(keyword: &str, translated: &str, count: u64) -> GlossaryEntry {
        GlossaryEntry {
            keyword: keyword.to_string(),
            translated_keyword: translated.to_string(),
            target_language: "ko".to_string(),
            occurrence_count: count,
        }
    }

    #[test]
    fn merge_entries_sums_counts_for_same_key_case_insensitively() {
        let mut aggregated = HashMap::new();
        merge_entries(&mut aggregated, vec![entry("Cat", "고양이", 3)]);
        merge_entries(&mut aggregated, vec![entry("cat", "다른", 5)]);
        assert_eq!(aggregated.len(), 1);
        let merged = &aggregated[&("cat".to_string(), "ko".to_string())];
        assert_eq!(merged.occurrence_count, 8);
        assert_eq!(merged.translated_keyword, "고양이");
    }

    #[test]
    fn sort_entries_orders_by_count_desc_then_keyword_asc() {
        let mut entries = vec![entry("zebra", "z", 5), entry("apple", "a", 5), entry("dog", "d", 10)];
        sort_entries(&mut entries);
        let order: Vec<&str> = entries.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(order, vec!["dog", "apple", "zebra"]);
    }

    #[test]
    fn sample_segments_uniform_returns_at_least_one() {
        let segments: Vec<Segment> = (0..10)
            .map(|i| Segment {
                index: i,
                text: format!("segment {i}"),
            })
            .collect();
        let sample = sample_segments(&segments, 0.0, GlossarySamplingMethod::Uniform);
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn sample_segments_respects_ratio() {
        let segments: Vec<Segment> = (0..20)
            .map(|i| Segment {
                index: i,
                text: format!("segment {i}"),
            })
            .collect();
        let sample = sample_segments(&segments, 0.5, GlossarySamplingMethod::Uniform);
        assert_eq!(sample.len(), 10);
    }

    #[test]
    fn sample_segments_empty_input_yields_empty_output() {
        let sample = sample_segments(&[], 0.5, GlossarySamplingMethod::Uniform);
        assert!(sample.is_empty());
    }

    #[test]
    fn load_missing_file_returns_empty_vec() {
        let entries = load(Path::new("/no/such/glossary.json")).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(entries.is_empty());
    }
}
