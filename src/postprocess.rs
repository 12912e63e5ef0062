//! Strips chunk markers and translation artifacts from the merged output.
//!
//! Operates on the in-memory merged text, not the filesystem directly, so
//! the orchestrator can produce both the marker-bearing sidecar and the
//! marker-free final output from one merge pass.

use std::sync::OnceLock;

use regex::Regex;

/// Start-of-chunk marker used in scratch and sidecar files.
pub const CHUNK_INDEX_PREFIX: &str = "##CHUNK_INDEX:";
/// End-of-chunk marker used in scratch and sidecar files.
pub const END_CHUNK_MARKER: &str = "##END_CHUNK##";

fn chunk_marker_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^##CHUNK_INDEX:\s*\d+##\s*$\n?|^##END_CHUNK##\s*$\n?")
            .unwrap_or_else(|e| unreachable!("{e}"))
    })
}

fn translation_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^(translated by|translation by|machine translation|--- ?translation ?---).*$\n?")
            .unwrap_or_else(|e| unreachable!("{e}"))
    })
}

fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^```[a-zA-Z]*\s*$\n?").unwrap_or_else(|e| unreachable!("{e}")))
}

fn excess_blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap_or_else(|e| unreachable!("{e}")))
}

/// Strips `##CHUNK_INDEX: N##` / `##END_CHUNK##` markers, translation-header
/// boilerplate, and stray code fences; collapses runs of 3+ blank lines to
/// exactly 2. Markers live in intermediate files only and must never reach
/// the user-facing output.
#[must_use]
pub fn process(merged_text: &str) -> String {
    let without_markers = chunk_marker_line_re().replace_all(merged_text, "");
    let without_headers = translation_header_re().replace_all(&without_markers, "");
    let without_fences = code_fence_re().replace_all(&without_headers, "");
    excess_blank_lines_re()
        .replace_all(&without_fences, "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_chunk_index_and_end_markers() {
        let input = "##CHUNK_INDEX: 0##\nhello\n##END_CHUNK##\n\n##CHUNK_INDEX: 1##\nworld\n##END_CHUNK##\n\n";
        let output = process(input);
        assert!(!output.contains(CHUNK_INDEX_PREFIX));
        assert!(!output.contains(END_CHUNK_MARKER));
        assert!(output.contains("hello"));
        assert!(output.contains("world"));
    }

    #[test]
    fn strips_translation_header_boilerplate() {
        let input = "Translated by: SomeTool v1\nActual content here.\n";
        let output = process(input);
        assert!(!output.to_lowercase().contains("translated by"));
        assert!(output.contains("Actual content here."));
    }

    #[test]
    fn strips_stray_code_fences() {
        let input = "```\ncontent\n```\n";
        let output = process(input);
        assert!(!output.contains("```"));
        assert!(output.contains("content"));
    }

    #[test]
    fn collapses_excess_blank_lines() {
        let input = "a\n\n\n\n\nb";
        let output = process(input);
        assert_eq!(output, "a\n\nb");
    }

    #[test]
    fn leaves_clean_text_untouched() {
        let input = "Just plain translated prose.\nSecond line.";
        assert_eq!(process(input), input);
    }

    #[test]
    fn final_output_never_contains_markers_even_with_dense_input() {
        let mut merged = String::new();
        for i in 0..20 {
            merged.push_str(&format!("##CHUNK_INDEX: {i}##\nchunk {i} text\n##END_CHUNK##\n\n"));
        }
        let output = process(&merged);
        assert!(!output.contains("##CHUNK_INDEX:"));
        assert!(!output.contains("##END_CHUNK##"));
    }
}
