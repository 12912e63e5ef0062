//! Text chunking: ordered, lossless segmentation of a source text.
//!
//! Three splitting strategies, each used at a different point in the
//! pipeline:
//!
//! - [`split`] — the primary line-respecting splitter used to turn an input
//!   file into the ordered [`Segment`]s a translation job tracks by index.
//! - [`split_in_two`] — a strict binary split used by the content-safety
//!   recursion in [`crate::translator`].
//! - [`split_by_sentences`] — a last-resort fallback when binary splitting
//!   cannot make progress (e.g. a single unbroken line).

use crate::error::ChunkError;

/// An ordered slice of source text. `index` is dense from 0 within a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position in the ordered sequence produced by the chunker.
    pub index: usize,
    /// The segment's text content.
    pub text: String,
}

/// Splits `text` into segments of at most `max_size` bytes, preserving line
/// boundaries.
///
/// Lines (including their trailing newline) are greedily accumulated into
/// the current segment while `current.len() + line.len() <= max_size`. A
/// single line longer than `max_size` is force-split into exact `max_size`
/// byte runs. The concatenation of all returned segments equals `text`
/// byte-for-byte.
///
/// # Errors
///
/// Returns [`ChunkError::InvalidMaxSize`] if `max_size` is 0.
pub fn split(text: &str, max_size: usize) -> Result<Vec<Segment>, ChunkError> {
    if max_size == 0 {
        return Err(ChunkError::InvalidMaxSize(0));
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in split_keep_ends(text) {
        if current.len() + line.len() <= max_size {
            current.push_str(line);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }

            if line.len() > max_size {
                for piece in force_split_utf8(line, max_size) {
                    chunks.push(piece.to_string());
                }
                current = String::new();
            } else {
                current = line.to_string();
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment { index, text })
        .collect())
}

/// Splits `text` into segments, like `str::lines`, but retains the
/// terminating `\n` (and preceding `\r`, if present) on every line except
/// possibly the last, matching Python's `str.splitlines(keepends=True)`.
fn split_keep_ends(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            out.push(&text[start..=i]);
            start = i + 1;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Splits `line` into chunks of at most `max_size` bytes without breaking a
/// UTF-8 character boundary, so every returned piece is valid `&str`.
fn force_split_utf8(line: &str, max_size: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let mut end = (start + max_size).min(line.len());
        while end < line.len() && !line.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // A single multibyte char is wider than max_size; take it whole
            // rather than looping forever.
            end = line[start..]
                .char_indices()
                .nth(1)
                .map_or(line.len(), |(i, _)| start + i);
        }
        out.push(&line[start..end]);
        start = end;
    }
    out
}

/// Splits `text` into exactly one or two segments.
///
/// Runs [`split`] at `target = text.len() / 2` (or the given `target_size`).
/// If that yields exactly two pieces, returns them. If it yields one, the
/// text cannot be usefully split further and that single piece is returned.
/// If it yields three or more, the trailing pieces are coalesced down to two:
/// the last piece is kept standalone unless it is smaller than
/// `min_ratio * target`, in which case the last *two* pieces are merged
/// instead, and everything before that is folded into the first half.
///
/// # Errors
///
/// Propagates [`ChunkError`] from the underlying [`split`] call.
pub fn split_in_two(text: &str, min_ratio: f64) -> Result<Vec<Segment>, ChunkError> {
    if text.is_empty() {
        return Ok(vec![Segment {
            index: 0,
            text: String::new(),
        }]);
    }

    let target = (text.len() / 2).max(1);
    let min_size = (target as f64 * min_ratio) as usize;

    let initial = split(text, target)?;
    let pieces: Vec<String> = initial.into_iter().map(|s| s.text).collect();

    let merged: Vec<String> = match pieces.len() {
        0 | 1 => pieces,
        2 => pieces,
        _ => {
            let last_len = pieces.last().map_or(0, String::len);
            if last_len >= min_size {
                let (head, tail) = pieces.split_at(pieces.len() - 1);
                vec![head.concat(), tail.concat()]
            } else if pieces.len() == 2 {
                pieces
            } else {
                let (head, tail) = pieces.split_at(pieces.len() - 2);
                vec![head.concat(), tail.concat()]
            }
        }
    };

    Ok(merged
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment { index, text })
        .collect())
}

/// Splits text on sentence boundaries as a last-resort fallback when binary
/// splitting cannot make progress (e.g. one unbroken line of text).
///
/// Splits successively on `[.!?]+\s+` (Latin sentence endings), `[。！？]+\s*`
/// (CJK sentence endings), and runs of newlines, drops empty fragments, and
/// regroups `per_chunk` sentences per output segment (rejoined with a single
/// space).
#[must_use]
pub fn split_by_sentences(text: &str, per_chunk: usize) -> Vec<Segment> {
    let per_chunk = per_chunk.max(1);

    let latin = regex_cache::latin_sentence_end();
    let cjk = regex_cache::cjk_sentence_end();
    let newlines = regex_cache::newline_run();

    let mut sentences: Vec<String> = vec![text.to_string()];
    for pattern in [latin, cjk, newlines] {
        sentences = sentences
            .iter()
            .flat_map(|s| pattern.split(s).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }

    let sentences: Vec<String> = sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.len() <= 1 {
        return vec![Segment {
            index: 0,
            text: text.to_string(),
        }];
    }

    sentences
        .chunks(per_chunk)
        .enumerate()
        .map(|(index, group)| Segment {
            index,
            text: group.join(" "),
        })
        .collect()
}

mod regex_cache {
    use regex::Regex;
    use std::sync::OnceLock;

    pub(super) fn latin_sentence_end() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"[.!?]+\s+").unwrap_or_else(|e| unreachable!("{e}")))
    }

    pub(super) fn cjk_sentence_end() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"[。！？]+\s*").unwrap_or_else(|e| unreachable!("{e}")))
    }

    pub(super) fn newline_run() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"[\n\r]+").unwrap_or_else(|e| unreachable!("{e}")))
    }
}

/// Reassembles segments back into the original text, in index order.
#[must_use]
pub fn concat(segments: &[Segment]) -> String {
    let mut sorted: Vec<&Segment> = segments.iter().collect();
    sorted.sort_by_key(|s| s.index);
    sorted.iter().map(|s| s.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_lossless_for_normal_text() {
        let text = "line one\nline two\nline three";
        let segments = split(text, 30).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn split_respects_max_size() {
        let text = "short first line.\nthis line is considerably longer and should overflow.\nlast.";
        let segments = split(text, 40).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(segments.len() > 1);
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn split_force_splits_oversized_single_line() {
        let text = "a".repeat(100);
        let segments = split(&text, 40).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(segments.len() >= 3);
        for s in &segments {
            assert!(s.text.len() <= 40);
        }
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn split_force_split_preserves_utf8_boundaries() {
        let text = "안".repeat(50); // each char is 3 bytes in UTF-8
        let segments = split(&text, 10).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(concat(&segments), text);
        for s in &segments {
            assert!(s.text.is_char_boundary(0));
        }
    }

    #[test]
    fn split_small_text_is_single_chunk() {
        let text = "a short line of text.";
        let segments = split(text, 100).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
    }

    #[test]
    fn split_empty_text_yields_no_chunks() {
        let segments = split("", 100).unwrap_or_else(|e| unreachable!("{e}"));
        assert!(segments.is_empty());
    }

    #[test]
    fn split_rejects_zero_max_size() {
        let result = split("anything", 0);
        assert!(matches!(result, Err(ChunkError::InvalidMaxSize(0))));
    }

    #[test]
    fn split_indices_are_dense_from_zero() {
        let text = "a\nb\nc\nd\ne\n".repeat(20);
        let segments = split(&text, 5).unwrap_or_else(|e| unreachable!("{e}"));
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.index, i);
        }
    }

    #[test]
    fn split_in_two_produces_two_for_large_text() {
        let text = "word ".repeat(200);
        let segments = split_in_two(&text, 0.3).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(segments.len(), 2);
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn split_in_two_returns_one_when_irreducible() {
        let text = "x";
        let segments = split_in_two(text, 0.3).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
    }

    #[test]
    fn split_in_two_merges_small_tail_into_previous_pair() {
        // Many short lines so split() at the target size yields several
        // pieces; the tiny last piece should get folded into a merged pair.
        let text = "ab\n".repeat(40);
        let segments = split_in_two(&text, 0.3).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(segments.len(), 2);
        assert_eq!(concat(&segments), text);
    }

    #[test]
    fn split_by_sentences_splits_on_terminators() {
        let text = "First sentence. Second sentence! Third one?";
        let segments = split_by_sentences(text, 1);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "First sentence.".trim_end_matches('.').to_string() + ".");
    }

    #[test]
    fn split_by_sentences_groups_per_chunk() {
        let text = "One. Two. Three. Four.";
        let segments = split_by_sentences(text, 2);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn split_by_sentences_falls_back_to_whole_text_when_unsplittable() {
        let text = "nopunctuationatall";
        let segments = split_by_sentences(text, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
    }

    #[test]
    fn split_by_sentences_handles_cjk_terminators() {
        let text = "첫번째 문장。두번째 문장！세번째 문장？";
        let segments = split_by_sentences(text, 1);
        assert_eq!(segments.len(), 3);
    }
}
