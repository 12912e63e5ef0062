//! Prompt template validation and placeholder substitution.
//!
//! `{{glossary_context}}` is substituted first, `{{slot}}` last, matching
//! the contract that chunk text itself may legitimately contain `{{` runs
//! that must not be mistaken for template placeholders.

use crate::error::TranslationError;
use crate::glossary::GlossaryEntry;

const SLOT_PLACEHOLDER: &str = "{{slot}}";
const GLOSSARY_PLACEHOLDER: &str = "{{glossary_context}}";

/// Literal substituted for `{{glossary_context}}` when injection is
/// disabled, or enabled but no entry matches the current chunk.
pub const NO_GLOSSARY_CONTEXT: &str = "no glossary context";

/// Validates that `template` satisfies the prompt construction contract:
/// it must always contain `{{slot}}`, and must additionally contain
/// `{{glossary_context}}` if dynamic glossary injection is enabled.
///
/// # Errors
///
/// Returns [`TranslationError::MissingPlaceholder`] naming whichever
/// required placeholder is absent. This check runs once at job start so a
/// misconfigured template fails before any API calls are made.
pub fn validate_template(template: &str, glossary_injection_enabled: bool) -> Result<(), TranslationError> {
    if !template.contains(SLOT_PLACEHOLDER) {
        return Err(TranslationError::MissingPlaceholder {
            placeholder: "slot".to_string(),
        });
    }
    if glossary_injection_enabled && !template.contains(GLOSSARY_PLACEHOLDER) {
        return Err(TranslationError::MissingPlaceholder {
            placeholder: "glossary_context".to_string(),
        });
    }
    Ok(())
}

/// Renders the glossary-context string for a chunk: entries whose keyword
/// appears as a case-insensitive substring of `chunk_text`, ordered by
/// occurrence count descending then keyword ascending, capped at
/// `max_entries` and `max_chars`. At least one entry is always included if
/// any match, even if it alone exceeds `max_chars`. Returns
/// [`NO_GLOSSARY_CONTEXT`] if nothing matches.
#[must_use]
pub fn render_glossary_context(
    entries: &[GlossaryEntry],
    chunk_text: &str,
    max_entries: usize,
    max_chars: usize,
) -> String {
    let chunk_lower = chunk_text.to_lowercase();

    let mut matching: Vec<&GlossaryEntry> = entries
        .iter()
        .filter(|e| chunk_lower.contains(&e.keyword.to_lowercase()))
        .collect();

    matching.sort_by(|a, b| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| a.keyword.to_lowercase().cmp(&b.keyword.to_lowercase()))
    });

    let mut lines = Vec::new();
    let mut current_chars = 0usize;

    for entry in matching.into_iter().take(max_entries) {
        let line = format!(
            "- {} -> {} ({}) (seen: {})",
            entry.keyword, entry.translated_keyword, entry.target_language, entry.occurrence_count
        );
        if lines.is_empty() || current_chars + line.len() <= max_chars {
            current_chars += line.len();
            lines.push(line);
        } else {
            break;
        }
    }

    if lines.is_empty() {
        NO_GLOSSARY_CONTEXT.to_string()
    } else {
        lines.join("\n")
    }
}

/// Substitutes `{{glossary_context}}` then `{{slot}}` into `template`.
#[must_use]
pub fn build_prompt(template: &str, glossary_context: &str, chunk_text: &str) -> String {
    template
        .replace(GLOSSARY_PLACEHOLDER, glossary_context)
        .replace(SLOT_PLACEHOLDER, chunk_text)
}
