/*!
 * Segment model.
 *
 * A segment is one translatable fragment handed over by the document
 * collaborator. Its key is a hash of the normalized source text, both
 * languages and an optional context tag, so that two segments with the same
 * key are interchangeable: translating one satisfies all of them.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::language_utils::normalize_language_code;

/// Separator between hashed fields, never part of normalized text
const FIELD_SEPARATOR: char = '\u{1f}';

/// Whitespace runs (including the exotic spaces layout tools emit)
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid segment regex"));

/// Patterns for fragments that are never sent for translation
static EXCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Numbers only, with separators
        Regex::new(r"^[\d\s.,:/%+\-]+$").expect("Invalid segment regex"),
        // Punctuation and symbols only
        Regex::new(r"^[^\p{L}\p{N}]+$").expect("Invalid segment regex"),
        // Codes and identifiers
        Regex::new(r"^[A-Z0-9_]+[0-9_][A-Z0-9_]*$").expect("Invalid segment regex"),
        // URLs
        Regex::new(r"^(?i)(https?://|www\.)\S+$").expect("Invalid segment regex"),
        // E-mail addresses
        Regex::new(r"^[\w.+\-]+@[\w\-]+\.[\w.\-]+$").expect("Invalid segment regex"),
    ]
});

/// Raw fragment as produced by the document reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Document the fragment belongs to
    pub document_id: String,
    /// Opaque structural location, returned untouched on reinsertion
    pub location_ref: String,
    /// Text content
    pub text: String,
    /// Whether the reader considers the fragment translatable
    pub translatable: bool,
}

impl RawSegment {
    /// Create a translatable raw segment
    pub fn new(document_id: &str, location_ref: &str, text: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            location_ref: location_ref.to_string(),
            text: text.to_string(),
            translatable: true,
        }
    }

    /// Mark the fragment as not translatable
    pub fn locked(mut self) -> Self {
        self.translatable = false;
        self
    }
}

/// Translated text to write back at a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reinsertion {
    /// Location from the originating raw segment
    pub location_ref: String,
    /// Text to write at that location
    pub translated_text: String,
}

/// Where a segment came from, opaque to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentContext {
    /// Document identifier
    pub document_id: String,
    /// Structural location inside the document
    pub location_ref: String,
}

/// Stable segment identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey(String);

impl SegmentKey {
    /// Compute the key of a segment
    pub fn compute(
        normalized_text: &str,
        source_language: &str,
        target_language: &str,
        context_tag: Option<&str>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(normalize_language_code(source_language).as_bytes());
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(normalize_language_code(target_language).as_bytes());
        if let Some(tag) = context_tag {
            hasher.update([FIELD_SEPARATOR as u8]);
            hasher.update(tag.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Translation memory key for a (text, source, target) tuple
///
/// Unlike [`SegmentKey`] it ignores the context tag: the memory holds one
/// entry per language pair and normalized text.
pub fn memory_key(source_text: &str, source_language: &str, target_language: &str) -> String {
    SegmentKey::compute(
        &normalize_text(source_text),
        source_language,
        target_language,
        None,
    )
    .0
}

/// Normalize source text for keying and fuzzy indexing
///
/// Trims, maps exotic spaces and line separators to plain spaces, drops
/// formatting-only characters (soft hyphen, zero-width characters, BOM) and
/// collapses whitespace runs. Case and punctuation are kept.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => None,
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\u{2028}' | '\u{2029}' => Some(' '),
            other => Some(other),
        })
        .collect();

    WHITESPACE_RUN.replace_all(cleaned.trim(), " ").into_owned()
}

/// Whether a fragment's text is worth sending for translation
pub fn is_translatable_text(text: &str, min_length: usize) -> bool {
    let normalized = normalize_text(text);
    if normalized.chars().count() < min_length {
        return false;
    }
    !EXCLUDE_PATTERNS.iter().any(|p| p.is_match(&normalized))
}

/// One translatable fragment with its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Identity key
    pub key: SegmentKey,
    /// Original text, as it appears in the document
    pub source_text: String,
    /// Normalized text used for keys and similarity
    pub normalized_text: String,
    /// Source language (normalized code)
    pub source_language: String,
    /// Target language (normalized code)
    pub target_language: String,
    /// Optional disambiguation tag that takes part in the key
    pub context_tag: Option<String>,
    /// Origin of the fragment
    pub context: SegmentContext,
}

impl Segment {
    /// Build a segment from its parts
    pub fn new(
        source_text: &str,
        source_language: &str,
        target_language: &str,
        context_tag: Option<&str>,
        context: SegmentContext,
    ) -> Self {
        let normalized_text = normalize_text(source_text);
        let key = SegmentKey::compute(&normalized_text, source_language, target_language, context_tag);

        Self {
            key,
            source_text: source_text.to_string(),
            normalized_text,
            source_language: normalize_language_code(source_language),
            target_language: normalize_language_code(target_language),
            context_tag: context_tag.map(|t| t.to_string()),
            context,
        }
    }

    /// Build a segment from a raw fragment
    pub fn from_raw(
        raw: &RawSegment,
        source_language: &str,
        target_language: &str,
        context_tag: Option<&str>,
    ) -> Self {
        Self::new(
            &raw.text,
            source_language,
            target_language,
            context_tag,
            SegmentContext {
                document_id: raw.document_id.clone(),
                location_ref: raw.location_ref.clone(),
            },
        )
    }

    /// Memory key of this segment's (text, source, target) tuple
    pub fn memory_key(&self) -> String {
        SegmentKey::compute(
            &self.normalized_text,
            &self.source_language,
            &self.target_language,
            None,
        )
        .0
    }
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
