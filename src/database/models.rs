/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data. Timestamps are stored as RFC 3339
 * strings.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parse a stored RFC 3339 timestamp, falling back to the Unix epoch
///
/// Rows written by older tools may carry an empty or malformed date; those
/// sort as oldest instead of failing the whole load.
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Translation memory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmRecord {
    /// Hash of normalized text and both languages
    pub entry_key: String,
    /// Source text as first recorded
    pub source_text: String,
    /// Stored translation
    pub target_text: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Normalized source text used for fuzzy matching
    pub normalized_form: String,
    /// Number of times the entry was recorded or hit
    pub usage_count: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last time the entry was used
    pub last_used_at: String,
}

/// Persisted global glossary term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryRecord {
    /// Lowercased term and target language
    pub term_key: String,
    /// Term as first written
    pub term: String,
    /// Target language code
    pub target_language: String,
    /// Preferred translation
    pub translation: String,
    /// Do-not-translate term
    pub protected: bool,
    /// Last update timestamp
    pub updated_at: String,
}

impl GlossaryRecord {
    /// Create a record stamped with the current time
    pub fn new(term_key: &str, term: &str, target_language: &str, translation: &str) -> Self {
        Self {
            term_key: term_key.to_string(),
            term: term.to_string(),
            target_language: target_language.to_string(),
            translation: translation.to_string(),
            protected: false,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Prior value of a glossary term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryRevisionRecord {
    /// Term the revision belongs to
    pub term_key: String,
    /// Translation that was replaced
    pub previous_translation: String,
    /// When it was replaced
    pub replaced_at: String,
}

/// Persisted user-defined consistency rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRuleRecord {
    /// Row id, zero before insertion
    pub id: i64,
    /// Regular expression searched in translated text
    pub pattern: String,
    /// Replacement, may reference capture groups as `$1`
    pub replacement: String,
    /// Target language code the rule applies to
    pub target_language: String,
    /// Rule category
    pub rule_kind: String,
    /// Optional description shown in issues
    pub description: Option<String>,
    /// Inactive rules are kept but not applied
    pub active: bool,
    /// Creation timestamp
    pub created_at: String,
}

/// Aggregate figures for the translation memory table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmTableStats {
    /// Number of stored entries
    pub total_entries: i64,
    /// Sum of all usage counters
    pub total_usage: i64,
    /// Number of distinct language pairs
    pub language_pairs: i64,
}
