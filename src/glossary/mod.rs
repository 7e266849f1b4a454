/*!
 * Terminology table.
 *
 * Preferred translations per (term, target language), in two scopes:
 * - global entries, optionally persisted, live across batches
 * - batch entries shadow global ones and are dropped at the end of a batch
 *   unless promoted
 *
 * Terms match case-insensitively on whole words. Replacing a preferred
 * translation keeps the previous value in the entry's history, and the
 * consistency checker uses that history to find outdated renderings in
 * translated text.
 *
 * The glossary also owns the user-defined consistency rules, persisted next
 * to the global terms.
 */

pub mod custom_rules;
pub mod extraction;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::database::Repository;
use crate::database::models::{GlossaryRecord, parse_timestamp};
use crate::errors::EngineError;
use crate::language_utils::normalize_language_code;
use crate::segment::normalize_text;

pub use custom_rules::{CustomRule, CustomRuleKind};
pub use extraction::{ExtractionConfig, TermExtractor};

use custom_rules::CustomRuleSet;

/// Compiled term patterns, keyed by normalized term
static TERM_PATTERNS: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

/// Cached patterns beyond this count are dropped wholesale
const TERM_PATTERN_CACHE_LIMIT: usize = 10_000;

/// Case-insensitive pattern for a normalized term, compiled once
fn term_pattern(term: &str) -> Option<Regex> {
    if let Some(re) = TERM_PATTERNS.get(term) {
        return Some(re.value().clone());
    }

    let re = Regex::new(&format!("(?i){}", regex::escape(term))).ok()?;
    if TERM_PATTERNS.len() >= TERM_PATTERN_CACHE_LIMIT {
        TERM_PATTERNS.clear();
    }
    TERM_PATTERNS.insert(term.to_string(), re.clone());
    Some(re)
}

/// Scope of a glossary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlossaryScope {
    /// Lives across batches
    Global,
    /// Lives for the current batch only
    Batch,
}

impl fmt::Display for GlossaryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlossaryScope::Global => write!(f, "global"),
            GlossaryScope::Batch => write!(f, "batch"),
        }
    }
}

/// A replaced preferred translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryRevision {
    /// Value before the change
    pub previous: String,
    /// When it was replaced
    pub replaced_at: DateTime<Utc>,
}

/// One terminology entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Source term as first written
    pub term: String,
    /// Target language (normalized code)
    pub target_language: String,
    /// Preferred translation
    pub preferred_translation: String,
    /// Scope of the entry
    pub scope: GlossaryScope,
    /// Do-not-translate term (translation equals the term)
    pub protected: bool,
    /// Prior values, oldest first
    pub history: Vec<GlossaryRevision>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GlossaryKey {
    term: String,
    language: String,
    scope: GlossaryScope,
}

impl GlossaryKey {
    fn new(term: &str, language: &str, scope: GlossaryScope) -> Self {
        Self {
            term: fold_term(term),
            language: normalize_language_code(language),
            scope,
        }
    }

    /// Key used by the persisted table
    fn storage_key(&self) -> String {
        format!("{}|{}", self.term, self.language)
    }
}

/// Case-folded, whitespace-normalized term
fn fold_term(term: &str) -> String {
    normalize_text(term).to_lowercase()
}

/// Byte ranges of whole-word, case-insensitive occurrences of `term`
///
/// A match must not be preceded or followed by a letter or digit, so "Tax"
/// is found in "Tax, total" but not in "Taxonomy".
pub fn find_term_spans(text: &str, term: &str) -> Vec<(usize, usize)> {
    let term = normalize_text(term);
    if term.is_empty() {
        return Vec::new();
    }

    let Some(re) = term_pattern(&term) else {
        return Vec::new();
    };

    re.find_iter(text)
        .filter(|m| {
            let before_ok = text[..m.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
            let after_ok = text[m.end()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
            before_ok && after_ok
        })
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Whether `text` contains `term` as a whole word
pub fn contains_term(text: &str, term: &str) -> bool {
    !find_term_spans(text, term).is_empty()
}

/// Shared terminology table
pub struct Glossary {
    entries: DashMap<GlossaryKey, GlossaryEntry>,
    custom_rules: CustomRuleSet,
    repository: Option<Repository>,
}

impl fmt::Debug for Glossary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Glossary")
            .field("entries", &self.entries.len())
            .field("custom_rules", &self.custom_rules.len())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

impl Default for Glossary {
    fn default() -> Self {
        Self::new()
    }
}

impl Glossary {
    /// Create an empty, non-persistent glossary
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            custom_rules: CustomRuleSet::default(),
            repository: None,
        }
    }

    /// Open a glossary whose global scope is persisted in the repository
    pub fn open(repository: Repository) -> Result<Self, EngineError> {
        let records = repository.load_glossary_terms()?;
        let revisions = repository.load_glossary_revisions()?;
        let custom_rules = CustomRuleSet::from_records(&repository.load_consistency_rules()?);

        let mut history: HashMap<String, Vec<GlossaryRevision>> = HashMap::new();
        for revision in revisions {
            history
                .entry(revision.term_key)
                .or_default()
                .push(GlossaryRevision {
                    previous: revision.previous_translation,
                    replaced_at: parse_timestamp(&revision.replaced_at),
                });
        }

        let entries = DashMap::new();
        for record in records {
            let key = GlossaryKey::new(&record.term, &record.target_language, GlossaryScope::Global);
            let entry = GlossaryEntry {
                history: history.remove(&record.term_key).unwrap_or_default(),
                term: record.term,
                target_language: key.language.clone(),
                preferred_translation: record.translation,
                scope: GlossaryScope::Global,
                protected: record.protected,
            };
            entries.insert(key, entry);
        }

        info!(
            "Glossary opened with {} global terms and {} consistency rules",
            entries.len(),
            custom_rules.len()
        );
        Ok(Self {
            entries,
            custom_rules,
            repository: Some(repository),
        })
    }

    /// Number of entries across both scopes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the glossary is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effective entry for a term: batch scope first, then global
    pub fn lookup(&self, term: &str, target_language: &str) -> Option<GlossaryEntry> {
        [GlossaryScope::Batch, GlossaryScope::Global]
            .into_iter()
            .find_map(|scope| {
                self.entries
                    .get(&GlossaryKey::new(term, target_language, scope))
                    .map(|e| e.value().clone())
            })
    }

    /// Preferred translation of a term
    pub fn suggest(&self, term: &str, target_language: &str) -> Option<String> {
        self.lookup(term, target_language)
            .map(|e| e.preferred_translation)
    }

    /// Insert or update an entry
    ///
    /// Returns the replaced translation, if any. A changed value is appended
    /// to the entry's history. Global entries are written through to the
    /// repository; the in-memory update stands even if that write fails.
    pub fn record(
        &self,
        term: &str,
        target_language: &str,
        translation: &str,
        scope: GlossaryScope,
    ) -> Result<Option<String>, EngineError> {
        self.upsert(term, target_language, translation, scope, false)
    }

    /// Mark a term as do-not-translate for a language
    pub fn protect(&self, term: &str, target_language: &str) -> Result<(), EngineError> {
        let term = normalize_text(term);
        self.upsert(&term, target_language, &term, GlossaryScope::Global, true)
            .map(|_| ())
    }

    fn upsert(
        &self,
        term: &str,
        target_language: &str,
        translation: &str,
        scope: GlossaryScope,
        protected: bool,
    ) -> Result<Option<String>, EngineError> {
        let key = GlossaryKey::new(term, target_language, scope);
        let translation = translation.trim().to_string();

        let (entry, previous) = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                let previous = if existing.preferred_translation != translation {
                    let previous = std::mem::replace(
                        &mut existing.preferred_translation,
                        translation.clone(),
                    );
                    existing.history.push(GlossaryRevision {
                        previous: previous.clone(),
                        replaced_at: Utc::now(),
                    });
                    debug!(
                        "Glossary term '{}' ({}) changed from '{}' to '{}'",
                        existing.term, key.language, previous, translation
                    );
                    Some(previous)
                } else {
                    None
                };
                existing.protected = protected;
                (existing.clone(), previous)
            }
            Entry::Vacant(vacant) => {
                let entry = GlossaryEntry {
                    term: normalize_text(term),
                    target_language: key.language.clone(),
                    preferred_translation: translation.clone(),
                    scope,
                    protected,
                    history: Vec::new(),
                };
                vacant.insert(entry.clone());
                (entry, None)
            }
        };

        if scope == GlossaryScope::Global {
            self.persist(&key, &entry, previous.as_deref())?;
        }

        Ok(previous)
    }

    /// Record a batch-scope entry only if the term has no entry in any scope
    ///
    /// Returns true when the entry was created. Concurrent seeders of the
    /// same term race on a single map slot, so the first translation wins.
    pub fn record_if_absent(&self, term: &str, target_language: &str, translation: &str) -> bool {
        if self
            .entries
            .contains_key(&GlossaryKey::new(term, target_language, GlossaryScope::Global))
        {
            return false;
        }

        let key = GlossaryKey::new(term, target_language, GlossaryScope::Batch);
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(GlossaryEntry {
                    term: normalize_text(term),
                    target_language: key.language,
                    preferred_translation: translation.trim().to_string(),
                    scope: GlossaryScope::Batch,
                    protected: false,
                    history: Vec::new(),
                });
                true
            }
        }
    }

    fn persist(
        &self,
        key: &GlossaryKey,
        entry: &GlossaryEntry,
        previous: Option<&str>,
    ) -> Result<(), EngineError> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };

        let mut record = GlossaryRecord::new(
            &key.storage_key(),
            &entry.term,
            &entry.target_language,
            &entry.preferred_translation,
        );
        record.protected = entry.protected;

        repository.upsert_glossary_term(&record, previous).map_err(|e| {
            warn!("Failed to persist glossary term '{}': {:#}", entry.term, e);
            EngineError::Persistence(format!("{:#}", e))
        })
    }

    /// Whether a term is do-not-translate for a language
    pub fn is_protected(&self, term: &str, target_language: &str) -> bool {
        self.lookup(term, target_language)
            .is_some_and(|e| e.protected)
    }

    /// Move a batch entry to the global scope
    ///
    /// Returns false when the term has no batch entry.
    pub fn promote(&self, term: &str, target_language: &str) -> Result<bool, EngineError> {
        let Some((_, entry)) = self
            .entries
            .remove(&GlossaryKey::new(term, target_language, GlossaryScope::Batch))
        else {
            return Ok(false);
        };

        self.upsert(
            &entry.term,
            &entry.target_language,
            &entry.preferred_translation,
            GlossaryScope::Global,
            entry.protected,
        )?;
        Ok(true)
    }

    /// Promote every batch entry, returning how many moved
    pub fn promote_all(&self) -> Result<usize, EngineError> {
        let batch_terms: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| e.key().scope == GlossaryScope::Batch)
            .map(|e| (e.value().term.clone(), e.value().target_language.clone()))
            .collect();

        let mut promoted = 0;
        for (term, language) in batch_terms {
            if self.promote(&term, &language)? {
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Drop every batch entry, returning how many were removed
    pub fn clear_batch_scope(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.scope != GlossaryScope::Batch);
        let removed = before.saturating_sub(self.entries.len());
        debug!("Cleared {} batch glossary entries", removed);
        removed
    }

    /// Effective entries of a language, sorted by term
    pub fn entries_for(&self, target_language: &str) -> Vec<GlossaryEntry> {
        let language = normalize_language_code(target_language);
        let mut effective: HashMap<String, GlossaryEntry> = HashMap::new();

        for item in self.entries.iter() {
            let key = item.key();
            if key.language != language {
                continue;
            }
            let shadowed = key.scope == GlossaryScope::Global
                && effective
                    .get(&key.term)
                    .is_some_and(|e| e.scope == GlossaryScope::Batch);
            if !shadowed {
                effective.insert(key.term.clone(), item.value().clone());
            }
        }

        let mut entries: Vec<GlossaryEntry> = effective.into_values().collect();
        entries.sort_by(|a, b| a.term.to_lowercase().cmp(&b.term.to_lowercase()));
        entries
    }

    /// Effective entries whose term occurs in `text`
    ///
    /// Longer terms come first so that callers replacing text handle
    /// "Total amount" before "Total".
    pub fn terms_in(&self, text: &str, target_language: &str) -> Vec<GlossaryEntry> {
        let mut found: Vec<GlossaryEntry> = self
            .entries_for(target_language)
            .into_iter()
            .filter(|e| contains_term(text, &e.term))
            .collect();

        found.sort_by(|a, b| {
            b.term
                .chars()
                .count()
                .cmp(&a.term.chars().count())
                .then_with(|| a.term.cmp(&b.term))
        });
        found
    }

    /// Translations a term has had besides its preferred one
    ///
    /// Includes the shadowed global value and every historical value of
    /// both scopes.
    pub fn known_variants(&self, term: &str, target_language: &str) -> Vec<String> {
        let Some(preferred) = self.suggest(term, target_language) else {
            return Vec::new();
        };

        let mut variants: Vec<String> = Vec::new();
        for scope in [GlossaryScope::Batch, GlossaryScope::Global] {
            if let Some(entry) = self.entries.get(&GlossaryKey::new(term, target_language, scope)) {
                let candidates = std::iter::once(entry.preferred_translation.clone())
                    .chain(entry.history.iter().map(|r| r.previous.clone()));
                for candidate in candidates {
                    if candidate != preferred && !candidate.is_empty() && !variants.contains(&candidate) {
                        variants.push(candidate);
                    }
                }
            }
        }
        variants
    }

    /// Glossary hints for a provider request: (term, preferred translation)
    pub fn hints_for(&self, text: &str, target_language: &str) -> Vec<(String, String)> {
        self.terms_in(text, target_language)
            .into_iter()
            .map(|e| (e.term, e.preferred_translation))
            .collect()
    }

    /// Note asking the provider to keep protected terms unchanged
    pub fn protection_note(&self, text: &str, target_language: &str) -> Option<String> {
        let protected: Vec<String> = self
            .terms_in(text, target_language)
            .into_iter()
            .filter(|e| e.protected)
            .map(|e| e.term)
            .collect();

        if protected.is_empty() {
            None
        } else {
            Some(format!("Keep these terms unchanged: {}", protected.join(", ")))
        }
    }

    /// Add a consistency rule for a target language, returning its id
    ///
    /// The pattern is compiled before anything is stored. On a persistent
    /// glossary the rule is written first and takes its row id.
    pub fn add_custom_rule(
        &self,
        pattern: &str,
        replacement: &str,
        target_language: &str,
        kind: CustomRuleKind,
        description: Option<&str>,
    ) -> Result<i64, EngineError> {
        let rule = CustomRule::new(pattern, replacement, target_language, kind, description)?;

        let persisted_id = match &self.repository {
            Some(repository) => Some(
                repository
                    .insert_consistency_rule(&CustomRuleSet::record_of(&rule))
                    .map_err(|e| EngineError::Persistence(format!("{:#}", e)))?,
            ),
            None => None,
        };

        Ok(self.custom_rules.push(rule, persisted_id))
    }

    /// Switch a consistency rule on or off; false when the id is unknown
    pub fn set_custom_rule_active(&self, id: i64, active: bool) -> Result<bool, EngineError> {
        if !self.custom_rules.set_active(id, active) {
            return Ok(false);
        }
        if let Some(repository) = &self.repository {
            repository
                .set_consistency_rule_active(id, active)
                .map_err(|e| EngineError::Persistence(format!("{:#}", e)))?;
        }
        Ok(true)
    }

    /// Active consistency rules of a language, in the order they were added
    pub fn custom_rules_for(&self, target_language: &str, kind: Option<CustomRuleKind>) -> Vec<CustomRule> {
        self.custom_rules.active_for(target_language, kind)
    }

    /// Load do-not-translate terms from a plain-text list
    ///
    /// One term per line, optionally prefixed by a category
    /// (`product:Myriad`, `technical:EPDM`). Blank lines and lines starting
    /// with `#` are ignored. Returns the number of protected terms.
    pub fn load_protected_list(&self, contents: &str, target_language: &str) -> Result<usize, EngineError> {
        let mut loaded = 0;

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let term = match line.split_once(':') {
                Some((category, term)) => {
                    let category = category.trim().to_lowercase();
                    if !matches!(
                        category.as_str(),
                        "product" | "technical" | "material" | "certification" | "professional"
                    ) {
                        warn!("Unknown term category '{}' on line {}", category, line_num + 1);
                        continue;
                    }
                    term.trim()
                }
                None => line,
            };

            if term.is_empty() {
                continue;
            }
            self.protect(term, target_language)?;
            loaded += 1;
        }

        info!("Loaded {} protected terms", loaded);
        Ok(loaded)
    }
}
