/*!
 * User-defined consistency rules.
 *
 * A rule is a regular expression and its replacement, scoped to one target
 * language. Rules are applied by the consistency checker after the built-in
 * formatting fixes, in the order they were added. Inactive rules stay in the
 * set and in the database but are skipped.
 */

use chrono::Utc;
use log::{debug, warn};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::models::ConsistencyRuleRecord;
use crate::errors::EngineError;
use crate::language_utils::normalize_language_code;

/// Category of a user-defined rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomRuleKind {
    Punctuation,
    Capitalization,
    Formatting,
    Terminology,
}

impl CustomRuleKind {
    /// Name stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomRuleKind::Punctuation => "punctuation",
            CustomRuleKind::Capitalization => "capitalization",
            CustomRuleKind::Formatting => "formatting",
            CustomRuleKind::Terminology => "terminology",
        }
    }
}

impl fmt::Display for CustomRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CustomRuleKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "punctuation" => Ok(CustomRuleKind::Punctuation),
            "capitalization" => Ok(CustomRuleKind::Capitalization),
            "formatting" => Ok(CustomRuleKind::Formatting),
            "terminology" => Ok(CustomRuleKind::Terminology),
            other => Err(EngineError::InvalidRule(format!("unknown rule kind '{}'", other))),
        }
    }
}

/// A compiled rewrite rule
#[derive(Debug, Clone)]
pub struct CustomRule {
    /// Row id for persisted rules, a negative sequence number otherwise
    pub id: i64,
    /// Target language (normalized code)
    pub target_language: String,
    /// Category
    pub kind: CustomRuleKind,
    /// Replacement, may reference capture groups as `$1`
    pub replacement: String,
    /// Optional description shown in issues
    pub description: Option<String>,
    /// Whether the checker applies the rule
    pub active: bool,
    regex: Regex,
}

impl CustomRule {
    /// Compile a rule
    pub fn new(
        pattern: &str,
        replacement: &str,
        target_language: &str,
        kind: CustomRuleKind,
        description: Option<&str>,
    ) -> Result<Self, EngineError> {
        let regex = Regex::new(pattern)
            .map_err(|e| EngineError::InvalidRule(format!("pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            id: 0,
            target_language: normalize_language_code(target_language),
            kind,
            replacement: replacement.to_string(),
            description: description.map(str::to_string),
            active: true,
            regex,
        })
    }

    /// Regular expression source
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Rewritten text, or `None` when the pattern does not match
    pub fn apply(&self, text: &str) -> Option<String> {
        if !self.regex.is_match(text) {
            return None;
        }
        let rewritten = self.regex.replace_all(text, self.replacement.as_str()).into_owned();
        (rewritten != text).then_some(rewritten)
    }

    /// Human-readable label for issues
    pub fn label(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("{} rule '{}'", self.kind, self.pattern()),
        }
    }

    fn to_record(&self) -> ConsistencyRuleRecord {
        ConsistencyRuleRecord {
            id: self.id,
            pattern: self.pattern().to_string(),
            replacement: self.replacement.clone(),
            target_language: self.target_language.clone(),
            rule_kind: self.kind.as_str().to_string(),
            description: self.description.clone(),
            active: self.active,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn from_record(record: &ConsistencyRuleRecord) -> Result<Self, EngineError> {
        let mut rule = Self::new(
            &record.pattern,
            &record.replacement,
            &record.target_language,
            record.rule_kind.parse()?,
            record.description.as_deref(),
        )?;
        rule.id = record.id;
        rule.active = record.active;
        Ok(rule)
    }
}

/// Ordered set of rules shared by the glossary and the checker
#[derive(Debug, Default)]
pub(crate) struct CustomRuleSet {
    rules: RwLock<Vec<CustomRule>>,
}

impl CustomRuleSet {
    /// Rebuild from stored rows, skipping rows that no longer compile
    pub(crate) fn from_records(records: &[ConsistencyRuleRecord]) -> Self {
        let rules = records
            .iter()
            .filter_map(|record| match CustomRule::from_record(record) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping stored consistency rule {}: {}", record.id, e);
                    None
                }
            })
            .collect();
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Stored form of a rule about to be inserted
    pub(crate) fn record_of(rule: &CustomRule) -> ConsistencyRuleRecord {
        rule.to_record()
    }

    /// Append a rule; unpersisted rules get negative ids
    pub(crate) fn push(&self, mut rule: CustomRule, persisted_id: Option<i64>) -> i64 {
        let mut rules = self.rules.write();
        rule.id = persisted_id.unwrap_or(-(rules.len() as i64) - 1);
        debug!(
            "Added {} rule {} for '{}'",
            rule.kind,
            rule.id,
            rule.target_language
        );
        let id = rule.id;
        rules.push(rule);
        id
    }

    /// Switch a rule on or off; false when the id is unknown
    pub(crate) fn set_active(&self, id: i64, active: bool) -> bool {
        match self.rules.write().iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.active = active;
                true
            }
            None => false,
        }
    }

    /// Active rules of a language, optionally of one kind, in insertion order
    pub(crate) fn active_for(&self, target_language: &str, kind: Option<CustomRuleKind>) -> Vec<CustomRule> {
        let language = normalize_language_code(target_language);
        self.rules
            .read()
            .iter()
            .filter(|r| r.active && r.target_language == language)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.read().len()
    }
}
