/*!
 * Consistency checking of translated segments.
 *
 * Every translation, whatever its origin, passes through the checker before
 * it is returned:
 * - Terminology: glossary terms must use their preferred translation
 * - Numbers: values and units of the source must survive translation
 * - Formatting: decimal separators, quotes, capitalization, whitespace
 * - Custom rules: user-defined rewrites kept with the glossary
 * - Length: expansion beyond what the target language usually needs
 *
 * Issues are annotations. Deterministic fixes are applied when auto-correct
 * is on; numeric problems are never corrected.
 *
 * # Architecture
 *
 * - `rules`: per-language conventions and the rewrite rules
 * - `numeric`: number extraction and value comparison
 */

pub mod numeric;
pub mod rules;

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::errors::EngineError;
use crate::glossary::{CustomRuleKind, Glossary, contains_term, find_term_spans};
use crate::segment::{Segment, SegmentKey, normalize_text, truncate_text};

pub use numeric::{NumericCheck, compare_numbers};
pub use rules::{DecimalStyle, LanguageRules, rules_for};

/// Configuration for consistency checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Apply deterministic fixes instead of only reporting them
    #[serde(default = "default_true")]
    pub auto_correct: bool,

    /// Check glossary terminology
    #[serde(default = "default_true")]
    pub check_terminology: bool,

    /// Check that numbers survive translation
    #[serde(default = "default_true")]
    pub check_numbers: bool,

    /// Check target-language formatting conventions
    #[serde(default = "default_true")]
    pub check_formatting: bool,

    /// Mirror the source's initial capitalization
    #[serde(default = "default_true")]
    pub fix_capitalization: bool,

    /// Apply the glossary's user-defined rules for the target language
    #[serde(default = "default_true")]
    pub apply_custom_rules: bool,

    /// Check translation length against the language's expansion factor
    #[serde(default = "default_true")]
    pub check_length: bool,

    /// Sources shorter than this are not length-checked
    #[serde(default = "default_min_length_check_chars")]
    pub min_length_check_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_min_length_check_chars() -> usize {
    20
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            auto_correct: true,
            check_terminology: true,
            check_numbers: true,
            check_formatting: true,
            fix_capitalization: true,
            apply_custom_rules: true,
            check_length: true,
            min_length_check_chars: default_min_length_check_chars(),
        }
    }
}

impl ConsistencyConfig {
    /// Report everything, fix nothing.
    pub fn report_only() -> Self {
        Self {
            auto_correct: false,
            ..Self::default()
        }
    }
}

/// Category of a consistency issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Glossary term not translated as preferred
    TerminologyMismatch,
    /// Target-language formatting convention not followed
    FormattingViolation,
    /// Number lost, changed or reordered
    NumericMismatch,
    /// Translation unusually long or short
    LengthExpansion,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueType::TerminologyMismatch => "Terminology mismatch",
            IssueType::FormattingViolation => "Formatting violation",
            IssueType::NumericMismatch => "Numeric mismatch",
            IssueType::LengthExpansion => "Length expansion",
        };
        write!(f, "{}", name)
    }
}

/// Severity of a consistency issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One finding about a translated segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    /// Segment the issue belongs to
    pub segment_key: SegmentKey,
    /// Category
    pub issue_type: IssueType,
    /// Replacement text or value, when one is known
    pub suggested_fix: Option<String>,
    /// How serious the issue is
    pub severity: Severity,
    /// Whether the fix was already applied to the returned text
    pub auto_fixed: bool,
    /// Human-readable description
    pub message: String,
}

impl ConsistencyIssue {
    fn new(segment: &Segment, issue_type: IssueType, severity: Severity, message: String) -> Self {
        Self {
            segment_key: segment.key.clone(),
            issue_type,
            suggested_fix: None,
            severity,
            auto_fixed: false,
            message,
        }
    }

    fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    fn fixed(mut self) -> Self {
        self.auto_fixed = true;
        self.severity = Severity::Info;
        self
    }

    /// The issue as an engine error
    pub fn to_violation(&self) -> EngineError {
        EngineError::ConsistencyViolation {
            segment_key: self.segment_key.to_string(),
            message: self.message.clone(),
        }
    }
}

/// Checked translation with its findings
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Translation after auto-corrections
    pub corrected_text: String,
    /// Findings, fixed ones included
    pub issues: Vec<ConsistencyIssue>,
}

impl CheckOutcome {
    /// Whether any fix changed the text
    pub fn was_corrected(&self) -> bool {
        self.issues.iter().any(|i| i.auto_fixed)
    }
}

/// Checks translations against the glossary and language rules
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    config: ConsistencyConfig,
    glossary: Arc<Glossary>,
}

impl ConsistencyChecker {
    /// Create a checker over a shared glossary
    pub fn new(config: ConsistencyConfig, glossary: Arc<Glossary>) -> Self {
        Self { config, glossary }
    }

    /// Checker configuration
    pub fn config(&self) -> &ConsistencyConfig {
        &self.config
    }

    /// Check one translated segment
    pub fn check(&self, segment: &Segment, translated: &str) -> CheckOutcome {
        let mut text = translated.to_string();
        let mut issues = Vec::new();

        if self.config.check_terminology {
            self.check_terminology(segment, &mut text, &mut issues);
        }

        if self.config.check_formatting {
            self.check_formatting(segment, &mut text, &mut issues);
        }

        if self.config.apply_custom_rules {
            self.apply_custom_rules(segment, &mut text, &mut issues);
        }

        if self.config.check_numbers {
            Self::check_numbers(segment, &text, &mut issues);
        }

        if self.config.check_length {
            self.check_length(segment, &text, &mut issues);
        }

        if !issues.is_empty() {
            debug!(
                "Segment '{}': {} consistency issue(s)",
                truncate_text(&segment.normalized_text, 40),
                issues.len()
            );
        }

        CheckOutcome {
            corrected_text: text,
            issues,
        }
    }

    fn check_terminology(&self, segment: &Segment, text: &mut String, issues: &mut Vec<ConsistencyIssue>) {
        let language = &segment.target_language;

        for entry in self.glossary.terms_in(&segment.normalized_text, language) {
            let preferred = &entry.preferred_translation;
            if preferred.is_empty() || contains_term(text, preferred) {
                continue;
            }

            let message = if entry.protected {
                format!("Protected term '{}' was not kept unchanged", entry.term)
            } else {
                format!("Term '{}' should be translated as '{}'", entry.term, preferred)
            };
            let issue = ConsistencyIssue::new(segment, IssueType::TerminologyMismatch, Severity::Warning, message)
                .with_fix(preferred.clone());

            if !self.config.auto_correct {
                issues.push(issue);
                continue;
            }

            match self.replace_term(segment, text, &entry.term, preferred) {
                Some(fixed) => {
                    debug!("Corrected term '{}' to '{}'", entry.term, preferred);
                    *text = fixed;
                    issues.push(issue.fixed());
                }
                None => issues.push(issue),
            }
        }
    }

    /// Put the preferred translation in place of a wrong rendering
    ///
    /// A segment that is the term itself is replaced as a whole. Otherwise a
    /// known variant or the untranslated term is replaced where it occurs.
    fn replace_term(&self, segment: &Segment, text: &str, term: &str, preferred: &str) -> Option<String> {
        if normalize_text(&segment.normalized_text).to_lowercase() == normalize_text(term).to_lowercase() {
            let leading = &text[..text.len() - text.trim_start().len()];
            let trailing = &text[text.trim_end().len()..];
            return Some(format!("{}{}{}", leading, preferred, trailing));
        }

        let mut candidates = self.glossary.known_variants(term, &segment.target_language);
        candidates.push(term.to_string());
        candidates.sort_by_key(|c| std::cmp::Reverse(c.chars().count()));

        for candidate in candidates {
            let spans = find_term_spans(text, &candidate);
            if spans.is_empty() {
                continue;
            }

            let mut fixed = text.to_string();
            for (start, end) in spans.into_iter().rev() {
                let replacement = mirror_initial_case(&text[start..end], preferred);
                fixed.replace_range(start..end, &replacement);
            }
            return Some(fixed);
        }

        None
    }

    fn check_formatting(&self, segment: &Segment, text: &mut String, issues: &mut Vec<ConsistencyIssue>) {
        let rules = rules_for(&segment.target_language);
        let language = &segment.target_language;

        let mut apply = |fixed: Option<String>, text: &mut String, message: String| {
            let Some(fixed) = fixed else {
                return;
            };
            let issue = ConsistencyIssue::new(segment, IssueType::FormattingViolation, Severity::Warning, message)
                .with_fix(fixed.clone());
            if self.config.auto_correct {
                *text = fixed;
                issues.push(issue.fixed());
            } else {
                issues.push(issue);
            }
        };

        apply(
            rules::clean_whitespace(&segment.source_text, text, &rules),
            text,
            "Whitespace normalized".to_string(),
        );
        apply(
            rules::fix_decimal_separators(text, &rules),
            text,
            format!("Decimal separators adapted to '{}'", language),
        );
        apply(
            rules::fix_quotes(text, &rules),
            text,
            format!("Quotation marks adapted to '{}'", language),
        );
        if self.config.fix_capitalization {
            apply(
                rules::fix_capitalization(&segment.source_text, text, &rules),
                text,
                "Initial capitalization aligned with the source".to_string(),
            );
        }

        // Structural checks are reported, never fixed
        let source_open = segment.source_text.matches('(').count();
        let source_close = segment.source_text.matches(')').count();
        let target_open = text.matches('(').count();
        let target_close = text.matches(')').count();
        if source_open == source_close && target_open != target_close {
            issues.push(ConsistencyIssue::new(
                segment,
                IssueType::FormattingViolation,
                Severity::Warning,
                format!("Unbalanced parentheses: {} '(' and {} ')'", target_open, target_close),
            ));
        }

        let source_bullets = count_bullets(&segment.source_text);
        let target_bullets = count_bullets(text);
        if source_bullets != target_bullets {
            issues.push(ConsistencyIssue::new(
                segment,
                IssueType::FormattingViolation,
                Severity::Warning,
                format!("Bullet count changed from {} to {}", source_bullets, target_bullets),
            ));
        }
    }

    /// Rules run in insertion order, each on the output of the previous one
    fn apply_custom_rules(&self, segment: &Segment, text: &mut String, issues: &mut Vec<ConsistencyIssue>) {
        for rule in self.glossary.custom_rules_for(&segment.target_language, None) {
            let Some(rewritten) = rule.apply(text) else {
                continue;
            };

            let issue_type = match rule.kind {
                CustomRuleKind::Terminology => IssueType::TerminologyMismatch,
                _ => IssueType::FormattingViolation,
            };
            let issue = ConsistencyIssue::new(segment, issue_type, Severity::Warning, rule.label())
                .with_fix(rewritten.clone());

            if self.config.auto_correct {
                debug!("Applied consistency rule {} to '{}'", rule.id, truncate_text(text, 30));
                *text = rewritten;
                issues.push(issue.fixed());
            } else {
                issues.push(issue);
            }
        }
    }

    fn check_numbers(segment: &Segment, text: &str, issues: &mut Vec<ConsistencyIssue>) {
        match compare_numbers(&segment.source_text, &segment.source_language, text, &segment.target_language) {
            NumericCheck::Preserved => {}
            NumericCheck::Reordered => issues.push(ConsistencyIssue::new(
                segment,
                IssueType::NumericMismatch,
                Severity::Warning,
                "Numbers appear in a different order than in the source".to_string(),
            )),
            NumericCheck::Missing(missing) => issues.push(ConsistencyIssue::new(
                segment,
                IssueType::NumericMismatch,
                Severity::Error,
                format!("Numbers missing from the translation: {}", missing.join(", ")),
            )),
        }
    }

    fn check_length(&self, segment: &Segment, text: &str, issues: &mut Vec<ConsistencyIssue>) {
        let source_len = segment.source_text.trim().chars().count();
        if source_len == 0 || source_len < self.config.min_length_check_chars {
            return;
        }

        let ratio = text.trim().chars().count() as f64 / source_len as f64;
        let max_expansion = rules_for(&segment.target_language).expansion_factor;

        if ratio > max_expansion * 1.1 {
            issues.push(ConsistencyIssue::new(
                segment,
                IssueType::LengthExpansion,
                Severity::Info,
                format!("Translation is {:.0}% of the source length", ratio * 100.0),
            ));
        } else if ratio < 0.5 {
            issues.push(ConsistencyIssue::new(
                segment,
                IssueType::LengthExpansion,
                Severity::Warning,
                format!("Translation is only {:.0}% of the source length", ratio * 100.0),
            ));
        }
    }

    /// Find sources rendered in more than one way
    ///
    /// Groups translations by normalized source text and target language.
    /// Each translation that differs from the most frequent rendering gets a
    /// terminology warning suggesting that rendering.
    pub fn check_divergence<'a, I>(&self, translations: I) -> Vec<ConsistencyIssue>
    where
        I: IntoIterator<Item = (&'a Segment, &'a str)>,
    {
        let mut groups: HashMap<(String, String), Vec<(&Segment, &str)>> = HashMap::new();
        for (segment, text) in translations {
            groups
                .entry((segment.normalized_text.to_lowercase(), segment.target_language.clone()))
                .or_default()
                .push((segment, text));
        }

        let mut issues = Vec::new();
        for members in groups.values() {
            let mut counts: Vec<(&str, usize)> = Vec::new();
            for &(_, text) in members {
                match counts.iter_mut().find(|(t, _)| *t == text) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((text, 1)),
                }
            }
            if counts.len() < 2 {
                continue;
            }

            // Most frequent, first seen on ties
            let mut majority = counts[0];
            for candidate in &counts[1..] {
                if candidate.1 > majority.1 {
                    majority = *candidate;
                }
            }

            for &(segment, text) in members {
                if text != majority.0 {
                    issues.push(
                        ConsistencyIssue::new(
                            segment,
                            IssueType::TerminologyMismatch,
                            Severity::Warning,
                            format!(
                                "'{}' translated as '{}' elsewhere",
                                truncate_text(&segment.normalized_text, 40),
                                truncate_text(majority.0, 40)
                            ),
                        )
                        .with_fix(majority.0),
                    );
                }
            }
        }
        issues
    }
}

/// Copy the case of the first letter of `original` onto `replacement`
fn mirror_initial_case(original: &str, replacement: &str) -> String {
    let Some(first) = original.chars().next() else {
        return replacement.to_string();
    };
    let mut chars = replacement.chars();
    let Some(head) = chars.next() else {
        return String::new();
    };

    let head: String = if first.is_uppercase() {
        head.to_uppercase().collect()
    } else if first.is_lowercase() && !replacement.chars().skip(1).any(|c| c.is_uppercase()) {
        head.to_lowercase().collect()
    } else {
        head.to_string()
    };
    format!("{}{}", head, chars.as_str())
}

fn count_bullets(text: &str) -> usize {
    text.lines()
        .filter(|line| {
            let line = line.trim_start();
            line.starts_with(['•', '◦', '▪', '–']) || line.starts_with("- ") || line.starts_with("* ")
        })
        .count()
}

/// Issues collected over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// All issues, in the order they were found
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add issues to the report
    pub fn extend<I: IntoIterator<Item = ConsistencyIssue>>(&mut self, issues: I) {
        self.issues.extend(issues);
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of issues with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Number of issues that were fixed automatically
    pub fn auto_fixed_count(&self) -> usize {
        self.issues.iter().filter(|i| i.auto_fixed).count()
    }

    /// Issues grouped by type
    pub fn by_type(&self) -> BTreeMap<IssueType, Vec<&ConsistencyIssue>> {
        let mut groups: BTreeMap<IssueType, Vec<&ConsistencyIssue>> = BTreeMap::new();
        for issue in &self.issues {
            groups.entry(issue.issue_type).or_default().push(issue);
        }
        groups
    }

    /// Fail on the first unfixed error-severity issue
    pub fn ensure_no_errors(&self) -> Result<(), EngineError> {
        match self.issues.iter().find(|i| i.severity == Severity::Error && !i.auto_fixed) {
            Some(issue) => Err(issue.to_violation()),
            None => Ok(()),
        }
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize report: {}", e)))
    }

    /// Plain-text summary: counts by severity, then at most five issues per type
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return "No consistency issues found.".to_string();
        }

        let mut lines = vec![
            "Consistency report".to_string(),
            format!("- Errors: {}", self.count(Severity::Error)),
            format!("- Warnings: {}", self.count(Severity::Warning)),
            format!("- Info: {}", self.count(Severity::Info)),
            format!("- Auto-fixed: {}", self.auto_fixed_count()),
        ];

        for (issue_type, issues) in self.by_type() {
            lines.push(String::new());
            lines.push(format!("{} ({})", issue_type, issues.len()));
            for issue in issues.iter().take(5) {
                lines.push(format!("- {}", issue.message));
            }
            if issues.len() > 5 {
                lines.push(format!("- ...and {} more", issues.len() - 5));
            }
        }

        lines.join("\n")
    }
}
