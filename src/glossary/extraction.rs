/*!
 * Candidate term extraction.
 *
 * Finds strings that are likely terminology in source segments:
 * - short labels (a whole segment of a few words, such as "Invoice")
 * - capitalized names and phrases inside longer text
 * - quoted phrases
 *
 * The batch coordinator counts candidates across documents; frequent ones
 * become glossary candidates.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::segment::{is_translatable_text, normalize_text};

/// Capitalized word
static NAME_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}\p{Ll}+\b").expect("Invalid name regex"));

/// Phrase in straight or typographic double quotes
static QUOTED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["“„«]\s*([^"“”„«»]+?)\s*["”»]"#).expect("Invalid quote regex"));

/// Configuration for term extraction.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Minimum characters in a term
    pub min_term_length: usize,

    /// A segment with at most this many words counts as a label
    pub max_label_words: usize,

    /// Whether to extract capitalized words inside longer text
    pub extract_names: bool,

    /// Whether to extract quoted phrases
    pub extract_quoted: bool,

    /// Words never extracted on their own (compared case-insensitively)
    pub exclude_words: HashSet<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let exclude_words = [
            "the", "a", "an", "this", "that", "these", "those", "it", "he", "she", "they", "we",
            "you", "my", "your", "his", "her", "our", "their", "what", "who", "where", "when",
            "why", "how", "yes", "no", "please", "thanks", "note", "see", "page", "for", "and",
            "or", "with", "from", "not", "all", "any", "each", "if", "do", "use", "step",
        ]
        .iter()
        .map(|w| w.to_string())
        .collect();

        Self {
            min_term_length: 3,
            max_label_words: 4,
            extract_names: true,
            extract_quoted: true,
            exclude_words,
        }
    }
}

impl ExtractionConfig {
    /// Use a different minimum term length
    pub fn with_min_length(mut self, min_term_length: usize) -> Self {
        self.min_term_length = min_term_length;
        self
    }

    /// Add a word to the exclusion list.
    pub fn exclude(mut self, word: &str) -> Self {
        self.exclude_words.insert(word.to_lowercase());
        self
    }
}

/// Term extractor for glossary candidates.
#[derive(Debug, Clone, Default)]
pub struct TermExtractor {
    config: ExtractionConfig,
}

impl TermExtractor {
    /// Create a new extractor with the given configuration.
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Create an extractor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ExtractionConfig::default())
    }

    fn is_candidate(&self, term: &str) -> bool {
        term.chars().count() >= self.config.min_term_length
            && !self.config.exclude_words.contains(&term.to_lowercase())
            && term.chars().any(|c| c.is_alphabetic())
    }

    /// Whether a segment text is short enough to be a label
    pub fn is_label(&self, text: &str) -> bool {
        let normalized = normalize_text(text);
        let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
        words > 0
            && words <= self.config.max_label_words
            && !normalized.ends_with(['.', '!', '?'])
    }

    /// Candidate terms in one segment, each reported once
    pub fn candidates(&self, text: &str) -> Vec<String> {
        let normalized = normalize_text(text);
        if !is_translatable_text(&normalized, self.config.min_term_length) {
            return Vec::new();
        }

        if self.is_label(&normalized) {
            return if self.is_candidate(&normalized) {
                vec![normalized]
            } else {
                Vec::new()
            };
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut found = Vec::new();
        let mut push = |term: &str| {
            let term = normalize_text(term);
            if self.is_candidate(&term) && seen.insert(term.to_lowercase()) {
                found.push(term);
            }
        };

        if self.config.extract_names {
            // Two adjacent capitalized words form one name
            let words: Vec<regex::Match<'_>> = NAME_WORD.find_iter(&normalized).collect();
            let excluded = |w: &regex::Match<'_>| {
                self.config.exclude_words.contains(&w.as_str().to_lowercase())
            };

            let mut i = 0;
            while i < words.len() {
                let word = words[i];
                if excluded(&word) {
                    i += 1;
                    continue;
                }
                if let Some(next) = words.get(i + 1) {
                    let gap = &normalized[word.end()..next.start()];
                    if !gap.is_empty() && gap.chars().all(char::is_whitespace) && !excluded(next) {
                        push(&normalized[word.start()..next.end()]);
                        i += 2;
                        continue;
                    }
                }
                push(word.as_str());
                i += 1;
            }
        }

        if self.config.extract_quoted {
            for cap in QUOTED_PATTERN.captures_iter(&normalized) {
                if let Some(phrase) = cap.get(1) {
                    push(phrase.as_str());
                }
            }
        }

        found
    }

    /// Count candidates over many texts, keyed by lowercased term
    ///
    /// The first spelling seen is kept as the display form.
    pub fn count<'a, I>(&self, texts: I) -> HashMap<String, (String, usize)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<String, (String, usize)> = HashMap::new();
        for text in texts {
            for term in self.candidates(text) {
                counts
                    .entry(term.to_lowercase())
                    .or_insert_with(|| (term.clone(), 0))
                    .1 += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_shortLabel_shouldReturnWholeSegment() {
        let extractor = TermExtractor::with_defaults();
        assert_eq!(extractor.candidates("  Invoice "), vec!["Invoice".to_string()]);
        assert_eq!(extractor.candidates("Total amount"), vec!["Total amount".to_string()]);
    }

    #[test]
    fn test_candidates_sentence_shouldExtractNamesAndQuotes() {
        let extractor = TermExtractor::with_defaults();
        let found = extractor.candidates(
            "Mount the Myriad Walkway using the \"quick release\" lever. The Myriad Walkway is heavy.",
        );

        assert!(found.contains(&"Myriad Walkway".to_string()));
        assert!(found.contains(&"quick release".to_string()));
        assert!(!found.iter().any(|t| t == "The"));
        assert_eq!(found.iter().filter(|t| *t == "Myriad Walkway").count(), 1);
    }

    #[test]
    fn test_candidates_nonTranslatable_shouldBeEmpty() {
        let extractor = TermExtractor::with_defaults();
        assert!(extractor.candidates("12.50").is_empty());
        assert!(extractor.candidates("The").is_empty());
        assert!(extractor.candidates("--").is_empty());
    }

    #[test]
    fn test_count_shouldGroupCaseInsensitively() {
        let extractor = TermExtractor::with_defaults();
        let counts = extractor.count(["Invoice", "invoice", "Receipt", "Invoice"]);

        assert_eq!(counts.get("invoice"), Some(&("Invoice".to_string(), 3)));
        assert_eq!(counts.get("receipt").map(|c| c.1), Some(1));
    }

    #[test]
    fn test_isLabel_shouldRejectSentences() {
        let extractor = TermExtractor::with_defaults();
        assert!(extractor.is_label("Safety instructions"));
        assert!(!extractor.is_label("Read this first."));
        assert!(!extractor.is_label("Do not step on the upper rungs of the ladder"));
    }
}
