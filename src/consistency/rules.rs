/*!
 * Per-language formatting rules.
 *
 * Every rule is a deterministic rewrite of the translated text. A rule
 * returns `None` when it leaves the text untouched so the checker can
 * report exactly which rules fired.
 */

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::language_utils::primary_subtag;

/// Number with at least one inner '.' or ',' separator
static SEPARATED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)+").expect("Invalid separated number regex"));

/// English-style grouped decimal: 1,234.56
static DOT_DECIMAL_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+\.\d+$").expect("Invalid grouped decimal regex"));

/// Continental grouped decimal: 1.234,56
static COMMA_DECIMAL_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+,\d+$").expect("Invalid grouped decimal regex"));

/// Plain dot decimal with one or two fraction digits: 12.50
static DOT_DECIMAL_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d{1,2}$").expect("Invalid short decimal regex"));

/// Plain comma decimal with one or two fraction digits: 12,50
static COMMA_DECIMAL_SHORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+,\d{1,2}$").expect("Invalid short decimal regex"));

/// A quoted span in any of the common quotation styles
static QUOTED_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"\n]+)"|“([^”\n]+)”|„([^“\n]+)“|«[\s\u{a0}]?([^»\n]+?)[\s\u{a0}]?»"#)
        .expect("Invalid quoted span regex")
});

/// Runs of spaces and tabs
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("Invalid space regex"));

/// Spaces before closing punctuation
static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("Invalid punctuation regex"));

/// Spaces before comma or period only
static SPACE_BEFORE_LOW_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.])").expect("Invalid punctuation regex"));

/// Decimal separator convention of a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalStyle {
    /// 1,234.56
    Dot,
    /// 1.234,56
    Comma,
}

impl DecimalStyle {
    /// Decimal separator character
    pub fn decimal_char(&self) -> char {
        match self {
            DecimalStyle::Dot => '.',
            DecimalStyle::Comma => ',',
        }
    }
}

/// Formatting conventions of a target language
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanguageRules {
    /// Primary language subtag
    pub language: &'static str,
    /// Decimal separator convention
    pub decimal: DecimalStyle,
    /// Opening and closing double quotes, if the language has a fixed style
    pub quotes: Option<(&'static str, &'static str)>,
    /// Whether a space precedes ; : ! ? (French typography)
    pub space_before_high_punct: bool,
    /// Whether nouns are capitalized, so lowercasing a first word is unsafe
    pub capitalizes_nouns: bool,
    /// Typical length of a translation relative to its English source
    pub expansion_factor: f64,
}

const DEFAULT_RULES: LanguageRules = LanguageRules {
    language: "und",
    decimal: DecimalStyle::Dot,
    quotes: None,
    space_before_high_punct: false,
    capitalizes_nouns: false,
    expansion_factor: 1.2,
};

const RULES: &[LanguageRules] = &[
    LanguageRules {
        language: "en",
        decimal: DecimalStyle::Dot,
        quotes: Some(("“", "”")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "it",
        decimal: DecimalStyle::Comma,
        quotes: Some(("«", "»")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.1,
    },
    LanguageRules {
        language: "de",
        decimal: DecimalStyle::Comma,
        quotes: Some(("„", "“")),
        space_before_high_punct: false,
        capitalizes_nouns: true,
        expansion_factor: 1.3,
    },
    LanguageRules {
        language: "fr",
        decimal: DecimalStyle::Comma,
        quotes: Some(("«\u{a0}", "\u{a0}»")),
        space_before_high_punct: true,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "es",
        decimal: DecimalStyle::Comma,
        quotes: Some(("«", "»")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.15,
    },
    LanguageRules {
        language: "pt",
        decimal: DecimalStyle::Comma,
        quotes: Some(("“", "”")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "nl",
        decimal: DecimalStyle::Comma,
        quotes: Some(("“", "”")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "ru",
        decimal: DecimalStyle::Comma,
        quotes: Some(("«", "»")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "pl",
        decimal: DecimalStyle::Comma,
        quotes: Some(("„", "”")),
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 1.2,
    },
    LanguageRules {
        language: "ja",
        decimal: DecimalStyle::Dot,
        quotes: None,
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 0.8,
    },
    LanguageRules {
        language: "zh",
        decimal: DecimalStyle::Dot,
        quotes: None,
        space_before_high_punct: false,
        capitalizes_nouns: false,
        expansion_factor: 0.7,
    },
];

/// Rules for a language code; unknown languages get neutral defaults
pub fn rules_for(language: &str) -> LanguageRules {
    let primary = primary_subtag(language);
    RULES
        .iter()
        .find(|r| r.language == primary)
        .copied()
        .unwrap_or(DEFAULT_RULES)
}

/// Rewrite numbers written in the other decimal convention
///
/// Only unambiguous shapes are touched: fully grouped decimals
/// ("1,234.56") and plain decimals with one or two fraction digits
/// ("12.50"). Values such as "1.234" or "1.2.3" are left alone, and so are
/// version numbers written with a leading "v" ("v2.10").
pub fn fix_decimal_separators(text: &str, rules: &LanguageRules) -> Option<String> {
    let (grouped, short) = match rules.decimal {
        DecimalStyle::Comma => (&*DOT_DECIMAL_GROUPED, &*DOT_DECIMAL_SHORT),
        DecimalStyle::Dot => (&*COMMA_DECIMAL_GROUPED, &*COMMA_DECIMAL_SHORT),
    };

    let fixed = SEPARATED_NUMBER.replace_all(text, |caps: &Captures<'_>| {
        let number = &caps[0];
        let version = caps
            .get(0)
            .is_some_and(|m| text[..m.start()].ends_with(['v', 'V']));
        if !version && (grouped.is_match(number) || short.is_match(number)) {
            swap_separators(number)
        } else {
            number.to_string()
        }
    });

    (fixed != text).then(|| fixed.into_owned())
}

fn swap_separators(number: &str) -> String {
    number
        .chars()
        .map(|c| match c {
            '.' => ',',
            ',' => '.',
            other => other,
        })
        .collect()
}

/// Rewrite double quotation marks to the language's style
pub fn fix_quotes(text: &str, rules: &LanguageRules) -> Option<String> {
    let (open, close) = rules.quotes?;

    let fixed = QUOTED_SPAN.replace_all(text, |caps: &Captures<'_>| {
        let inner = (1..=4)
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().trim_matches(|c: char| c == ' ' || c == '\u{a0}'))
            .unwrap_or_default();
        format!("{}{}{}", open, inner, close)
    });

    (fixed != text).then(|| fixed.into_owned())
}

/// Make the first letter's case mirror the source
///
/// Uppercasing always applies. Lowercasing is skipped for languages that
/// capitalize nouns and for words written in capitals ("PVC", "iOS").
pub fn fix_capitalization(source: &str, target: &str, rules: &LanguageRules) -> Option<String> {
    let source_first = source.chars().find(|c| c.is_alphanumeric())?;
    let (index, target_first) = target.char_indices().find(|(_, c)| c.is_alphanumeric())?;

    if !source_first.is_alphabetic() || !target_first.is_alphabetic() {
        return None;
    }

    let replacement: String = if source_first.is_uppercase() && target_first.is_lowercase() {
        target_first.to_uppercase().collect()
    } else if source_first.is_lowercase() && target_first.is_uppercase() {
        if rules.capitalizes_nouns {
            return None;
        }
        let first_word: String = target[index..]
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        if first_word.chars().skip(1).any(|c| c.is_uppercase()) {
            return None;
        }
        target_first.to_lowercase().collect()
    } else {
        return None;
    };

    let mut fixed = String::with_capacity(target.len());
    fixed.push_str(&target[..index]);
    fixed.push_str(&replacement);
    fixed.push_str(&target[index + target_first.len_utf8()..]);
    Some(fixed)
}

/// Collapse space runs, remove spaces before punctuation and restore the
/// source's leading and trailing whitespace
pub fn clean_whitespace(source: &str, target: &str, rules: &LanguageRules) -> Option<String> {
    let collapsed = SPACE_RUN.replace_all(target.trim(), " ");
    let punct = if rules.space_before_high_punct {
        &*SPACE_BEFORE_LOW_PUNCT
    } else {
        &*SPACE_BEFORE_PUNCT
    };
    let tightened = punct.replace_all(&collapsed, "$1");

    let leading = &source[..source.len() - source.trim_start().len()];
    let trailing = &source[source.trim_end().len()..];
    let fixed = format!("{}{}{}", leading, tightened, trailing);

    (fixed != target).then_some(fixed)
}
