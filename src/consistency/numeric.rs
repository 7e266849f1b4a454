/*!
 * Numeric value preservation.
 *
 * Numbers are compared by value, not by spelling: "1,234.5" in an English
 * source and "1.234,5" in an Italian target are the same token. A unit
 * written after a source number must follow the same number in the target.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::rules::rules_for;

/// Digits with inner separators, optionally followed by a unit
static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:[.,'\u{a0}\u{202f}]\d+)*)(?:[ \u{a0}\u{202f}]?(%|°[CF]|″|[\p{L}/²³]+))?")
        .expect("Invalid number token regex")
});

/// Units recognized after a number
const UNITS: &[&str] = &[
    "%", "°C", "°F", "mm", "cm", "dm", "m", "km", "µm", "m²", "m³", "mm²", "cm²", "g", "kg", "t",
    "mg", "N", "Nm", "kN", "kNm", "MN", "Pa", "kPa", "MPa", "GPa", "bar", "Hz", "kHz", "MHz", "V",
    "kV", "W", "kW", "MW", "A", "mA", "l", "L", "ml", "mL", "s", "ms", "min", "h", "kg/m", "kg/m²",
    "kg/m³", "N/mm²", "kN/m", "kN/m²", "ft", "lb", "lbs", "psi",
];

/// Inch symbol; the word "in" is too often a preposition to count
const INCH_SYMBOL: &str = "″";

/// Spelling variants folded to one unit
fn canonical_unit(unit: &str) -> &str {
    match unit {
        "L" => "l",
        "mL" => "ml",
        "lbs" => "lb",
        other => other,
    }
}

/// A number found in text with its canonical value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericToken {
    /// Spelling as it appears in the text
    pub raw: String,
    /// Canonical value: no grouping, '.' as decimal point
    pub value: String,
    /// Unit written after the number
    pub unit: Option<String>,
}

impl NumericToken {
    /// Same value, and the same unit when this token has one
    pub fn matches(&self, other: &NumericToken) -> bool {
        self.value == other.value
            && match (&self.unit, &other.unit) {
                (None, _) => true,
                (Some(a), Some(b)) => canonical_unit(a) == canonical_unit(b),
                (Some(_), None) => false,
            }
    }
}

impl fmt::Display for NumericToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} {}", self.raw, unit),
            None => write!(f, "{}", self.raw),
        }
    }
}

/// Result of comparing the numbers of a source and its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericCheck {
    /// Every source number appears in the target, in order
    Preserved,
    /// Every source number appears, but in a different order
    Reordered,
    /// Source numbers absent from the target
    Missing(Vec<String>),
}

/// Canonical value of a number written in the given language
///
/// Apostrophes and non-breaking spaces always group digits. When both '.'
/// and ',' occur, the last one is the decimal point; a separator that
/// repeats is grouping. A lone separator is the decimal point if it is the
/// language's decimal character, or if it is not followed by exactly three
/// digits.
pub fn canonical_value(number: &str, decimal_char: char) -> String {
    let cleaned: String = number
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{a0}' | '\u{202f}'))
        .collect();

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let decimal_at = if dots > 0 && commas > 0 {
        cleaned.rfind(['.', ','])
    } else if dots + commas == 1 {
        cleaned.rfind(['.', ',']).filter(|&pos| {
            let separator = if dots == 1 { '.' } else { ',' };
            let trailing = cleaned.len() - pos - 1;
            separator == decimal_char || trailing != 3
        })
    } else {
        None
    };

    let (integer, fraction) = match decimal_at {
        Some(pos) => (&cleaned[..pos], &cleaned[pos + 1..]),
        None => (cleaned.as_str(), ""),
    };

    let integer: String = integer.chars().filter(|c| c.is_ascii_digit()).collect();
    let integer = integer.trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// Numbers in a text, read with the language's decimal convention
pub fn extract_numbers(text: &str, language: &str) -> Vec<NumericToken> {
    let decimal_char = rules_for(language).decimal.decimal_char();

    NUMBER_TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str();
            let unit = caps
                .get(2)
                .map(|m| m.as_str())
                .filter(|u| UNITS.contains(u) || *u == INCH_SYMBOL)
                .map(|u| u.to_string());
            Some(NumericToken {
                raw: raw.to_string(),
                value: canonical_value(raw, decimal_char),
                unit,
            })
        })
        .collect()
}

/// Compare the numbers of a source text and its translation
pub fn compare_numbers(
    source: &str,
    source_language: &str,
    target: &str,
    target_language: &str,
) -> NumericCheck {
    let expected = extract_numbers(source, source_language);
    if expected.is_empty() {
        return NumericCheck::Preserved;
    }
    let found = extract_numbers(target, target_language);

    // In-order scan
    let mut cursor = 0;
    let in_order = expected.iter().all(|token| {
        match found[cursor..].iter().position(|t| token.matches(t)) {
            Some(offset) => {
                cursor += offset + 1;
                true
            }
            None => false,
        }
    });
    if in_order {
        return NumericCheck::Preserved;
    }

    // Multiset scan
    let mut available: Vec<&NumericToken> = found.iter().collect();
    let mut missing = Vec::new();
    for token in &expected {
        match available.iter().position(|t| token.matches(t)) {
            Some(index) => {
                available.swap_remove(index);
            }
            None => missing.push(token.to_string()),
        }
    }

    if missing.is_empty() {
        NumericCheck::Reordered
    } else {
        NumericCheck::Missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalValue_shouldReadBothConventions() {
        assert_eq!(canonical_value("1,234.56", '.'), "1234.56");
        assert_eq!(canonical_value("1.234,56", ','), "1234.56");
        assert_eq!(canonical_value("12.50", '.'), "12.5");
        assert_eq!(canonical_value("12,5", ','), "12.5");
        assert_eq!(canonical_value("1,234", '.'), "1234");
        assert_eq!(canonical_value("1.234", ','), "1234");
        assert_eq!(canonical_value("1'000'000", '.'), "1000000");
        assert_eq!(canonical_value("1\u{a0}000", ','), "1000");
        assert_eq!(canonical_value("007", '.'), "7");
        assert_eq!(canonical_value("3.00", '.'), "3");
    }

    #[test]
    fn test_extractNumbers_shouldAttachKnownUnits() {
        let tokens = extract_numbers("Use 4 screws, 25 mm long, at 20°C for 3 items", "en");
        let summary: Vec<(String, Option<String>)> =
            tokens.into_iter().map(|t| (t.value, t.unit)).collect();

        assert_eq!(
            summary,
            vec![
                ("4".to_string(), None),
                ("25".to_string(), Some("mm".to_string())),
                ("20".to_string(), Some("°C".to_string())),
                ("3".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_compareNumbers_reformatted_shouldBePreserved() {
        assert_eq!(
            compare_numbers("Total: 1,234.50 EUR", "en", "Totale: 1.234,50 EUR", "it"),
            NumericCheck::Preserved
        );
        assert_eq!(
            compare_numbers("Load 25%", "en", "Charge 25 %", "fr"),
            NumericCheck::Preserved
        );
    }

    #[test]
    fn test_compareNumbers_missingValue_shouldListIt() {
        assert_eq!(
            compare_numbers("Tighten to 12.5 Nm within 30 s", "en", "Serrare entro 30 s", "it"),
            NumericCheck::Missing(vec!["12.5 Nm".to_string()])
        );
        assert_eq!(
            compare_numbers("Width 20 mm", "en", "Larghezza 20 cm", "it"),
            NumericCheck::Missing(vec!["20 mm".to_string()])
        );
    }

    #[test]
    fn test_compareNumbers_droppedUnit_shouldListIt() {
        assert_eq!(
            compare_numbers("Width 20 mm", "en", "Larghezza 20", "it"),
            NumericCheck::Missing(vec!["20 mm".to_string()])
        );
        assert_eq!(
            compare_numbers("Tighten to 25 kN", "en", "Serrare a 25", "it"),
            NumericCheck::Missing(vec!["25 kN".to_string()])
        );
        // A unit only in the target is not a loss
        assert_eq!(
            compare_numbers("Use 4 pieces", "en", "Usare 4 pz", "it"),
            NumericCheck::Preserved
        );
    }

    #[test]
    fn test_extractNumbers_inchWordAndSymbol() {
        let word = extract_numbers("Insert 2 in the slot", "en");
        assert_eq!(word[0].unit, None);

        let symbol = extract_numbers("A 3″ pipe", "en");
        assert_eq!(symbol[0].unit.as_deref(), Some("″"));
        assert_eq!(
            compare_numbers("A 3″ pipe", "en", "Un tubo da 3 pollici", "it"),
            NumericCheck::Missing(vec!["3 ″".to_string()])
        );
    }

    #[test]
    fn test_compareNumbers_unitSpellingVariants_shouldMatch() {
        assert_eq!(compare_numbers("Fill 5 L", "en", "Riempire 5 l", "it"), NumericCheck::Preserved);
    }

    #[test]
    fn test_compareNumbers_swapped_shouldBeReordered() {
        assert_eq!(
            compare_numbers("From 10 to 20", "en", "Bis 20, ab 10", "de"),
            NumericCheck::Reordered
        );
    }

    #[test]
    fn test_compareNumbers_noNumbers_shouldBePreserved() {
        assert_eq!(compare_numbers("Invoice", "en", "Fattura", "it"), NumericCheck::Preserved);
    }
}
