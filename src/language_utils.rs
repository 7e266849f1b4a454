use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Segment keys and translation memory keys embed language codes, so the same
/// language must always produce the same code ("it", "ita" and "IT" are one
/// language). Region subtags ("pt-BR", "zh_TW") are kept but lowercased and
/// joined with a hyphen.

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Split a code into its primary language subtag and an optional region
fn split_code(code: &str) -> (String, Option<String>) {
    let lowered = code.trim().to_lowercase().replace('_', "-");
    match lowered.split_once('-') {
        Some((primary, region)) if !region.is_empty() => {
            (primary.to_string(), Some(region.to_string()))
        }
        Some((primary, _)) => (primary.to_string(), None),
        None => (lowered, None),
    }
}

/// Resolve a primary subtag (2 or 3 letters) to an isolang language
fn resolve(primary: &str) -> Option<Language> {
    match primary.len() {
        2 => Language::from_639_1(primary),
        3 => {
            let part2t = PART2B_TO_PART2T
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Validate that a code names a known language
pub fn validate_language_code(code: &str) -> Result<()> {
    let (primary, _) = split_code(code);
    resolve(&primary)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code for use in keys
///
/// Known languages become their ISO 639-1 code (or ISO 639-2/T when no
/// 2-letter code exists). Unknown codes are only trimmed and lowercased, so
/// normalization never fails.
pub fn normalize_language_code(code: &str) -> String {
    let (primary, region) = split_code(code);

    let base = match resolve(&primary) {
        Some(lang) => lang
            .to_639_1()
            .map(|c| c.to_string())
            .unwrap_or_else(|| lang.to_639_3().to_string()),
        None => primary,
    };

    match region {
        Some(region) => format!("{}-{}", base, region),
        None => base,
    }
}

/// Primary language subtag of a normalized code ("pt-br" -> "pt")
pub fn primary_subtag(code: &str) -> String {
    let normalized = normalize_language_code(code);
    normalized
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    normalize_language_code(code1) == normalize_language_code(code2)
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let (primary, _) = split_code(code);
    let lang = resolve(&primary)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(lang.to_name().to_string())
}
