/*!
 * Tests for language utility functions
 */

use pagetrans::language_utils::{
    get_language_name, language_codes_match, normalize_language_code, primary_subtag, validate_language_code,
};
use pagetrans::segment::memory_key;

/// Test validation of language codes
#[test]
fn test_validateLanguageCode_withVariousCodes_shouldAcceptKnownLanguages() {
    // ISO 639-1
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("it").is_ok());

    // ISO 639-2/T and 639-2/B
    assert!(validate_language_code("deu").is_ok());
    assert!(validate_language_code("fre").is_ok());

    // Regional variants
    assert!(validate_language_code("pt-BR").is_ok());

    // Invalid codes
    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("123").is_err());
    assert!(validate_language_code("e").is_err());
}

/// Test matching of different language code formats
#[test]
fn test_languageCodesMatch_withEquivalentCodes_shouldReturnTrue() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fr", "fre"));
    assert!(language_codes_match("DE", " ger "));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("pt", "pt-br"));
}

/// Test retrieval of language names
#[test]
fn test_getLanguageName_withValidCodes_shouldReturnName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("ita").unwrap(), "Italian");
    assert_eq!(get_language_name("de-AT").unwrap(), "German");
    assert!(get_language_name("zz").is_err());
}

/// Unknown codes are kept rather than rejected
#[test]
fn test_normalizeLanguageCode_unknownCode_shouldBeLowercased() {
    assert_eq!(normalize_language_code(" XX "), "xx");
    assert_eq!(primary_subtag("pt_BR"), "pt");
}

/// Equivalent codes address the same memory entry
#[test]
fn test_memoryKey_withEquivalentCodes_shouldBeEqual() {
    assert_eq!(memory_key("Hello", "en", "it"), memory_key("Hello", "eng", "ita"));
    assert_ne!(memory_key("Hello", "en", "it"), memory_key("Hello", "en", "de"));
}
