/*!
 * Translation provider contract.
 *
 * The engine never talks to a translation service directly. It calls a
 * `TranslationProvider` with one segment at a time and classifies failures
 * through `ProviderError::kind`. A real provider (LLM, MT service) lives
 * outside this crate; `mock` provides an instrumented stand-in for tests.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::language_utils::get_language_name;

pub mod mock;

pub use mock::{MockBehavior, MockProvider};

/// One translation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Text to translate, as it appears in the document
    pub source_text: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Free-form hint about where the text comes from
    pub context_hint: Option<String>,
    /// Glossary pairs (term, preferred translation) relevant to the text
    pub glossary: Vec<(String, String)>,
}

impl TranslationRequest {
    /// Create a request without hints
    pub fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            context_hint: None,
            glossary: Vec::new(),
        }
    }

    /// Attach a context hint
    pub fn with_context_hint(mut self, hint: Option<String>) -> Self {
        self.context_hint = hint;
        self
    }

    /// Attach glossary pairs
    pub fn with_glossary(mut self, glossary: Vec<(String, String)>) -> Self {
        self.glossary = glossary;
        self
    }

    /// Instructions for prompt-driven providers
    ///
    /// Names the languages, lists glossary pairs and appends the context
    /// hint. The text itself is not included.
    pub fn instructions(&self) -> String {
        let source = get_language_name(&self.source_language).unwrap_or_else(|_| self.source_language.clone());
        let target = get_language_name(&self.target_language).unwrap_or_else(|_| self.target_language.clone());

        let mut lines = vec![format!(
            "Translate the following text from {} to {}. Return only the translation.",
            source, target
        )];

        if !self.glossary.is_empty() {
            lines.push("Use these terms:".to_string());
            for (term, translation) in &self.glossary {
                lines.push(format!("- {} => {}", term, translation));
            }
        }

        if let Some(hint) = &self.context_hint {
            lines.push(format!("Context: {}", hint));
        }

        lines.join("\n")
    }
}

/// Provider output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResponse {
    /// Translated text
    pub target_text: String,
}

/// Common trait for all translation providers
///
/// Implementations must be safe to call concurrently; the scheduler bounds
/// how many calls are in flight.
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Translate one segment
    ///
    /// # Arguments
    /// * `request` - Segment text, languages and hints
    ///
    /// # Returns
    /// * `Result<TranslationResponse, ProviderError>` - The translation or a classified error
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError>;

    /// Provider name for logs
    fn name(&self) -> &str {
        "provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_shouldListLanguagesGlossaryAndHint() {
        let request = TranslationRequest::new("Invoice total", "en", "it")
            .with_glossary(vec![("Invoice".to_string(), "Fattura".to_string())])
            .with_context_hint(Some("table header".to_string()));

        let instructions = request.instructions();
        assert!(instructions.contains("from English to Italian"));
        assert!(instructions.contains("- Invoice => Fattura"));
        assert!(instructions.ends_with("Context: table header"));
        assert!(!instructions.contains("Invoice total"));
    }

    #[test]
    fn test_instructions_unknownLanguage_shouldFallBackToCode() {
        let request = TranslationRequest::new("Hello", "en", "xx");
        assert!(request.instructions().contains("to xx."));
    }
}
