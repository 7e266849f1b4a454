/*!
 * Error types for the pagetrans engine.
 *
 * This module contains custom error types for the different parts of the engine,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// How a provider failure should be treated by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying after a backoff delay
    Transient,
    /// Retrying cannot help
    Permanent,
}

/// Errors that can occur when calling a translation provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request was rejected as malformed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The call exceeded its per-call timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Classify the failure as transient or permanent
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimitExceeded(_)
            | ProviderError::ConnectionError(_)
            | ProviderError::RequestFailed(_)
            | ProviderError::ParseError(_) => FailureKind::Transient,
            ProviderError::ApiError { status_code, .. } => match status_code {
                408 | 429 => FailureKind::Transient,
                500..=599 => FailureKind::Transient,
                _ => FailureKind::Permanent,
            },
            ProviderError::AuthenticationError(_) | ProviderError::MalformedRequest(_) => {
                FailureKind::Permanent
            }
        }
    }

    /// Shorthand for `kind() == FailureKind::Transient`
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// Main engine error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Provider kept failing transiently until the retry budget ran out
    #[error("Transient provider failure after {attempts} attempt(s): {source}")]
    TransientProvider {
        /// Number of attempts made
        attempts: u32,
        /// Last error returned by the provider
        #[source]
        source: ProviderError,
    },

    /// Provider failure that is not retried
    #[error("Permanent provider failure: {0}")]
    PermanentProvider(#[source] ProviderError),

    /// Translation memory or glossary storage failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A translated segment violates a consistency rule
    #[error("Consistency violation in segment {segment_key}: {message}")]
    ConsistencyViolation {
        /// Key of the offending segment
        segment_key: String,
        /// Description of the violation
        message: String,
    },

    /// Some documents or segments of a batch failed while others succeeded
    #[error("Partial batch failure: {failed_segments} segment(s) failed across {} document(s)", .failed_documents.len())]
    PartialBatchFailure {
        /// Documents that did not translate completely
        failed_documents: Vec<String>,
        /// Total number of failed segments
        failed_segments: usize,
    },

    /// The run was cancelled before the job was dispatched
    #[error("Run cancelled before the segment was dispatched")]
    Cancelled,

    /// TMX document could not be read or written
    #[error("TMX error: {0}")]
    Tmx(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A user-defined consistency rule could not be compiled
    #[error("Invalid consistency rule: {0}")]
    InvalidRule(String),
}

impl EngineError {
    /// Wrap a provider error according to its classification
    pub fn from_provider(error: ProviderError, attempts: u32) -> Self {
        match error.kind() {
            FailureKind::Transient => EngineError::TransientProvider {
                attempts,
                source: error,
            },
            FailureKind::Permanent => EngineError::PermanentProvider(error),
        }
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        Self::Persistence(format!("{:#}", error))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}

impl From<quick_xml::Error> for EngineError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Tmx(error.to_string())
    }
}
