/*!
 * Tests for error types and conversions
 */

use pagetrans::errors::{EngineError, FailureKind, ProviderError};

#[test]
fn test_providerError_requestFailed_shouldDisplayCorrectly() {
    let error = ProviderError::RequestFailed("Connection reset".to_string());
    let display = format!("{}", error);
    assert!(display.contains("API request failed"));
    assert!(display.contains("Connection reset"));
}

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
}

#[test]
fn test_providerError_timeout_shouldBeTransient() {
    let error = ProviderError::Timeout(30_000);
    assert!(error.is_transient());
    assert!(format!("{}", error).contains("30000 ms"));
}

#[test]
fn test_providerError_malformedRequest_shouldBePermanent() {
    let error = ProviderError::MalformedRequest("empty text".to_string());
    assert_eq!(error.kind(), FailureKind::Permanent);
}

#[test]
fn test_engineError_fromProvider_shouldFollowClassification() {
    let transient = EngineError::from_provider(ProviderError::ConnectionError("down".to_string()), 3);
    assert!(matches!(transient, EngineError::TransientProvider { attempts: 3, .. }));

    let permanent = EngineError::from_provider(ProviderError::AuthenticationError("bad key".to_string()), 1);
    assert!(matches!(permanent, EngineError::PermanentProvider(_)));
}

#[test]
fn test_engineError_transientProvider_shouldExposeSource() {
    use std::error::Error;

    let error = EngineError::from_provider(ProviderError::RateLimitExceeded("slow down".to_string()), 2);
    let source = error.source().map(|s| s.to_string()).unwrap_or_default();
    assert!(source.contains("Rate limit exceeded"));
    assert!(format!("{}", error).contains("2 attempt(s)"));
}

#[test]
fn test_engineError_partialBatchFailure_shouldCountDocuments() {
    let error = EngineError::PartialBatchFailure {
        failed_documents: vec!["a".to_string(), "b".to_string()],
        failed_segments: 5,
    };
    let display = format!("{}", error);
    assert!(display.contains("5 segment(s)"));
    assert!(display.contains("2 document(s)"));
}

#[test]
fn test_engineError_fromAnyhow_shouldBecomePersistence() {
    let error: EngineError = anyhow::anyhow!("disk full").into();
    assert_eq!(error, EngineError::Persistence("disk full".to_string()));
}
