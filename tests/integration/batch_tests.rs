/*!
 * Batch runs over several documents sharing memory and glossary
 */

use std::sync::Arc;
use std::time::Duration;

use pagetrans::batch::{BatchConfig, BatchContext, BatchCoordinator, DocumentInput, DocumentStatus};
use pagetrans::consistency::{ConsistencyConfig, IssueType};
use pagetrans::errors::{EngineError, ProviderError};
use pagetrans::glossary::{Glossary, GlossaryScope};
use pagetrans::memory::TranslationMemory;
use pagetrans::providers::MockProvider;
use pagetrans::scheduler::{Resolution, SchedulerConfig, TranslationScheduler};

use crate::common;

const SENTENCE: &str = "Please send the Invoice to the customer today.";

fn coordinator(provider: &MockProvider, config: BatchConfig) -> BatchCoordinator {
    let context = BatchContext::new(Arc::new(TranslationMemory::in_memory()), Arc::new(Glossary::new()));
    coordinator_over(provider, config, context)
}

fn coordinator_over(provider: &MockProvider, config: BatchConfig, context: BatchContext) -> BatchCoordinator {
    coordinator_with(provider, config, context, common::fast_config())
}

fn coordinator_with(
    provider: &MockProvider,
    config: BatchConfig,
    context: BatchContext,
    scheduler_config: SchedulerConfig,
) -> BatchCoordinator {
    let scheduler = TranslationScheduler::new(
        scheduler_config,
        Arc::new(provider.clone()),
        Arc::clone(&context.memory),
        Arc::clone(&context.glossary),
        ConsistencyConfig::default(),
    );
    BatchCoordinator::new(config, context, scheduler, "en", "it")
}

/// A term translated in one document is enforced in the next
#[tokio::test]
async fn test_run_termFromEarlierDocument_shouldCorrectLaterDocument() {
    common::init_logs();
    let provider = MockProvider::working().with_translations(&[
        ("Invoice", "Fattura"),
        (SENTENCE, "Si prega di inviare la invoice al cliente oggi."),
    ]);
    let mut coordinator = coordinator(&provider, BatchConfig::default());

    let report = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &["Invoice"]),
            DocumentInput::from_texts("b", &[SENTENCE]),
        ])
        .await;

    assert!(report.is_complete());
    assert_eq!(report.candidates, vec![("Invoice".to_string(), 2)]);
    assert_eq!(report.seeded_terms, 1);

    let result = &report.outcome("b").unwrap().report.results[0];
    assert_eq!(
        result.translated_text.as_deref(),
        Some("Si prega di inviare la fattura al cliente oggi.")
    );
    assert!(result.auto_corrected);
    assert!(
        result
            .issues
            .iter()
            .any(|i| i.issue_type == IssueType::TerminologyMismatch && i.auto_fixed)
    );

    // The later request already carried the seeded term
    let request = provider
        .requests()
        .into_iter()
        .find(|r| r.source_text == SENTENCE)
        .unwrap();
    assert_eq!(request.glossary, vec![("Invoice".to_string(), "Fattura".to_string())]);

    // Batch-scoped entries do not outlive the batch
    assert!(coordinator.context().glossary.suggest("Invoice", "it").is_none());
    assert_eq!(report.promoted_terms, 0);
}

/// Promoted terms stay in the glossary after the batch
#[tokio::test]
async fn test_run_promoteBatchTerms_shouldKeepSeededTerms() {
    let provider = MockProvider::working().with_translations(&[("Invoice", "Fattura")]);
    let config = BatchConfig {
        promote_batch_terms: true,
        ..BatchConfig::default()
    };
    let mut coordinator = coordinator(&provider, config);

    let report = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &["Invoice"]),
            DocumentInput::from_texts("b", &["Invoice"]),
        ])
        .await;

    assert_eq!(report.promoted_terms, 1);
    let entry = coordinator.context().glossary.lookup("Invoice", "it").unwrap();
    assert_eq!(entry.preferred_translation, "Fattura");
    assert_eq!(entry.scope, GlossaryScope::Global);

    // The second document was served from memory
    let second = &report.outcome("b").unwrap().report.results[0];
    assert_eq!(second.resolution, Some(Resolution::Memory));
    assert_eq!(provider.call_count(), 1);
}

/// Frequent terms can be translated before any document
#[tokio::test]
async fn test_run_translateFrequentTerms_shouldSeedBeforeDocuments() {
    let provider = MockProvider::working().with_translations(&[
        ("Invoice", "Fattura"),
        (SENTENCE, "Si prega di inviare la invoice al cliente oggi."),
        ("The Invoice is attached.", "La invoice è allegata."),
    ]);
    let config = BatchConfig {
        translate_frequent_terms: true,
        ..BatchConfig::default()
    };
    let mut coordinator = coordinator(&provider, config);

    let report = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &[SENTENCE]),
            DocumentInput::from_texts("b", &["The Invoice is attached."]),
        ])
        .await;

    assert_eq!(provider.calls_for("Invoice"), 1);
    assert_eq!(report.seeded_terms, 1);

    let first = &report.outcome("a").unwrap().report.results[0];
    assert_eq!(
        first.translated_text.as_deref(),
        Some("Si prega di inviare la fattura al cliente oggi.")
    );
    let second = &report.outcome("b").unwrap().report.results[0];
    assert_eq!(second.translated_text.as_deref(), Some("La fattura è allegata."));
}

/// A failing document does not stop the others
#[tokio::test]
async fn test_run_oneDocumentFails_shouldReportPartialFailure() {
    common::init_logs();
    let provider = MockProvider::working()
        .with_failure_for("Broken paragraph", ProviderError::AuthenticationError("denied".to_string()));
    let mut coordinator = coordinator(&provider, BatchConfig::default());

    let report = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &["First paragraph", "Second paragraph"]),
            DocumentInput::from_texts("b", &["Third paragraph", "Broken paragraph"]),
            DocumentInput::from_texts("c", &["Last paragraph"]),
        ])
        .await;

    assert_eq!(report.outcome("a").unwrap().status, DocumentStatus::Complete);
    assert_eq!(report.outcome("c").unwrap().status, DocumentStatus::Complete);
    assert_eq!(
        report.outcome("b").unwrap().status,
        DocumentStatus::Partial {
            failed: vec!["b#1".to_string()]
        }
    );

    // Partial documents still return what they have
    let partial = &report.outcome("b").unwrap().report;
    assert_eq!(partial.reinsertions().len(), 1);

    match report.into_result() {
        Err(EngineError::PartialBatchFailure {
            failed_documents,
            failed_segments,
        }) => {
            assert_eq!(failed_documents, vec!["b".to_string()]);
            assert_eq!(failed_segments, 1);
        }
        other => panic!("expected a partial batch failure, got {:?}", other.map(|r| r.outcomes.len())),
    }
}

/// Cancelling before the run leaves every document cancelled
#[tokio::test]
async fn test_run_cancelled_shouldMarkDocumentsCancelled() {
    let provider = MockProvider::working();
    let mut coordinator = coordinator(&provider, BatchConfig::default());
    coordinator.cancellation().cancel();

    let report = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &["First paragraph"]),
            DocumentInput::from_texts("b", &["Second paragraph"]),
        ])
        .await;

    assert_eq!(provider.call_count(), 0);
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| o.status == DocumentStatus::Cancelled { failed: Vec::new() })
    );
    assert!(report.failure().is_some());
}

/// Segments that failed before a cancellation are still reported
#[tokio::test]
async fn test_run_cancelledAfterFailure_shouldKeepFailedSegments() {
    common::init_logs();
    let provider = MockProvider::working()
        .with_latency(Duration::from_millis(30))
        .with_failure_for("Broken paragraph", ProviderError::AuthenticationError("denied".to_string()));
    let context = BatchContext::new(Arc::new(TranslationMemory::in_memory()), Arc::new(Glossary::new()));
    let scheduler_config = SchedulerConfig {
        max_concurrent_requests: 1,
        ..common::fast_config()
    };
    let mut coordinator = coordinator_with(&provider, BatchConfig::default(), context, scheduler_config);

    let flag = coordinator.cancellation();
    let watched = provider.clone();
    let canceller = tokio::spawn(async move {
        while watched.call_count() < 2 {
            tokio::task::yield_now().await;
        }
        flag.cancel();
    });

    let report = coordinator
        .run(vec![DocumentInput::from_texts(
            "a",
            &["Broken paragraph", "Second paragraph", "Third paragraph"],
        )])
        .await;
    canceller.await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert_eq!(
        report.outcome("a").unwrap().status,
        DocumentStatus::Cancelled {
            failed: vec!["a#0".to_string()]
        }
    );
    let results = &report.outcome("a").unwrap().report.results;
    assert!(results[1].is_success());
    assert!(results[2].is_cancelled());
}

/// Term counts start from zero on every run of a coordinator
#[tokio::test]
async fn test_run_secondBatch_shouldNotCountEarlierTerms() {
    let provider = MockProvider::working();
    let mut coordinator = coordinator(&provider, BatchConfig::default());

    let first = coordinator
        .run(vec![
            DocumentInput::from_texts("a", &["Invoice"]),
            DocumentInput::from_texts("b", &["Invoice"]),
        ])
        .await;
    assert_eq!(first.candidates, vec![("Invoice".to_string(), 2)]);

    let second = coordinator
        .run(vec![DocumentInput::from_texts("c", &["Invoice", "Receipt"])])
        .await;

    assert!(second.candidates.is_empty());
    assert_eq!(coordinator.context().terms.count("invoice"), 1);
    assert_eq!(coordinator.context().terms.len(), 2);
}

/// Shared memory carries translations across documents and batches
#[tokio::test]
async fn test_run_sharedMemory_shouldServeLaterBatches() {
    let provider = MockProvider::working();
    let context = BatchContext::new(Arc::new(TranslationMemory::in_memory()), Arc::new(Glossary::new()));

    let mut first = coordinator_over(&provider, BatchConfig::default(), context.clone());
    first
        .run(vec![DocumentInput::from_texts("a", &["Safety instructions"])])
        .await;

    let mut second = coordinator_over(&provider, BatchConfig::default(), context);
    let report = second
        .run(vec![DocumentInput::from_texts("b", &["Safety instructions"])])
        .await;

    assert_eq!(provider.call_count(), 1);
    let result = &report.outcome("b").unwrap().report.results[0];
    assert_eq!(result.resolution, Some(Resolution::Memory));
    assert_eq!(result.translated_text.as_deref(), Some("Safety instructions [it]"));
}

/// Locked fragments are returned untouched and not counted as terms
#[tokio::test]
async fn test_run_lockedFragments_shouldPassThrough() {
    let provider = MockProvider::working();
    let mut coordinator = coordinator(&provider, BatchConfig::default());
    let mut document = DocumentInput::from_texts("a", &["Invoice"]);
    document.segments = document.segments.into_iter().map(|s| s.locked()).collect();

    let report = coordinator
        .run(vec![document, DocumentInput::from_texts("b", &["Invoice"])])
        .await;

    assert_eq!(provider.call_count(), 1);
    assert!(report.candidates.is_empty());
    let locked = &report.outcome("a").unwrap().report.results[0];
    assert_eq!(locked.resolution, Some(Resolution::Passthrough));
    assert_eq!(locked.translated_text.as_deref(), Some("Invoice"));
}
