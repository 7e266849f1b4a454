/*!
 * End-to-end scheduler runs over a mock provider
 */

use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

use pagetrans::consistency::ConsistencyConfig;
use pagetrans::errors::ProviderError;
use pagetrans::glossary::Glossary;
use pagetrans::memory::TranslationMemory;
use pagetrans::providers::MockProvider;
use pagetrans::scheduler::{Resolution, SchedulerConfig, TranslationScheduler};

use crate::common;

fn scheduler_over(provider: &MockProvider, memory: Arc<TranslationMemory>, config: SchedulerConfig) -> TranslationScheduler {
    TranslationScheduler::new(
        config,
        Arc::new(provider.clone()),
        memory,
        Arc::new(Glossary::new()),
        ConsistencyConfig::default(),
    )
}

/// Repeated text is translated once and shared by every occurrence
#[tokio::test]
async fn test_run_repeatedText_shouldCallProviderOnce() {
    common::init_logs();
    let provider = MockProvider::working();
    let scheduler = common::scheduler_with(&provider, common::fast_config());

    let report = scheduler
        .run(vec![
            common::segment("Hello world", "it"),
            common::segment("Hello world", "it"),
            common::segment("Hello world", "it"),
        ])
        .await;

    assert_eq!(provider.call_count(), 1);
    assert_eq!(report.stats.unique_keys, 1);
    let texts: HashSet<_> = report.results.iter().map(|r| r.translated_text.clone()).collect();
    assert_eq!(texts.len(), 1);
    assert_eq!(report.results[0].translated_text.as_deref(), Some("Hello world [it]"));
}

/// A near match in memory is reused and flagged instead of translated
#[tokio::test]
async fn test_run_nearMatchInMemory_shouldReuseWithReviewFlag() {
    common::init_logs();
    let memory = Arc::new(TranslationMemory::in_memory());
    memory.record("Hello world", "Ciao mondo", "en", "it").unwrap();
    let provider = MockProvider::working();
    let scheduler = scheduler_over(&provider, Arc::clone(&memory), common::fast_config());

    let report = scheduler.run(vec![common::segment("Hello, world!", "it")]).await;
    let result = &report.results[0];

    assert_eq!(provider.call_count(), 0);
    assert!(matches!(result.resolution, Some(Resolution::Fuzzy { similarity }) if similarity >= 0.85));
    assert_eq!(result.translated_text.as_deref(), Some("Ciao mondo"));
    assert!(result.needs_review);
    assert_eq!(report.stats.fuzzy_hits, 1);
    // Fuzzy reuse does not create an entry
    assert_eq!(memory.len(), 1);
}

/// With fuzzy reuse off a near match goes to the provider
#[tokio::test]
async fn test_run_fuzzyReuseDisabled_shouldCallProvider() {
    let memory = Arc::new(TranslationMemory::in_memory());
    memory.record("Hello world", "Ciao mondo", "en", "it").unwrap();
    let provider = MockProvider::working();
    let config = SchedulerConfig {
        fuzzy_reuse: false,
        ..common::fast_config()
    };
    let scheduler = scheduler_over(&provider, Arc::clone(&memory), config);

    let report = scheduler.run(vec![common::segment("Hello, world!", "it")]).await;

    assert_eq!(provider.call_count(), 1);
    assert_eq!(report.results[0].resolution, Some(Resolution::Provider));
    assert!(!report.results[0].needs_review);
    assert_eq!(memory.len(), 2);
}

/// Two rate-limit errors then success: three attempts, one result
#[tokio::test]
async fn test_run_transientErrorsThenSuccess_shouldSucceedOnThirdAttempt() {
    common::init_logs();
    let provider = MockProvider::fail_times(2, ProviderError::RateLimitExceeded("429".to_string()));
    let scheduler = common::scheduler_with(&provider, common::fast_config());

    let report = scheduler.run(vec![common::segment("Close the door", "it")]).await;
    let result = &report.results[0];

    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(result.resolution, Some(Resolution::Provider));
    assert_eq!(provider.call_count(), 3);
    assert_eq!(report.stats.retries, 2);
    assert!(report.is_complete());
}

/// Fifty distinct segments never exceed the concurrency limit
#[tokio::test]
async fn test_run_manySegments_shouldRespectConcurrencyLimit() {
    common::init_logs();
    let provider = MockProvider::slow(20);
    let config = SchedulerConfig {
        max_concurrent_requests: 5,
        ..common::fast_config()
    };
    let scheduler = common::scheduler_with(&provider, config);

    let texts: Vec<String> = (1..=50).map(|i| format!("Paragraph number {}", i)).collect();
    let segments = texts.iter().map(|t| common::segment(t, "it")).collect();
    let report = scheduler.run(segments).await;

    assert_eq!(provider.call_count(), 50);
    assert!(provider.max_in_flight() <= 5);
    assert!(provider.max_in_flight() >= 2);
    assert!(report.is_complete());

    // Results come back in input order
    for (result, text) in report.results.iter().zip(&texts) {
        assert_eq!(&result.segment.source_text, text);
        assert_eq!(result.translated_text.as_deref(), Some(format!("{} [it]", text).as_str()));
    }
}

/// Running the same input again gives the same output from memory
#[tokio::test]
async fn test_run_twice_shouldBeIdempotent() {
    let provider = MockProvider::working();
    let memory = Arc::new(TranslationMemory::in_memory());
    let scheduler = scheduler_over(&provider, memory, common::fast_config());
    let inputs = || {
        ["Open the valve", "Close the valve", "Open the valve", "Check pressure"]
            .iter()
            .map(|t| common::segment(t, "it"))
            .collect::<Vec<_>>()
    };

    let first = scheduler.run(inputs()).await;
    let calls = provider.call_count();
    let second = scheduler.run(inputs()).await;

    assert_eq!(calls, 3);
    assert_eq!(provider.call_count(), calls);
    assert_eq!(second.stats.cache_hits, 4);
    let texts = |report: &pagetrans::RunReport| {
        report
            .results
            .iter()
            .map(|r| r.translated_text.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(texts(&first), texts(&second));
}

/// Provider calls never exceed the number of distinct texts
#[tokio::test]
async fn test_run_randomDuplicates_shouldCallOncePerDistinctText() {
    let vocabulary: Vec<String> = (0..10).map(|i| format!("Instruction step {}", i)).collect();
    let mut rng = rand::rng();

    for _ in 0..5 {
        let provider = MockProvider::working();
        let scheduler = common::scheduler_with(&provider, common::fast_config());

        let picks: Vec<&String> = (0..60)
            .map(|_| &vocabulary[rng.random_range(0..vocabulary.len())])
            .collect();
        let distinct: HashSet<&String> = picks.iter().copied().collect();

        let report = scheduler
            .run(picks.iter().map(|t| common::segment(t, "it")).collect())
            .await;

        assert_eq!(provider.call_count(), distinct.len());
        assert_eq!(report.stats.unique_keys, distinct.len());
        assert_eq!(report.stats.duplicates_collapsed, picks.len() - distinct.len());
        assert_eq!(report.results.len(), picks.len());
    }
}

/// Provider requests carry glossary hints for terms in the text
#[tokio::test]
async fn test_run_withGlossaryTerm_shouldSendHint() {
    let provider = MockProvider::working().with_translations(&[(
        "Send the invoice by mail.",
        "Inviare la fattura per posta.",
    )]);
    let glossary = Arc::new(Glossary::new());
    glossary
        .record("Invoice", "it", "Fattura", pagetrans::GlossaryScope::Global)
        .unwrap();
    let scheduler = TranslationScheduler::new(
        common::fast_config(),
        Arc::new(provider.clone()),
        Arc::new(TranslationMemory::in_memory()),
        glossary,
        ConsistencyConfig::default(),
    );

    let report = scheduler.run(vec![common::segment("Send the invoice by mail.", "it")]).await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].glossary, vec![("Invoice".to_string(), "Fattura".to_string())]);
    assert!(report.results[0].issues.is_empty());
}

/// Corrected provider output is written back to memory
#[tokio::test]
async fn test_run_correctedOutput_shouldUpdateMemory() {
    let provider = MockProvider::working().with_translations(&[("Price: 12.50", "prezzo: 12.50")]);
    let memory = Arc::new(TranslationMemory::in_memory());
    let scheduler = scheduler_over(&provider, Arc::clone(&memory), common::fast_config());

    let report = scheduler.run(vec![common::segment("Price: 12.50", "it")]).await;

    assert_eq!(report.results[0].translated_text.as_deref(), Some("Prezzo: 12,50"));
    assert!(report.results[0].auto_corrected);
    let entry = memory.lookup_exact("Price: 12.50", "en", "it").unwrap();
    assert_eq!(entry.target_text, "Prezzo: 12,50");
}
