/*!
 * Mock provider for testing.
 *
 * This module provides an instrumented provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds
 * - `MockProvider::fail_times(n, error)` - Fails the first n calls, then succeeds
 * - `MockProvider::failing(error)` - Always fails with the given error
 * - `MockProvider::slow(delay_ms)` - Succeeds after a delay
 *
 * Every provider counts calls and records the highest number of calls in
 * flight at the same time.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{TranslationProvider, TranslationRequest, TranslationResponse};
use crate::segment::normalize_text;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails the first `failures` calls with `error`, then succeeds
    FailTimes { failures: usize, error: ProviderError },
    /// Always fails with `error`
    Failing(ProviderError),
}

/// Counts one call in flight until dropped
///
/// Dropping covers calls abandoned by a timeout as well as finished ones.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<AtomicUsize>, high_water: &AtomicUsize) -> Self {
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(current, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Delay before each response
    latency: Option<Duration>,
    /// Fixed translations by normalized source text
    translations: HashMap<String, String>,
    /// Source texts that always fail with the given error
    failures_for: HashMap<String, ProviderError>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&TranslationRequest) -> String>,
    /// Calls made, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Calls currently in flight
    in_flight: Arc<AtomicUsize>,
    /// Highest `in_flight` value seen
    high_water: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            latency: None,
            translations: HashMap::new(),
            failures_for: HashMap::new(),
            custom_response: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            high_water: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that fails `failures` times before succeeding
    pub fn fail_times(failures: usize, error: ProviderError) -> Self {
        Self::new(MockBehavior::FailTimes { failures, error })
    }

    /// Create a failing mock provider that always errors
    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a working mock that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::working().with_latency(Duration::from_millis(delay_ms))
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer the given source texts with fixed translations
    pub fn with_translations(mut self, pairs: &[(&str, &str)]) -> Self {
        for (source, target) in pairs {
            self.translations.insert(normalize_text(source), target.to_string());
        }
        self
    }

    /// Always fail for one source text
    pub fn with_failure_for(mut self, source: &str, error: ProviderError) -> Self {
        self.failures_for.insert(normalize_text(source), error);
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&TranslationRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Calls currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    /// Copy of every request received
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls received for one source text
    pub fn calls_for(&self, source: &str) -> usize {
        let normalized = normalize_text(source);
        self.requests
            .lock()
            .iter()
            .filter(|r| normalize_text(&r.source_text) == normalized)
            .count()
    }

    fn respond(&self, request: &TranslationRequest) -> String {
        if let Some(generator) = self.custom_response {
            return generator(request);
        }
        match self.translations.get(&normalize_text(&request.source_text)) {
            Some(target) => target.clone(),
            None => format!("{} [{}]", request.source_text.trim(), request.target_language),
        }
    }

    async fn answer(&self, count: usize, request: &TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.failures_for.get(&normalize_text(&request.source_text)) {
            return Err(error.clone());
        }

        match &self.behavior {
            MockBehavior::Working => Ok(TranslationResponse {
                target_text: self.respond(request),
            }),
            MockBehavior::FailTimes { failures, error } => {
                if count < *failures {
                    Err(error.clone())
                } else {
                    Ok(TranslationResponse {
                        target_text: self.respond(request),
                    })
                }
            }
            MockBehavior::Failing(error) => Err(error.clone()),
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            latency: self.latency,
            translations: self.translations.clone(),
            failures_for: self.failures_for.clone(),
            custom_response: self.custom_response,
            request_count: Arc::clone(&self.request_count),
            in_flight: Arc::clone(&self.in_flight),
            high_water: Arc::clone(&self.high_water),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
    async fn translate(&self, request: TranslationRequest) -> Result<TranslationResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let _guard = InFlightGuard::enter(&self.in_flight, &self.high_water);
        self.answer(count, &request).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}
