/*!
 * Concurrent translation scheduler.
 *
 * Resolves every segment of a run:
 * - exact translation memory hits resolve at once
 * - otherwise a fuzzy hit at or above the threshold is reused and flagged
 * - remaining segments are deduplicated by key, so each unique miss costs at
 *   most one successful provider call
 * - misses go to the provider through a bounded pool with retry and backoff
 *
 * Every resolved text then passes through the consistency checker.
 *
 * # Architecture
 *
 * - `retry`: the job state machine and backoff policy
 * - `job`: jobs, per-segment results and the run report
 */

pub mod job;
pub mod retry;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use uuid::Uuid;

use crate::consistency::{ConsistencyChecker, ConsistencyConfig};
use crate::context::{DomainContext, context_prompt, detect_domain};
use crate::errors::{EngineError, ProviderError};
use crate::glossary::Glossary;
use crate::memory::TranslationMemory;
use crate::providers::{TranslationProvider, TranslationRequest};
use crate::segment::{RawSegment, Segment, SegmentKey, is_translatable_text, truncate_text};

pub use job::{Resolution, RunManifest, RunReport, RunStats, SegmentResult, TranslationJob};
pub use retry::{JobEvent, JobState, RetryPolicy};

/// Progress callback: (resolved unique keys, total unique keys)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Progress callback that forwards updates to a channel
pub fn channel_progress(sender: mpsc::UnboundedSender<(usize, usize)>) -> ProgressCallback {
    Arc::new(move |resolved, total| {
        // A dropped receiver only means nobody listens any more
        let _ = sender.send((resolved, total));
    })
}

/// Run-level cancellation
///
/// Once cancelled, no new provider call starts. Calls in flight finish or
/// time out; jobs not yet dispatched fail as cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a flag that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop new dispatches
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Provider calls allowed in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Attempts per job, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff after the first transient failure in milliseconds
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Upper bound of any backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Reuse similar memory entries instead of calling the provider
    #[serde(default = "default_true")]
    pub fuzzy_reuse: bool,

    /// Minimum similarity for fuzzy reuse
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Shorter segments are passed through untranslated
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length: usize,

    /// Write consistency corrections back into the memory
    #[serde(default = "default_true")]
    pub persist_corrections: bool,

    /// Detect the document domain and send it as a context hint
    #[serde(default = "default_true")]
    pub detect_domain: bool,

    /// User-supplied document context, sent instead of the detected domain
    #[serde(default)]
    pub document_context: Option<String>,
}

fn default_max_concurrent_requests() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_true() -> bool {
    true
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

fn default_min_segment_length() -> usize {
    2
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fuzzy_reuse: true,
            fuzzy_threshold: default_fuzzy_threshold(),
            min_segment_length: default_min_segment_length(),
            persist_corrections: true,
            detect_domain: true,
            document_context: None,
        }
    }
}

impl SchedulerConfig {
    /// Retry policy derived from the configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Where the canonical segment of a key was resolved from
enum Lookup {
    Memory(String),
    Fuzzy(String, f64),
    Miss,
}

/// Bounded concurrent scheduler over a shared memory and glossary
#[derive(Clone)]
pub struct TranslationScheduler {
    config: SchedulerConfig,
    provider: Arc<dyn TranslationProvider>,
    memory: Arc<TranslationMemory>,
    glossary: Arc<Glossary>,
    checker: ConsistencyChecker,
    cancellation: CancellationFlag,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for TranslationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationScheduler")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("memory_entries", &self.memory.len())
            .field("glossary_entries", &self.glossary.len())
            .finish()
    }
}

impl TranslationScheduler {
    /// Create a scheduler
    pub fn new(
        config: SchedulerConfig,
        provider: Arc<dyn TranslationProvider>,
        memory: Arc<TranslationMemory>,
        glossary: Arc<Glossary>,
        consistency: ConsistencyConfig,
    ) -> Self {
        let checker = ConsistencyChecker::new(consistency, Arc::clone(&glossary));
        Self {
            config,
            provider,
            memory,
            glossary,
            checker,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Report progress through a callback
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Use an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The run's cancellation flag
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The checker applied to every result
    pub fn checker(&self) -> &ConsistencyChecker {
        &self.checker
    }

    /// Translate raw fragments from the document collaborator
    ///
    /// Fragments flagged non-translatable are passed through unchanged.
    pub async fn run_raw(
        &self,
        raw_segments: &[RawSegment],
        source_language: &str,
        target_language: &str,
    ) -> RunReport {
        let inputs = raw_segments
            .iter()
            .map(|raw| {
                (
                    Segment::from_raw(raw, source_language, target_language, None),
                    raw.translatable,
                )
            })
            .collect();
        self.run_inner(inputs).await
    }

    /// Translate segments; results come back in input order
    pub async fn run(&self, segments: Vec<Segment>) -> RunReport {
        let inputs = segments.into_iter().map(|s| (s, true)).collect();
        self.run_inner(inputs).await
    }

    async fn run_inner(&self, inputs: Vec<(Segment, bool)>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut stats = RunStats {
            total_segments: inputs.len(),
            ..RunStats::default()
        };
        let mut results: Vec<Option<SegmentResult>> = vec![None; inputs.len()];

        // Group translatable inputs by key, first occurrence first
        let mut groups: Vec<(SegmentKey, Vec<usize>)> = Vec::new();
        let mut group_of: HashMap<SegmentKey, usize> = HashMap::new();
        for (index, (segment, translatable)) in inputs.iter().enumerate() {
            if !translatable || !is_translatable_text(&segment.normalized_text, self.config.min_segment_length) {
                results[index] = Some(SegmentResult::resolved(
                    segment.clone(),
                    segment.source_text.clone(),
                    Resolution::Passthrough,
                    0,
                ));
                continue;
            }
            match group_of.get(&segment.key) {
                Some(&group) => groups[group].1.push(index),
                None => {
                    group_of.insert(segment.key.clone(), groups.len());
                    groups.push((segment.key.clone(), vec![index]));
                }
            }
        }

        let total = groups.len();
        stats.unique_keys = total;
        let resolved = AtomicUsize::new(0);

        let domain = if self.config.detect_domain {
            detect_domain(
                inputs
                    .iter()
                    .filter(|(_, translatable)| *translatable)
                    .map(|(segment, _)| segment.source_text.as_str()),
            )
        } else {
            DomainContext::generic()
        };
        if domain.is_specific() {
            info!(
                "Run {}: detected {} document (confidence {:.2})",
                run_id, domain.domain, domain.confidence
            );
        }
        let domain_hint = context_prompt(&domain, self.config.document_context.as_deref());

        info!(
            "Run {}: {} segment(s), {} unique key(s)",
            run_id,
            inputs.len(),
            total
        );

        // Memory pass
        let mut jobs: Vec<TranslationJob> = Vec::new();
        for (_, members) in &groups {
            let canonical = &inputs[members[0]].0;
            match self.lookup(canonical) {
                Lookup::Memory(text) => {
                    for &index in members {
                        if index != members[0] {
                            self.memory.lookup_exact(
                                &inputs[index].0.source_text,
                                &inputs[index].0.source_language,
                                &inputs[index].0.target_language,
                            );
                        }
                        stats.cache_hits += 1;
                        results[index] = Some(
                            self.checked(
                                SegmentResult::resolved(inputs[index].0.clone(), text.clone(), Resolution::Memory, 0),
                                true,
                            )
                            .await,
                        );
                    }
                    self.report_progress(resolved.fetch_add(1, Ordering::SeqCst) + 1, total);
                }
                Lookup::Fuzzy(text, similarity) => {
                    for &index in members {
                        stats.fuzzy_hits += 1;
                        results[index] = Some(
                            self.checked(
                                SegmentResult::resolved(
                                    inputs[index].0.clone(),
                                    text.clone(),
                                    Resolution::Fuzzy { similarity },
                                    0,
                                ),
                                false,
                            )
                            .await,
                        );
                    }
                    self.report_progress(resolved.fetch_add(1, Ordering::SeqCst) + 1, total);
                }
                Lookup::Miss => jobs.push(TranslationJob::new(canonical.clone(), members.clone())),
            }
        }

        // Provider pass
        if !jobs.is_empty() {
            debug!("Run {}: dispatching {} unique miss(es)", run_id, jobs.len());
        }
        let limit = self.config.max_concurrent_requests.max(1);
        let semaphore = Semaphore::new(limit);
        let finished: Vec<TranslationJob> = stream::iter(jobs)
            .map(|job| {
                let semaphore = &semaphore;
                let resolved = &resolved;
                let domain_hint = domain_hint.as_deref();
                async move {
                    let job = self.execute(job, semaphore, domain_hint).await;
                    self.report_progress(resolved.fetch_add(1, Ordering::SeqCst) + 1, total);
                    job
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for job in finished {
            let attempts = job.attempts();
            stats.provider_calls += attempts as usize;
            stats.retries += attempts.saturating_sub(1) as usize;

            match job.result {
                Some(Ok(text)) => {
                    let canonical = job.members[0];
                    let canonical_result = self
                        .checked(
                            SegmentResult::resolved(job.segment.clone(), text, Resolution::Provider, attempts),
                            true,
                        )
                        .await;
                    // Duplicates resolve strictly after their canonical job
                    for &index in &job.members[1..] {
                        stats.duplicates_collapsed += 1;
                        let mut duplicate = canonical_result.clone();
                        duplicate.segment = inputs[index].0.clone();
                        duplicate.resolution = Some(Resolution::Duplicate);
                        results[index] = Some(duplicate);
                    }
                    results[canonical] = Some(canonical_result);
                }
                Some(Err(error)) => {
                    for &index in &job.members {
                        results[index] = Some(SegmentResult::failed(inputs[index].0.clone(), error.clone(), attempts));
                    }
                }
                None => {
                    for &index in &job.members {
                        results[index] =
                            Some(SegmentResult::failed(inputs[index].0.clone(), EngineError::Cancelled, attempts));
                    }
                }
            }
        }

        if let Err(e) = self.memory.flush_async().await {
            warn!("Run {}: failed to flush translation memory: {}", run_id, e);
        }

        let results: Vec<SegmentResult> = results
            .into_iter()
            .zip(inputs)
            .map(|(result, (segment, _))| {
                result.unwrap_or_else(|| SegmentResult::failed(segment, EngineError::Cancelled, 0))
            })
            .collect();

        let report = RunReport::new(run_id, results, stats, domain, started.elapsed());
        info!(
            "Run {} finished in {:?}: {} succeeded, {} failed, {} auto-corrected, {} need review ({} provider call(s), {} cache hit(s), {} fuzzy hit(s))",
            run_id,
            report.duration,
            report.manifest.succeeded,
            report.manifest.failed,
            report.manifest.auto_corrected,
            report.manifest.needs_review,
            report.stats.provider_calls,
            report.stats.cache_hits,
            report.stats.fuzzy_hits
        );
        report
    }

    fn lookup(&self, segment: &Segment) -> Lookup {
        if let Some(entry) =
            self.memory
                .lookup_exact(&segment.source_text, &segment.source_language, &segment.target_language)
        {
            return Lookup::Memory(entry.target_text);
        }

        if self.config.fuzzy_reuse {
            if let Some(found) = self.memory.lookup_fuzzy(
                &segment.source_text,
                &segment.source_language,
                &segment.target_language,
                self.config.fuzzy_threshold,
            ) {
                return Lookup::Fuzzy(found.entry.target_text, found.similarity);
            }
        }

        Lookup::Miss
    }

    /// Run the consistency checker over a resolved result
    ///
    /// With `persist` set, a corrected text replaces the memory entry of the
    /// segment.
    async fn checked(&self, mut result: SegmentResult, persist: bool) -> SegmentResult {
        let Some(text) = result.translated_text.clone() else {
            return result;
        };

        let outcome = self.checker.check(&result.segment, &text);
        if persist && self.config.persist_corrections && outcome.corrected_text != text {
            let segment = &result.segment;
            if let Err(e) = self
                .memory
                .record_correction_async(
                    &segment.source_text,
                    &outcome.corrected_text,
                    &segment.source_language,
                    &segment.target_language,
                )
                .await
            {
                warn!(
                    "Correction for '{}' kept in memory only: {}",
                    truncate_text(&segment.normalized_text, 30),
                    e
                );
            }
        }

        result.annotate(outcome.corrected_text, outcome.issues);
        result
    }

    /// Drive one job through the retry state machine
    async fn execute(&self, mut job: TranslationJob, semaphore: &Semaphore, domain_hint: Option<&str>) -> TranslationJob {
        let policy = self.config.retry_policy();
        let mut last_error: Option<ProviderError> = None;

        loop {
            if self.cancellation.is_cancelled() {
                job.state = job.state.on_event(JobEvent::Cancel, &policy);
                let error = match last_error {
                    Some(error) => EngineError::from_provider(error, job.attempts()),
                    None => EngineError::Cancelled,
                };
                debug!(
                    "Job for '{}' not dispatched: run cancelled",
                    truncate_text(&job.segment.normalized_text, 30)
                );
                job.result = Some(Err(error));
                return job;
            }

            let outcome = {
                let Ok(_permit) = semaphore.acquire().await else {
                    job.state = job.state.on_event(JobEvent::Cancel, &policy);
                    job.result = Some(Err(EngineError::Cancelled));
                    return job;
                };
                job.state = job.state.on_event(JobEvent::Dispatch, &policy);
                self.call_provider(&job.segment, domain_hint).await
            };

            match outcome {
                Ok(text) => {
                    job.state = job.state.on_event(JobEvent::Success, &policy);
                    let segment = &job.segment;
                    if let Err(e) = self
                        .memory
                        .record_async(
                            &segment.source_text,
                            &text,
                            &segment.source_language,
                            &segment.target_language,
                        )
                        .await
                    {
                        warn!(
                            "Translated '{}' but not cached: {}",
                            truncate_text(&segment.normalized_text, 30),
                            e
                        );
                    }
                    job.result = Some(Ok(text));
                    return job;
                }
                Err(error) => {
                    job.state = job.state.on_event(JobEvent::Failure(error.kind()), &policy);
                    match job.state {
                        JobState::RetryWait { attempt, delay } => {
                            warn!(
                                "Attempt {} for '{}' failed: {}. Retrying in {:?}",
                                attempt,
                                truncate_text(&job.segment.normalized_text, 30),
                                error,
                                delay
                            );
                            last_error = Some(error);
                            tokio::time::sleep(delay).await;
                        }
                        _ => {
                            warn!(
                                "Giving up on '{}' after {} attempt(s): {}",
                                truncate_text(&job.segment.normalized_text, 30),
                                job.attempts(),
                                error
                            );
                            job.result = Some(Err(EngineError::from_provider(error, job.attempts())));
                            return job;
                        }
                    }
                }
            }
        }
    }

    async fn call_provider(&self, segment: &Segment, domain_hint: Option<&str>) -> Result<String, ProviderError> {
        let hints = [
            domain_hint.map(str::to_string),
            segment.context_tag.clone(),
            self.glossary
                .protection_note(&segment.normalized_text, &segment.target_language),
        ];
        let context_hint: Vec<String> = hints.into_iter().flatten().collect();

        let request = TranslationRequest::new(&segment.source_text, &segment.source_language, &segment.target_language)
            .with_glossary(self.glossary.hints_for(&segment.normalized_text, &segment.target_language))
            .with_context_hint((!context_hint.is_empty()).then(|| context_hint.join("; ")));

        let timeout_ms = self.config.request_timeout_ms;
        let response = tokio::time::timeout(Duration::from_millis(timeout_ms), self.provider.translate(request))
            .await
            .map_err(|_| ProviderError::Timeout(timeout_ms))??;

        if response.target_text.trim().is_empty() {
            return Err(ProviderError::ParseError("Empty translation".to_string()));
        }
        Ok(response.target_text)
    }

    fn report_progress(&self, resolved: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(resolved, total);
        }
    }
}
