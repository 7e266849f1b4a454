/*!
 * Batch coordination.
 *
 * Runs the scheduler over several documents that share one translation
 * memory and one glossary:
 * - a pre-pass counts candidate terms across every document
 * - frequent terms can be translated up front to seed the glossary
 * - after each document, frequent terms still missing from the glossary are
 *   seeded from segments that consist of the term alone
 * - every document gets its own outcome; one failing document does not stop
 *   the others
 * - batch-scoped glossary entries are dropped at the end unless promoted
 */

use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::consistency::ConsistencyIssue;
use crate::errors::EngineError;
use crate::glossary::{Glossary, TermExtractor};
use crate::memory::TranslationMemory;
use crate::scheduler::{CancellationFlag, Resolution, RunReport, TranslationScheduler};
use crate::segment::{RawSegment, Segment, SegmentContext, is_translatable_text, normalize_text};

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Occurrences across the batch for a term to become a candidate
    #[serde(default = "default_term_frequency_threshold")]
    pub term_frequency_threshold: usize,

    /// Most candidates considered per batch
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Translate candidates on their own before the documents
    #[serde(default)]
    pub translate_frequent_terms: bool,

    /// Seed the glossary from translated candidate segments
    #[serde(default = "default_true")]
    pub seed_glossary: bool,

    /// Keep batch-scoped glossary entries as global ones after the batch
    #[serde(default)]
    pub promote_batch_terms: bool,
}

fn default_term_frequency_threshold() -> usize {
    2
}

fn default_max_candidates() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            term_frequency_threshold: default_term_frequency_threshold(),
            max_candidates: default_max_candidates(),
            translate_frequent_terms: false,
            seed_glossary: true,
            promote_batch_terms: false,
        }
    }
}

/// Term frequencies across a batch
#[derive(Debug, Default)]
pub struct TermStatistics {
    /// Occurrences by lowercased term
    counts: DashMap<String, AtomicUsize>,
    /// First spelling seen by lowercased term
    spellings: DashMap<String, String>,
}

impl TermStatistics {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence
    pub fn record(&self, term: &str) {
        let folded = term.to_lowercase();
        self.spellings
            .entry(folded.clone())
            .or_insert_with(|| term.to_string());
        self.counts
            .entry(folded)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Occurrences of a term, case-insensitively
    pub fn count(&self, term: &str) -> usize {
        self.counts
            .get(&term.to_lowercase())
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Distinct terms seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no term was seen
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Forget every count
    pub fn clear(&self) {
        self.counts.clear();
        self.spellings.clear();
    }

    /// Terms seen at least `threshold` times, most frequent first
    pub fn frequent(&self, threshold: usize) -> Vec<(String, usize)> {
        let mut terms: Vec<(String, usize)> = self
            .counts
            .iter()
            .filter_map(|entry| {
                let count = entry.value().load(Ordering::Relaxed);
                (count >= threshold).then(|| {
                    let spelling = self
                        .spellings
                        .get(entry.key())
                        .map(|s| s.value().clone())
                        .unwrap_or_else(|| entry.key().clone());
                    (spelling, count)
                })
            })
            .collect();

        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms
    }
}

/// State shared by every document of a batch
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Shared translation memory
    pub memory: Arc<TranslationMemory>,
    /// Shared glossary
    pub glossary: Arc<Glossary>,
    /// Documents of the run, in submission order
    pub documents: Vec<String>,
    /// Term frequencies of the current run
    pub terms: Arc<TermStatistics>,
}

impl BatchContext {
    /// Create a context over a memory and a glossary
    pub fn new(memory: Arc<TranslationMemory>, glossary: Arc<Glossary>) -> Self {
        Self {
            memory,
            glossary,
            documents: Vec::new(),
            terms: Arc::new(TermStatistics::new()),
        }
    }
}

/// One document handed to the batch
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Document identifier
    pub document_id: String,
    /// Fragments in document order
    pub segments: Vec<RawSegment>,
}

impl DocumentInput {
    /// Build a document from plain texts, one location per text
    pub fn from_texts(document_id: &str, texts: &[&str]) -> Self {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| RawSegment::new(document_id, &format!("{}#{}", document_id, i), text))
            .collect();
        Self {
            document_id: document_id.to_string(),
            segments,
        }
    }
}

/// How a document ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Every segment has a translation
    Complete,
    /// Some segments failed; their locations are listed
    Partial { failed: Vec<String> },
    /// The batch was cancelled before the document finished; segments that
    /// had already failed on their own are listed
    Cancelled { failed: Vec<String> },
}

/// Result of one document
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    /// Document identifier
    pub document_id: String,
    /// How the document ended
    pub status: DocumentStatus,
    /// The scheduler run of the document
    pub report: RunReport,
}

/// Result of a whole batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Per-document outcomes in submission order
    pub outcomes: Vec<DocumentOutcome>,
    /// Frequent terms found by the pre-pass
    pub candidates: Vec<(String, usize)>,
    /// Glossary entries seeded during the batch
    pub seeded_terms: usize,
    /// Batch entries promoted to global scope
    pub promoted_terms: usize,
    /// Sources translated differently across the batch
    pub divergences: Vec<ConsistencyIssue>,
}

impl BatchReport {
    /// Outcome of one document
    pub fn outcome(&self, document_id: &str) -> Option<&DocumentOutcome> {
        self.outcomes.iter().find(|o| o.document_id == document_id)
    }

    /// Whether every document translated completely
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == DocumentStatus::Complete)
    }

    /// `PartialBatchFailure` when some document is incomplete
    pub fn failure(&self) -> Option<EngineError> {
        let failed_documents: Vec<String> = self
            .outcomes
            .iter()
            .filter(|o| o.status != DocumentStatus::Complete)
            .map(|o| o.document_id.clone())
            .collect();

        if failed_documents.is_empty() {
            return None;
        }

        let failed_segments = self.outcomes.iter().map(|o| o.report.manifest.failed).sum();
        Some(EngineError::PartialBatchFailure {
            failed_documents,
            failed_segments,
        })
    }

    /// The report, or `PartialBatchFailure` when some document is incomplete
    pub fn into_result(self) -> Result<BatchReport, EngineError> {
        match self.failure() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Runs documents through one scheduler with a shared context
#[derive(Debug)]
pub struct BatchCoordinator {
    config: BatchConfig,
    context: BatchContext,
    scheduler: TranslationScheduler,
    extractor: TermExtractor,
    source_language: String,
    target_language: String,
}

impl BatchCoordinator {
    /// Create a coordinator
    ///
    /// The scheduler must work on the context's memory and glossary.
    pub fn new(
        config: BatchConfig,
        context: BatchContext,
        scheduler: TranslationScheduler,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        Self {
            config,
            context,
            scheduler,
            extractor: TermExtractor::with_defaults(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }

    /// Use a custom term extractor
    pub fn with_extractor(mut self, extractor: TermExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Shared batch state
    pub fn context(&self) -> &BatchContext {
        &self.context
    }

    /// The batch's cancellation flag
    pub fn cancellation(&self) -> CancellationFlag {
        self.scheduler.cancellation()
    }

    /// Translate every document
    pub async fn run(&mut self, documents: Vec<DocumentInput>) -> BatchReport {
        self.context.documents = documents.iter().map(|d| d.document_id.clone()).collect();
        self.context.terms.clear();
        info!(
            "Batch of {} document(s), {} -> {}",
            documents.len(),
            self.source_language,
            self.target_language
        );

        self.count_terms(&documents);
        let candidates: Vec<(String, usize)> = self
            .context
            .terms
            .frequent(self.config.term_frequency_threshold)
            .into_iter()
            .take(self.config.max_candidates)
            .collect();
        debug!("Batch term candidates: {:?}", candidates);

        let mut seeded_terms = 0;
        if self.config.translate_frequent_terms && !candidates.is_empty() {
            seeded_terms += self.preseed(&candidates).await;
        }

        let mut outcomes = Vec::with_capacity(documents.len());
        for document in documents {
            let report = self
                .scheduler
                .run_raw(&document.segments, &self.source_language, &self.target_language)
                .await;

            if self.config.seed_glossary {
                seeded_terms += self.seed_from(&report, &candidates);
            }

            let status = self.status_of(&report);
            match &status {
                DocumentStatus::Complete => info!("Document '{}' translated", document.document_id),
                DocumentStatus::Partial { failed } => warn!(
                    "Document '{}' partially translated: {} segment(s) failed",
                    document.document_id,
                    failed.len()
                ),
                DocumentStatus::Cancelled { failed } => warn!(
                    "Document '{}' cancelled after {} segment failure(s)",
                    document.document_id,
                    failed.len()
                ),
            }

            outcomes.push(DocumentOutcome {
                document_id: document.document_id,
                status,
                report,
            });
        }

        let divergences = self.scheduler.checker().check_divergence(
            outcomes
                .iter()
                .flat_map(|o| o.report.results.iter())
                .filter(|r| !matches!(r.resolution, Some(Resolution::Passthrough) | None))
                .filter_map(|r| r.translated_text.as_deref().map(|t| (&r.segment, t))),
        );
        if !divergences.is_empty() {
            warn!("{} segment(s) translated inconsistently across the batch", divergences.len());
        }

        let promoted_terms = self.finish_glossary();

        BatchReport {
            outcomes,
            candidates,
            seeded_terms,
            promoted_terms,
            divergences,
        }
    }

    fn count_terms(&self, documents: &[DocumentInput]) {
        let min_length = self.scheduler.config().min_segment_length;
        for document in documents {
            for raw in document.segments.iter().filter(|s| s.translatable) {
                if !is_translatable_text(&raw.text, min_length) {
                    continue;
                }
                for term in self.extractor.candidates(&raw.text) {
                    self.context.terms.record(&term);
                }
            }
        }
        debug!("Batch pre-pass found {} distinct term(s)", self.context.terms.len());
    }

    /// Translate candidate terms on their own and seed the glossary
    async fn preseed(&self, candidates: &[(String, usize)]) -> usize {
        let segments: Vec<Segment> = candidates
            .iter()
            .filter(|(term, _)| self.context.glossary.suggest(term, &self.target_language).is_none())
            .map(|(term, _)| {
                Segment::new(
                    term,
                    &self.source_language,
                    &self.target_language,
                    None,
                    SegmentContext {
                        document_id: "batch-terms".to_string(),
                        location_ref: format!("term:{}", term),
                    },
                )
            })
            .collect();

        if segments.is_empty() {
            return 0;
        }

        let report = self.scheduler.run(segments).await;
        let mut seeded = 0;
        for result in report.results.iter().filter(|r| r.is_success()) {
            if let Some(text) = &result.translated_text {
                if self
                    .context
                    .glossary
                    .record_if_absent(&result.segment.source_text, &self.target_language, text)
                {
                    seeded += 1;
                }
            }
        }
        info!("Pre-seeded {} glossary term(s)", seeded);
        seeded
    }

    /// Seed candidates from segments that are exactly the term
    ///
    /// The first translation seen wins; fuzzy reuses are never used.
    fn seed_from(&self, report: &RunReport, candidates: &[(String, usize)]) -> usize {
        if candidates.is_empty() {
            return 0;
        }

        let wanted: HashMap<String, &str> = candidates
            .iter()
            .map(|(term, _)| (normalize_text(term).to_lowercase(), term.as_str()))
            .collect();

        let mut seeded = 0;
        for result in &report.results {
            let reusable = matches!(
                result.resolution,
                Some(Resolution::Provider | Resolution::Memory | Resolution::Duplicate)
            );
            if !reusable {
                continue;
            }
            let Some(text) = &result.translated_text else {
                continue;
            };
            let Some(term) = wanted.get(&result.segment.normalized_text.to_lowercase()) else {
                continue;
            };
            if self.context.glossary.record_if_absent(term, &self.target_language, text) {
                debug!("Seeded glossary: '{}' -> '{}'", term, text);
                seeded += 1;
            }
        }
        seeded
    }

    fn status_of(&self, report: &RunReport) -> DocumentStatus {
        if report.is_complete() {
            return DocumentStatus::Complete;
        }
        let cancelled = self.scheduler.cancellation().is_cancelled() && report.failed_results().any(|r| r.is_cancelled());
        let failed = report
            .failed_results()
            .filter(|r| !r.is_cancelled())
            .map(|r| r.segment.context.location_ref.clone())
            .collect();
        if cancelled {
            DocumentStatus::Cancelled { failed }
        } else {
            DocumentStatus::Partial { failed }
        }
    }

    /// Promote or drop batch-scoped glossary entries
    fn finish_glossary(&self) -> usize {
        if self.config.promote_batch_terms {
            match self.context.glossary.promote_all() {
                Ok(promoted) => {
                    info!("Promoted {} batch term(s) to the global glossary", promoted);
                    return promoted;
                }
                Err(e) => warn!("Failed to promote batch terms: {}", e),
            }
        }

        let cleared = self.context.glossary.clear_batch_scope();
        debug!("Cleared {} batch-scoped glossary entries", cleared);
        0
    }
}
