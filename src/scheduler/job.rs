/*!
 * Jobs, per-segment results and run reports.
 */

use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::retry::JobState;
use crate::consistency::{ConsistencyIssue, ConsistencyReport, Severity};
use crate::context::DomainContext;
use crate::errors::EngineError;
use crate::segment::{Reinsertion, Segment};

/// One unique translation miss
///
/// `members` lists the input positions that share the job's key; the first
/// one is the canonical segment.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    /// Canonical segment
    pub segment: Segment,
    /// Input positions resolved by this job
    pub members: Vec<usize>,
    /// Current lifecycle state
    pub state: JobState,
    /// Translation or final error, once terminal
    pub result: Option<Result<String, EngineError>>,
}

impl TranslationJob {
    /// Create a pending job
    pub fn new(segment: Segment, members: Vec<usize>) -> Self {
        Self {
            segment,
            members,
            state: JobState::Pending,
            result: None,
        }
    }

    /// Provider calls made for this job
    pub fn attempts(&self) -> u32 {
        self.state.attempts()
    }
}

/// How a segment got its translation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Exact translation memory hit
    Memory,
    /// Similar memory entry reused, needs review
    Fuzzy { similarity: f64 },
    /// Translated by the provider
    Provider,
    /// Same key as an earlier segment of the run
    Duplicate,
    /// Not translatable, returned unchanged
    Passthrough,
}

/// Outcome for one input segment
#[derive(Debug, Clone)]
pub struct SegmentResult {
    /// The segment as submitted
    pub segment: Segment,
    /// Final text, after consistency corrections
    pub translated_text: Option<String>,
    /// Where the text came from, when resolved
    pub resolution: Option<Resolution>,
    /// Provider calls made for this segment's key
    pub attempts: u32,
    /// Consistency findings
    pub issues: Vec<ConsistencyIssue>,
    /// Whether the checker changed the text
    pub auto_corrected: bool,
    /// Whether a person should look at the result
    pub needs_review: bool,
    /// Why the segment failed
    pub error: Option<EngineError>,
}

impl SegmentResult {
    pub(crate) fn resolved(segment: Segment, text: String, resolution: Resolution, attempts: u32) -> Self {
        Self {
            segment,
            translated_text: Some(text),
            resolution: Some(resolution),
            attempts,
            issues: Vec::new(),
            auto_corrected: false,
            needs_review: matches!(resolution, Resolution::Fuzzy { .. }),
            error: None,
        }
    }

    pub(crate) fn failed(segment: Segment, error: EngineError, attempts: u32) -> Self {
        Self {
            segment,
            translated_text: None,
            resolution: None,
            attempts,
            issues: Vec::new(),
            auto_corrected: false,
            needs_review: false,
            error: Some(error),
        }
    }

    /// Whether the segment has a translation
    pub fn is_success(&self) -> bool {
        self.translated_text.is_some()
    }

    /// Whether the segment was cancelled before dispatch
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(EngineError::Cancelled))
    }

    /// Text to put back into the document
    pub fn reinsertion(&self) -> Option<Reinsertion> {
        self.translated_text.as_ref().map(|text| Reinsertion {
            location_ref: self.segment.context.location_ref.clone(),
            translated_text: text.clone(),
        })
    }

    /// Attach checker findings
    pub(crate) fn annotate(&mut self, corrected_text: String, issues: Vec<ConsistencyIssue>) {
        self.auto_corrected = issues.iter().any(|i| i.auto_fixed);
        self.needs_review = self.needs_review
            || issues
                .iter()
                .any(|i| !i.auto_fixed && i.severity >= Severity::Warning);
        self.translated_text = Some(corrected_text);
        self.issues = issues;
    }
}

/// End-of-run counts per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunManifest {
    /// Segments with a translation (pass-through excluded)
    pub succeeded: usize,
    /// Segments whose text the checker changed
    pub auto_corrected: usize,
    /// Segments flagged for review
    pub needs_review: usize,
    /// Segments without a translation
    pub failed: usize,
    /// Non-translatable segments returned unchanged
    pub passthrough: usize,
}

/// Work done during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Input segments
    pub total_segments: usize,
    /// Distinct translatable keys
    pub unique_keys: usize,
    /// Provider calls, retries included
    pub provider_calls: usize,
    /// Provider calls beyond the first per job
    pub retries: usize,
    /// Segments resolved by an exact memory hit
    pub cache_hits: usize,
    /// Segments resolved by a fuzzy memory hit
    pub fuzzy_hits: usize,
    /// Segments resolved from an earlier segment with the same key
    pub duplicates_collapsed: usize,
}

/// Everything a run produced, in input order
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier for logs
    pub run_id: Uuid,
    /// One result per input segment, in input order
    pub results: Vec<SegmentResult>,
    /// Outcome counts
    pub manifest: RunManifest,
    /// Work counts
    pub stats: RunStats,
    /// Every consistency finding of the run
    pub consistency: ConsistencyReport,
    /// Domain detected from the run's texts
    pub domain: DomainContext,
    /// Wall-clock time
    pub duration: Duration,
}

impl RunReport {
    pub(crate) fn new(
        run_id: Uuid,
        results: Vec<SegmentResult>,
        stats: RunStats,
        domain: DomainContext,
        duration: Duration,
    ) -> Self {
        let mut manifest = RunManifest::default();
        let mut consistency = ConsistencyReport::new();

        for result in &results {
            match (&result.resolution, result.is_success()) {
                (Some(Resolution::Passthrough), _) => manifest.passthrough += 1,
                (_, true) => manifest.succeeded += 1,
                (_, false) => manifest.failed += 1,
            }
            if result.auto_corrected {
                manifest.auto_corrected += 1;
            }
            if result.needs_review {
                manifest.needs_review += 1;
            }
            consistency.extend(result.issues.iter().cloned());
        }

        Self {
            run_id,
            results,
            manifest,
            stats,
            consistency,
            domain,
            duration,
        }
    }

    /// Whether every segment has a translation
    pub fn is_complete(&self) -> bool {
        self.manifest.failed == 0
    }

    /// Results without a translation
    pub fn failed_results(&self) -> impl Iterator<Item = &SegmentResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// Texts to put back into the document, in input order
    pub fn reinsertions(&self) -> Vec<Reinsertion> {
        self.results.iter().filter_map(|r| r.reinsertion()).collect()
    }
}
