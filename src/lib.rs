/*!
 * # pagetrans - Translation orchestration for page-layout documents
 *
 * A Rust library that translates the text fragments of a document while
 * keeping terminology and formatting consistent across documents.
 *
 * ## Features
 *
 * - Translation memory with exact and fuzzy lookup, persisted in SQLite
 * - TMX 1.4 import and export
 * - Glossary with batch and global scopes and do-not-translate terms
 * - Deduplicated, bounded concurrent provider calls with retry and backoff
 * - Consistency checking with deterministic auto-correction:
 *   - Terminology
 *   - Numbers and units
 *   - Decimal separators, quotes, capitalization, whitespace
 *   - User-defined regex rules per target language
 * - Document domain detection for provider context hints
 * - Batches of documents sharing one memory and glossary
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `segment`: Segment model and identity keys
 * - `memory`: Translation memory, similarity scoring and TMX
 * - `database`: SQLite persistence for the memory and the glossary
 * - `glossary`: Terminology table and term extraction
 * - `consistency`: Consistency checker and per-language rules
 * - `context`: Document domain detection
 * - `scheduler`: Concurrent scheduler and retry state machine
 * - `batch`: Batch coordinator
 * - `providers`: Provider contract and a mock provider
 * - `app_config`: Configuration management
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod batch;
pub mod consistency;
pub mod context;
pub mod database;
pub mod errors;
pub mod glossary;
pub mod language_utils;
pub mod memory;
pub mod providers;
pub mod scheduler;
pub mod segment;

// Re-export main types for easier usage
pub use app_config::Config;
pub use batch::{BatchConfig, BatchContext, BatchCoordinator, BatchReport, DocumentInput, DocumentStatus};
pub use consistency::{ConsistencyChecker, ConsistencyConfig, ConsistencyIssue, ConsistencyReport, IssueType, Severity};
pub use context::{DocumentDomain, DomainContext};
pub use errors::{EngineError, ProviderError};
pub use glossary::{CustomRuleKind, Glossary, GlossaryEntry, GlossaryScope};
pub use language_utils::{get_language_name, language_codes_match, normalize_language_code};
pub use memory::{TmEntry, TranslationMemory};
pub use providers::{TranslationProvider, TranslationRequest, TranslationResponse};
pub use scheduler::{CancellationFlag, Resolution, RunReport, SchedulerConfig, SegmentResult, TranslationScheduler};
pub use segment::{RawSegment, Reinsertion, Segment, SegmentKey};
