/*!
 * Common test utilities for the pagetrans test suite
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use pagetrans::consistency::ConsistencyConfig;
use pagetrans::database::{DatabaseConnection, Repository};
use pagetrans::glossary::Glossary;
use pagetrans::memory::TranslationMemory;
use pagetrans::providers::MockProvider;
use pagetrans::scheduler::{SchedulerConfig, TranslationScheduler};
use pagetrans::segment::{Segment, SegmentContext};

/// Route engine logs to the test output
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Database file inside a temporary directory
pub fn database_path(dir: &Path) -> PathBuf {
    dir.join("pagetrans").join("memory.db")
}

/// Repository over a database file
pub fn open_repository(path: &Path) -> Repository {
    Repository::new(DatabaseConnection::new(path).expect("Failed to open test database"))
}

/// English segment for a target language
pub fn segment(text: &str, target_language: &str) -> Segment {
    Segment::new(
        text,
        "en",
        target_language,
        None,
        SegmentContext {
            document_id: "doc".to_string(),
            location_ref: format!("loc:{}", text),
        },
    )
}

/// Scheduler settings with millisecond backoff
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        base_backoff_ms: 1,
        max_backoff_ms: 10,
        ..SchedulerConfig::default()
    }
}

/// Scheduler over fresh in-memory state
pub fn scheduler_with(provider: &MockProvider, config: SchedulerConfig) -> TranslationScheduler {
    TranslationScheduler::new(
        config,
        Arc::new(provider.clone()),
        Arc::new(TranslationMemory::in_memory()),
        Arc::new(Glossary::new()),
        ConsistencyConfig::default(),
    )
}
