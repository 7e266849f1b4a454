use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{BatchConfig, BatchContext};
use crate::consistency::ConsistencyConfig;
use crate::database::{DatabaseConnection, Repository};
use crate::errors::EngineError;
use crate::glossary::Glossary;
use crate::memory::TranslationMemory;
use crate::memory::store::DEFAULT_SHARD_COUNT;
use crate::providers::TranslationProvider;
use crate::scheduler::{SchedulerConfig, TranslationScheduler};

/// Engine configuration module
/// This module holds the typed configuration of the engine including
/// loading and validating it. Loading it from the environment or the
/// command line is the caller's business.
/// Represents the engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Scheduler settings: concurrency, retry, timeout, fuzzy reuse
    #[serde(default)]
    pub engine: SchedulerConfig,

    /// Consistency checker settings
    #[serde(default)]
    pub consistency: ConsistencyConfig,

    /// Batch coordinator settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Translation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation memory and glossary storage
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Persist the memory and the global glossary on disk
    #[serde(default = "default_true")]
    pub persistent: bool,

    /// Database file; the user data directory is used when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Lock shards of the in-memory index
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Plain-text list of do-not-translate terms
    #[serde(default)]
    pub protected_terms_file: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            database_path: None,
            shard_count: default_shard_count(),
            protected_terms_file: None,
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching filter for the log facade
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_shard_count() -> usize {
    DEFAULT_SHARD_COUNT
}

impl Config {
    /// Parse a configuration from JSON, filling in defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    /// Serialize the configuration as pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are both '{}'",
                self.source_language
            ));
        }

        let engine = &self.engine;
        if engine.max_concurrent_requests == 0 {
            return Err(anyhow!("max_concurrent_requests must be at least 1"));
        }
        if engine.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }
        if engine.base_backoff_ms > engine.max_backoff_ms {
            return Err(anyhow!(
                "base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                engine.base_backoff_ms,
                engine.max_backoff_ms
            ));
        }
        if engine.request_timeout_ms == 0 {
            return Err(anyhow!("request_timeout_ms must be positive"));
        }
        if !(engine.fuzzy_threshold > 0.0 && engine.fuzzy_threshold <= 1.0) {
            return Err(anyhow!(
                "fuzzy_threshold must be in (0, 1], got {}",
                engine.fuzzy_threshold
            ));
        }

        if self.batch.term_frequency_threshold == 0 {
            return Err(anyhow!("term_frequency_threshold must be at least 1"));
        }
        if self.memory.shard_count == 0 {
            return Err(anyhow!("shard_count must be at least 1"));
        }

        Ok(())
    }

    /// Open the shared memory and glossary described by the configuration
    pub fn open_context(&self) -> Result<BatchContext, EngineError> {
        let (memory, glossary) = if self.memory.persistent {
            let connection = match &self.memory.database_path {
                Some(path) => DatabaseConnection::new(path)?,
                None => DatabaseConnection::new_default()?,
            };
            let repository = Repository::new(connection);
            (
                TranslationMemory::open(repository.clone(), self.memory.shard_count)?,
                Glossary::open(repository)?,
            )
        } else {
            (TranslationMemory::in_memory(), Glossary::new())
        };

        if let Some(path) = &self.memory.protected_terms_file {
            let contents = fs::read_to_string(path).map_err(|e| {
                EngineError::Config(format!("Failed to read protected terms {}: {}", path.display(), e))
            })?;
            glossary.load_protected_list(&contents, &self.target_language)?;
        }

        Ok(BatchContext::new(Arc::new(memory), Arc::new(glossary)))
    }

    /// Build a scheduler over a context
    pub fn scheduler(&self, provider: Arc<dyn TranslationProvider>, context: &BatchContext) -> TranslationScheduler {
        TranslationScheduler::new(
            self.engine.clone(),
            provider,
            Arc::clone(&context.memory),
            Arc::clone(&context.glossary),
            self.consistency.clone(),
        )
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "it".to_string(),
            engine: SchedulerConfig::default(),
            consistency: ConsistencyConfig::default(),
            batch: BatchConfig::default(),
            memory: MemoryConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
