/*!
 * Sharded translation memory store.
 *
 * Entries live in memory, split across a fixed number of shards each guarded
 * by its own `RwLock`, so writers on one key never block lookups that hash
 * to another shard. When the store is backed by a repository, new entries
 * and corrections are written through to SQLite after the shard lock is
 * released; hit counters are only marked dirty and written by `flush`.
 */

use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::database::Repository;
use crate::database::models::{TmRecord, parse_timestamp};
use crate::errors::EngineError;
use crate::language_utils::normalize_language_code;
use crate::segment::{memory_key, normalize_text, truncate_text};

use super::similarity::{length_bound, similarity_chars};

/// Default number of shards
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// One stored translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmEntry {
    /// Hash of the normalized text and both languages
    pub key: String,
    /// Source text as first recorded
    pub source_text: String,
    /// Stored translation
    pub target_text: String,
    /// Source language (normalized code)
    pub source_language: String,
    /// Target language (normalized code)
    pub target_language: String,
    /// Normalized source text
    pub normalized_form: String,
    /// Times the entry was recorded or served
    pub usage_count: u64,
    /// First time the entry was recorded
    pub created_at: DateTime<Utc>,
    /// Last time the entry was recorded or served
    pub last_used_at: DateTime<Utc>,
}

impl TmEntry {
    /// Create a fresh entry with a usage count of one
    pub fn new(source_text: &str, target_text: &str, source_language: &str, target_language: &str) -> Self {
        let now = Utc::now();
        Self {
            key: memory_key(source_text, source_language, target_language),
            source_text: source_text.to_string(),
            target_text: target_text.to_string(),
            source_language: normalize_language_code(source_language),
            target_language: normalize_language_code(target_language),
            normalized_form: normalize_text(source_text),
            usage_count: 1,
            created_at: now,
            last_used_at: now,
        }
    }

    /// Convert to a database row
    pub fn to_record(&self) -> TmRecord {
        TmRecord {
            entry_key: self.key.clone(),
            source_text: self.source_text.clone(),
            target_text: self.target_text.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            normalized_form: self.normalized_form.clone(),
            usage_count: self.usage_count as i64,
            created_at: self.created_at.to_rfc3339(),
            last_used_at: self.last_used_at.to_rfc3339(),
        }
    }

    /// Build from a database row
    pub fn from_record(record: TmRecord) -> Self {
        Self {
            key: record.entry_key,
            source_text: record.source_text,
            target_text: record.target_text,
            source_language: record.source_language,
            target_language: record.target_language,
            normalized_form: record.normalized_form,
            usage_count: record.usage_count.max(0) as u64,
            created_at: parse_timestamp(&record.created_at),
            last_used_at: parse_timestamp(&record.last_used_at),
        }
    }
}

/// Result of a fuzzy lookup
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Closest stored entry
    pub entry: TmEntry,
    /// Similarity in [0.0, 1.0]
    pub similarity: f64,
}

/// What happened to an imported entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No entry existed for the key
    Inserted,
    /// The incoming entry was newer and replaced the stored one
    Replaced,
    /// The stored entry was newer or equally recent
    Kept,
}

/// Translation memory statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Number of stored entries
    pub total_entries: usize,
    /// Sum of all usage counters
    pub total_usage: u64,
    /// Exact lookups served since the store was opened
    pub exact_hits: u64,
    /// Exact lookups that missed
    pub misses: u64,
    /// Fuzzy lookups that found a match
    pub fuzzy_hits: u64,
    /// Entry count per (source, target) pair, largest first
    pub language_pairs: Vec<(String, String, usize)>,
    /// Most used entries as (source text, usage count)
    pub most_used: Vec<(String, u64)>,
}

impl MemoryStats {
    /// Exact hit rate in percent
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.exact_hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.exact_hits as f64 / lookups as f64 * 100.0
        }
    }
}

/// Stored entry with its case-folded characters for similarity scoring
#[derive(Debug, Clone)]
struct Slot {
    entry: TmEntry,
    folded: Vec<char>,
}

impl Slot {
    fn new(entry: TmEntry) -> Self {
        let folded = entry.normalized_form.to_lowercase().chars().collect();
        Self { entry, folded }
    }
}

#[derive(Debug, Default)]
struct Shard {
    slots: HashMap<String, Slot>,
    /// Keys whose usage counters changed since the last flush
    dirty: HashSet<String>,
}

/// Sharded, optionally persistent translation memory
pub struct TranslationMemory {
    shards: Vec<RwLock<Shard>>,
    repository: Option<Repository>,
    exact_hits: AtomicU64,
    misses: AtomicU64,
    fuzzy_hits: AtomicU64,
}

impl std::fmt::Debug for TranslationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationMemory")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

impl TranslationMemory {
    /// Create a memory without persistence
    pub fn in_memory() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT, None)
    }

    /// Open a persistent memory, loading every stored entry
    pub fn open(repository: Repository, shard_count: usize) -> Result<Self, EngineError> {
        let records = repository.load_tm_entries()?;
        let memory = Self::with_shards(shard_count, Some(repository));

        let loaded = records.len();
        for record in records {
            let entry = TmEntry::from_record(record);
            let mut shard = memory.shard(&entry.key).write();
            shard.slots.insert(entry.key.clone(), Slot::new(entry));
        }

        debug!("Translation memory opened with {} entries", loaded);
        Ok(memory)
    }

    fn with_shards(shard_count: usize, repository: Option<Repository>) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| RwLock::new(Shard::default())).collect(),
            repository,
            exact_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fuzzy_hits: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &str) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().slots.len()).sum()
    }

    /// Whether the memory holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether entries are persisted
    pub fn is_persistent(&self) -> bool {
        self.repository.is_some()
    }

    /// Read an entry by key without counting a use
    pub fn get(&self, key: &str) -> Option<TmEntry> {
        self.shard(key).read().slots.get(key).map(|s| s.entry.clone())
    }

    /// Exact lookup, counting a use on hit
    pub fn lookup_exact(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Option<TmEntry> {
        let key = memory_key(source_text, source_language, target_language);
        let mut shard = self.shard(&key).write();

        match shard.slots.get_mut(&key) {
            Some(slot) => {
                slot.entry.usage_count += 1;
                slot.entry.last_used_at = Utc::now();
                let entry = slot.entry.clone();
                shard.dirty.insert(key);
                self.exact_hits.fetch_add(1, Ordering::Relaxed);

                debug!(
                    "TM hit for '{}' ({} -> {})",
                    truncate_text(source_text, 30),
                    entry.source_language,
                    entry.target_language
                );
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Closest entry for the same language pair at or above `threshold`
    ///
    /// Ties on similarity go to the higher usage count, then to the most
    /// recently used entry. Fuzzy lookups never modify the memory.
    pub fn lookup_fuzzy(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        threshold: f64,
    ) -> Option<FuzzyMatch> {
        let source_language = normalize_language_code(source_language);
        let target_language = normalize_language_code(target_language);
        let query: Vec<char> = normalize_text(source_text).to_lowercase().chars().collect();

        let mut best: Option<FuzzyMatch> = None;

        for shard in &self.shards {
            let shard = shard.read();
            for slot in shard.slots.values() {
                let entry = &slot.entry;
                if entry.source_language != source_language
                    || entry.target_language != target_language
                {
                    continue;
                }
                if length_bound(query.len(), slot.folded.len()) < threshold {
                    continue;
                }

                let score = similarity_chars(&query, &slot.folded);
                if score < threshold {
                    continue;
                }

                let better = match &best {
                    None => true,
                    Some(current) => {
                        (score, entry.usage_count, entry.last_used_at)
                            > (
                                current.similarity,
                                current.entry.usage_count,
                                current.entry.last_used_at,
                            )
                    }
                };

                if better {
                    best = Some(FuzzyMatch {
                        entry: entry.clone(),
                        similarity: score,
                    });
                }
            }
        }

        if let Some(found) = &best {
            self.fuzzy_hits.fetch_add(1, Ordering::Relaxed);
            debug!(
                "TM fuzzy match {:.3} for '{}'",
                found.similarity,
                truncate_text(source_text, 30)
            );
        }

        best
    }

    /// Record a translation
    ///
    /// A new key creates an entry; an existing key only counts a use and
    /// keeps its stored translation. The returned entry reflects the memory
    /// even when writing it through to the database failed, in which case
    /// the error is returned and the entry stays dirty for the next flush.
    pub fn record(
        &self,
        source_text: &str,
        target_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<TmEntry, EngineError> {
        let entry = self.upsert_slot(source_text, target_text, source_language, target_language);
        self.write_through(&entry)?;
        Ok(entry)
    }

    /// `record` for async callers; the database write runs on the blocking pool
    pub async fn record_async(
        &self,
        source_text: &str,
        target_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<TmEntry, EngineError> {
        let entry = self.upsert_slot(source_text, target_text, source_language, target_language);
        self.write_through_async(&entry).await?;
        Ok(entry)
    }

    fn upsert_slot(
        &self,
        source_text: &str,
        target_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> TmEntry {
        let key = memory_key(source_text, source_language, target_language);
        let mut shard = self.shard(&key).write();
        match shard.slots.get_mut(&key) {
            Some(slot) => {
                slot.entry.usage_count += 1;
                slot.entry.last_used_at = Utc::now();
                slot.entry.clone()
            }
            None => {
                let entry = TmEntry::new(source_text, target_text, source_language, target_language);
                shard.slots.insert(key, Slot::new(entry.clone()));
                entry
            }
        }
    }

    /// Overwrite the stored translation of an existing entry
    ///
    /// Returns `Ok(None)` when the key is unknown; corrections never create
    /// entries.
    pub fn record_correction(
        &self,
        source_text: &str,
        corrected_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<TmEntry>, EngineError> {
        let Some(entry) = self.correct_slot(source_text, corrected_text, source_language, target_language) else {
            return Ok(None);
        };
        self.write_through(&entry)?;
        Ok(Some(entry))
    }

    /// `record_correction` for async callers
    pub async fn record_correction_async(
        &self,
        source_text: &str,
        corrected_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<TmEntry>, EngineError> {
        let Some(entry) = self.correct_slot(source_text, corrected_text, source_language, target_language) else {
            return Ok(None);
        };
        self.write_through_async(&entry).await?;
        Ok(Some(entry))
    }

    fn correct_slot(
        &self,
        source_text: &str,
        corrected_text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Option<TmEntry> {
        let key = memory_key(source_text, source_language, target_language);
        let mut shard = self.shard(&key).write();
        let slot = shard.slots.get_mut(&key)?;
        slot.entry.target_text = corrected_text.to_string();
        slot.entry.last_used_at = Utc::now();
        Some(slot.entry.clone())
    }

    /// Merge an entry coming from an interchange file
    ///
    /// On a key collision the entry with the later `last_used_at` wins. The
    /// caller persists merged entries with `flush`.
    pub fn merge_entry(&self, mut incoming: TmEntry) -> MergeOutcome {
        incoming.key = memory_key(
            &incoming.source_text,
            &incoming.source_language,
            &incoming.target_language,
        );
        incoming.source_language = normalize_language_code(&incoming.source_language);
        incoming.target_language = normalize_language_code(&incoming.target_language);
        incoming.normalized_form = normalize_text(&incoming.source_text);

        let key = incoming.key.clone();
        let mut shard = self.shard(&key).write();

        let outcome = match shard.slots.get_mut(&key) {
            None => {
                shard.slots.insert(key.clone(), Slot::new(incoming));
                MergeOutcome::Inserted
            }
            Some(slot) if incoming.last_used_at > slot.entry.last_used_at => {
                incoming.created_at = incoming.created_at.min(slot.entry.created_at);
                *slot = Slot::new(incoming);
                MergeOutcome::Replaced
            }
            Some(_) => MergeOutcome::Kept,
        };

        if outcome != MergeOutcome::Kept {
            shard.dirty.insert(key);
        }
        outcome
    }

    /// Entries of one language pair, ordered by source text
    pub fn entries_for_pair(&self, source_language: &str, target_language: &str) -> Vec<TmEntry> {
        let source_language = normalize_language_code(source_language);
        let target_language = normalize_language_code(target_language);

        let mut entries: Vec<TmEntry> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .slots
                    .values()
                    .filter(|s| {
                        s.entry.source_language == source_language
                            && s.entry.target_language == target_language
                    })
                    .map(|s| s.entry.clone())
                    .collect::<Vec<_>>()
            })
            .collect();

        entries.sort_by(|a, b| a.source_text.cmp(&b.source_text).then(a.key.cmp(&b.key)));
        entries
    }

    fn write_through(&self, entry: &TmEntry) -> Result<(), EngineError> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };

        let result = repository.upsert_tm_entry(&entry.to_record());
        self.settle_write(entry, result)
    }

    async fn write_through_async(&self, entry: &TmEntry) -> Result<(), EngineError> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };

        let result = repository
            .upsert_tm_entries_async(vec![entry.to_record()])
            .await
            .map(|_| ());
        self.settle_write(entry, result)
    }

    /// A failed write leaves the entry dirty for the next flush
    fn settle_write(&self, entry: &TmEntry, result: anyhow::Result<()>) -> Result<(), EngineError> {
        result.map_err(|e| {
            warn!(
                "Failed to persist TM entry for '{}': {:#}",
                truncate_text(&entry.source_text, 30),
                e
            );
            self.shard(&entry.key).write().dirty.insert(entry.key.clone());
            EngineError::Persistence(format!("{:#}", e))
        })
    }

    fn take_dirty(&self) -> Vec<TmRecord> {
        let mut records = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.write();
            let dirty: Vec<String> = shard.dirty.drain().collect();
            for key in dirty {
                if let Some(slot) = shard.slots.get(&key) {
                    records.push(slot.entry.to_record());
                }
            }
        }
        records
    }

    fn restore_dirty(&self, records: &[TmRecord]) {
        for record in records {
            self.shard(&record.entry_key)
                .write()
                .dirty
                .insert(record.entry_key.clone());
        }
    }

    /// Persist every entry changed since the last flush
    pub fn flush(&self) -> Result<usize, EngineError> {
        let Some(repository) = &self.repository else {
            return Ok(0);
        };

        let records = self.take_dirty();
        if records.is_empty() {
            return Ok(0);
        }

        repository.upsert_tm_entries(&records).map_err(|e| {
            self.restore_dirty(&records);
            EngineError::Persistence(format!("{:#}", e))
        })
    }

    /// Persist changed entries from async code without blocking the runtime
    pub async fn flush_async(&self) -> Result<usize, EngineError> {
        let Some(repository) = &self.repository else {
            return Ok(0);
        };

        let records = self.take_dirty();
        if records.is_empty() {
            return Ok(0);
        }

        match repository.upsert_tm_entries_async(records.clone()).await {
            Ok(written) => Ok(written),
            Err(e) => {
                self.restore_dirty(&records);
                Err(EngineError::Persistence(format!("{:#}", e)))
            }
        }
    }

    /// Memory statistics
    pub fn stats(&self) -> MemoryStats {
        let mut total_entries = 0;
        let mut total_usage = 0;
        let mut pairs: HashMap<(String, String), usize> = HashMap::new();
        let mut usage: Vec<(String, u64)> = Vec::new();

        for shard in &self.shards {
            let shard = shard.read();
            for slot in shard.slots.values() {
                let entry = &slot.entry;
                total_entries += 1;
                total_usage += entry.usage_count;
                *pairs
                    .entry((entry.source_language.clone(), entry.target_language.clone()))
                    .or_insert(0) += 1;
                usage.push((entry.source_text.clone(), entry.usage_count));
            }
        }

        let mut language_pairs: Vec<(String, String, usize)> = pairs
            .into_iter()
            .map(|((s, t), n)| (s, t, n))
            .collect();
        language_pairs.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (&a.0, &a.1).cmp(&(&b.0, &b.1))));

        usage.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        usage.truncate(10);

        MemoryStats {
            total_entries,
            total_usage,
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fuzzy_hits: self.fuzzy_hits.load(Ordering::Relaxed),
            language_pairs,
            most_used: usage,
        }
    }
}
