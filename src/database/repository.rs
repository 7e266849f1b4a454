/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for translation memory and glossary
 * persistence, abstracting away the SQL details and providing type-safe
 * access. The in-memory stores are authoritative while running; rows here
 * are written through on change and reloaded on open.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};

use super::connection::DatabaseConnection;
use super::models::{ConsistencyRuleRecord, GlossaryRecord, GlossaryRevisionRecord, TmRecord, TmTableStats};

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Translation Memory Operations
    // =========================================================================

    fn upsert_tm_entry_sync(conn: &Connection, record: &TmRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO tm_entries (
                entry_key, source_text, target_text, source_language, target_language,
                normalized_form, usage_count, created_at, last_used_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(entry_key) DO UPDATE SET
                target_text = excluded.target_text,
                usage_count = excluded.usage_count,
                last_used_at = excluded.last_used_at
            "#,
            params![
                record.entry_key,
                record.source_text,
                record.target_text,
                record.source_language,
                record.target_language,
                record.normalized_form,
                record.usage_count,
                record.created_at,
                record.last_used_at,
            ],
        )?;
        Ok(())
    }

    fn map_tm_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TmRecord> {
        Ok(TmRecord {
            entry_key: row.get(0)?,
            source_text: row.get(1)?,
            target_text: row.get(2)?,
            source_language: row.get(3)?,
            target_language: row.get(4)?,
            normalized_form: row.get(5)?,
            usage_count: row.get(6)?,
            created_at: row.get(7)?,
            last_used_at: row.get(8)?,
        })
    }

    /// Insert or replace a translation memory row
    pub fn upsert_tm_entry(&self, record: &TmRecord) -> Result<()> {
        self.db.execute(|conn| Self::upsert_tm_entry_sync(conn, record))
    }

    /// Write many rows in a single transaction
    pub fn upsert_tm_entries(&self, records: &[TmRecord]) -> Result<usize> {
        self.db.transaction(|tx| {
            for record in records {
                Self::upsert_tm_entry_sync(tx, record)?;
            }
            Ok(records.len())
        })
    }

    /// Write many rows in a single transaction without blocking the runtime
    pub async fn upsert_tm_entries_async(&self, records: Vec<TmRecord>) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                for record in &records {
                    Self::upsert_tm_entry_sync(tx, record)?;
                }
                debug!("Persisted {} translation memory rows", records.len());
                Ok(records.len())
            })
            .await
    }

    /// Get a single translation memory row
    pub fn get_tm_entry(&self, entry_key: &str) -> Result<Option<TmRecord>> {
        self.db.execute(|conn| {
            let record = conn
                .query_row(
                    r#"
                    SELECT entry_key, source_text, target_text, source_language, target_language,
                           normalized_form, usage_count, created_at, last_used_at
                    FROM tm_entries WHERE entry_key = ?1
                    "#,
                    [entry_key],
                    Self::map_tm_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    /// Load every translation memory row
    pub fn load_tm_entries(&self) -> Result<Vec<TmRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT entry_key, source_text, target_text, source_language, target_language,
                       normalized_form, usage_count, created_at, last_used_at
                FROM tm_entries
                "#,
            )?;

            let records = stmt
                .query_map([], Self::map_tm_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            debug!("Loaded {} translation memory rows", records.len());
            Ok(records)
        })
    }

    /// Aggregate figures for the translation memory table
    pub fn tm_stats(&self) -> Result<TmTableStats> {
        self.db.execute(|conn| {
            let (total_entries, total_usage): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(usage_count), 0) FROM tm_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let language_pairs: i64 = conn.query_row(
                "SELECT COUNT(*) FROM (SELECT DISTINCT source_language, target_language FROM tm_entries)",
                [],
                |row| row.get(0),
            )?;

            Ok(TmTableStats {
                total_entries,
                total_usage,
                language_pairs,
            })
        })
    }

    // =========================================================================
    // Glossary Operations
    // =========================================================================

    /// Insert or replace a global glossary term, recording the prior value
    pub fn upsert_glossary_term(
        &self,
        record: &GlossaryRecord,
        previous: Option<&str>,
    ) -> Result<()> {
        self.db.transaction(|tx| {
            tx.execute(
                r#"
                INSERT INTO glossary_terms (term_key, term, target_language, translation, protected, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(term_key) DO UPDATE SET
                    translation = excluded.translation,
                    protected = excluded.protected,
                    updated_at = excluded.updated_at
                "#,
                params![
                    record.term_key,
                    record.term,
                    record.target_language,
                    record.translation,
                    record.protected,
                    record.updated_at,
                ],
            )?;

            if let Some(previous) = previous {
                tx.execute(
                    "INSERT INTO glossary_revisions (term_key, previous_translation, replaced_at) VALUES (?1, ?2, ?3)",
                    params![record.term_key, previous, record.updated_at],
                )?;
            }

            Ok(())
        })
    }

    /// Load every persisted glossary term
    pub fn load_glossary_terms(&self) -> Result<Vec<GlossaryRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT term_key, term, target_language, translation, protected, updated_at
                FROM glossary_terms
                "#,
            )?;

            let records = stmt
                .query_map([], |row| {
                    Ok(GlossaryRecord {
                        term_key: row.get(0)?,
                        term: row.get(1)?,
                        target_language: row.get(2)?,
                        translation: row.get(3)?,
                        protected: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
    }

    /// Load the audit history of every persisted term, oldest first
    pub fn load_glossary_revisions(&self) -> Result<Vec<GlossaryRevisionRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT term_key, previous_translation, replaced_at
                FROM glossary_revisions
                ORDER BY id ASC
                "#,
            )?;

            let records = stmt
                .query_map([], |row| {
                    Ok(GlossaryRevisionRecord {
                        term_key: row.get(0)?,
                        previous_translation: row.get(1)?,
                        replaced_at: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
    }

    // =========================================================================
    // Consistency Rule Operations
    // =========================================================================

    /// Insert a rule, returning its id
    pub fn insert_consistency_rule(&self, record: &ConsistencyRuleRecord) -> Result<i64> {
        self.db.execute(|conn| {
            conn.execute(
                r#"
                INSERT INTO consistency_rules
                    (pattern, replacement, target_language, rule_kind, description, active, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.pattern,
                    record.replacement,
                    record.target_language,
                    record.rule_kind,
                    record.description,
                    record.active,
                    record.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Load every rule, active or not, in insertion order
    pub fn load_consistency_rules(&self) -> Result<Vec<ConsistencyRuleRecord>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, pattern, replacement, target_language, rule_kind, description, active, created_at
                FROM consistency_rules
                ORDER BY id ASC
                "#,
            )?;

            let records = stmt
                .query_map([], |row| {
                    Ok(ConsistencyRuleRecord {
                        id: row.get(0)?,
                        pattern: row.get(1)?,
                        replacement: row.get(2)?,
                        target_language: row.get(3)?,
                        rule_kind: row.get(4)?,
                        description: row.get(5)?,
                        active: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            debug!("Loaded {} consistency rules", records.len());
            Ok(records)
        })
    }

    /// Switch a rule on or off; false when the id is unknown
    pub fn set_consistency_rule_active(&self, id: i64, active: bool) -> Result<bool> {
        self.db.execute(|conn| {
            let changed = conn.execute(
                "UPDATE consistency_rules SET active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(changed > 0)
        })
    }
}
