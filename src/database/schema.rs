/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the translation memory, the
 * persisted glossary and user-defined consistency rules, and handles schema
 * migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL keeps readers unblocked while the memory writes through
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Translation memory: one row per (normalized text, source, target)
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tm_entries (
            entry_key TEXT PRIMARY KEY,
            source_text TEXT NOT NULL,
            target_text TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            normalized_form TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_used_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tm_languages ON tm_entries(source_language, target_language);
        CREATE INDEX IF NOT EXISTS idx_tm_usage ON tm_entries(usage_count);
        "#,
    )?;

    // Global glossary scope; batch scope is never persisted
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS glossary_terms (
            term_key TEXT PRIMARY KEY,
            term TEXT NOT NULL,
            target_language TEXT NOT NULL,
            translation TEXT NOT NULL,
            protected INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_glossary_language ON glossary_terms(target_language);

        CREATE TABLE IF NOT EXISTS glossary_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            term_key TEXT NOT NULL,
            previous_translation TEXT NOT NULL,
            replaced_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_glossary_revisions_term ON glossary_revisions(term_key);
        "#,
    )?;

    create_consistency_rules_table(conn)?;

    info!("Database schema created successfully");
    Ok(())
}

/// Regex rewrite rules scoped to a target language (added in v2)
fn create_consistency_rules_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS consistency_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern TEXT NOT NULL,
            replacement TEXT NOT NULL,
            target_language TEXT NOT NULL,
            rule_kind TEXT NOT NULL,
            description TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_consistency_rules_language ON consistency_rules(target_language);
        "#,
    )?;
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    if current < 1 {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    if current < 2 {
        debug!("Migrating v1 -> v2: adding consistency_rules table");
        create_consistency_rules_table(conn)?;
        current = 2;
    }

    debug!("Migration reached v{}", current);
    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_connection() -> Connection {
        Connection::open_in_memory().expect("Failed to create in-memory database")
    }

    #[test]
    fn test_initializeSchema_withFreshDatabase_shouldCreateAllTables() {
        let conn = create_test_connection();

        initialize_schema(&conn).expect("Failed to initialize schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"tm_entries".to_string()));
        assert!(tables.contains(&"glossary_terms".to_string()));
        assert!(tables.contains(&"glossary_revisions".to_string()));
        assert!(tables.contains(&"consistency_rules".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_initializeSchema_calledTwice_shouldBeIdempotent() {
        let conn = create_test_connection();

        initialize_schema(&conn).expect("First initialization failed");
        initialize_schema(&conn).expect("Second initialization failed");

        let version = get_schema_version(&conn).expect("Failed to get version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_initializeSchema_fromV1_shouldAddRulesTable() {
        let conn = create_test_connection();
        initialize_schema(&conn).expect("Failed to initialize schema");
        conn.execute_batch("DROP TABLE consistency_rules;").unwrap();
        set_schema_version(&conn, 1).unwrap();

        initialize_schema(&conn).expect("Migration failed");

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='consistency_rules'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(exists);
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_getSchemaVersion_withFreshDatabase_shouldReturnZero() {
        let conn = create_test_connection();
        let version = get_schema_version(&conn).expect("Failed to get version");
        assert_eq!(version, 0);
    }

    #[test]
    fn test_tmEntries_duplicateKey_shouldBeRejected() {
        let conn = create_test_connection();
        initialize_schema(&conn).expect("Failed to initialize schema");

        let insert = "INSERT INTO tm_entries (entry_key, source_text, target_text, source_language,
                      target_language, normalized_form, created_at, last_used_at)
                      VALUES ('k1', 'Hello', 'Ciao', 'en', 'it', 'Hello', datetime('now'), datetime('now'))";

        conn.execute(insert, []).expect("First insert failed");
        assert!(conn.execute(insert, []).is_err(), "Primary key should reject duplicates");
    }
}
