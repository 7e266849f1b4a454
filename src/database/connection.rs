/*!
 * SQLite connection for the translation memory store.
 *
 * One connection is shared by the memory and the glossary. Synchronous
 * callers lock it directly; async callers hop onto the blocking pool so
 * that a slow disk never stalls the scheduler's worker threads.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::schema;

/// Directory under the user's data directory
const DATA_DIRNAME: &str = "pagetrans";

/// Database file name
const DB_FILENAME: &str = "memory.db";

/// Marker path of an in-memory database
const IN_MEMORY_PATH: &str = ":memory:";

/// How long a writer waits for a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle on the memory database
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl DatabaseConnection {
    /// Open the database in the user's data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_database_path()?)
    }

    /// Open (or create) the database file at `db_path`
    ///
    /// Missing parent directories are created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }

        info!("Opening translation memory database at {}", db_path.display());
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Self::initialized(conn, db_path)
    }

    /// Private database that lives as long as the handle
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory translation memory database");
        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        Self::initialized(conn, PathBuf::from(IN_MEMORY_PATH))
    }

    fn initialized(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)
            .with_context(|| format!("Failed to initialize schema of {}", db_path.display()))?;
        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<data dir>/pagetrans/memory.db`
    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow!("Could not determine a data directory for the translation memory"))?;

        Ok(base_dir.join(DATA_DIRNAME).join(DB_FILENAME))
    }

    /// Database file path, `:memory:` for in-memory databases
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the database lives only in this process
    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY_PATH
    }

    /// Run `f` with the locked connection
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connection.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction, committing when it succeeds
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection.lock();
        Self::in_transaction(&mut conn, f)
    }

    /// `transaction` on the blocking pool
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut conn = connection.lock();
            Self::in_transaction(&mut conn, f)
        })
        .await
        .context("Database task panicked")?
    }

    fn in_transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        // Dropping an uncommitted transaction rolls it back
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
