use super::schema::create_table_sql;
use super::Backend;
use crate::config::CacheConfig;
use crate::errors::CacheError;
use crate::target::ConnectTarget;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// SQLite-backed cache tables.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open the database `target` points at.
    pub fn open(target: &ConnectTarget, cfg: &CacheConfig) -> Result<Self, CacheError> {
        let conn = match target {
            ConnectTarget::Memory => Connection::open_in_memory(),
            ConnectTarget::File(path) => Connection::open(path),
        }
        .map_err(|e| CacheError::Connection {
            target: target.to_string(),
            source: Box::new(e),
        })?;
        Self::init_connection(&conn, target, cfg).map_err(|e| CacheError::Connection {
            target: target.to_string(),
            source: Box::new(e),
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database (for tests and the ephemeral fallback).
    pub fn memory() -> Result<Self, CacheError> {
        Self::open(&ConnectTarget::Memory, &CacheConfig::default())
    }

    fn init_connection(
        conn: &Connection,
        target: &ConnectTarget,
        cfg: &CacheConfig,
    ) -> rusqlite::Result<()> {
        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))?;
        if cfg.wal && !target.is_memory() {
            let _mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }
        Ok(())
    }

    /// Run `f` against the underlying connection.
    pub fn with_connection<R>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> Result<R, CacheError> {
        let conn = self.conn.lock()?;
        Ok(f(&*conn)?)
    }

    /// Number of records in `table`.
    pub fn count(&self, table: &str) -> Result<u64, CacheError> {
        let conn = self.conn.lock()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| {
            r.get(0)
        })?;
        Ok(n as u64)
    }

    /// Names of all tables in the database, sorted.
    pub fn tables(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

impl Backend for SqliteBackend {
    fn create_table(&self, table: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock()?;
        conn.execute_batch(&create_table_sql(table))?;
        Ok(())
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.conn.lock()?;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT value FROM \"{}\" WHERE key = ?1", table))?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn insert(&self, table: &str, key: &[u8], value: &[u8]) -> Result<bool, CacheError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            &format!(
                "INSERT INTO \"{}\" (key, value, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO NOTHING",
                table
            ),
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(changed == 1)
    }
}
