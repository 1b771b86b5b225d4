//! Storage engine boundary.
//!
//! The cache needs only three things from a store: idempotent table creation
//! by name, point lookup by key inside a table, and a durable write-once
//! insert. Table names reaching a backend have already been validated as
//! plain identifiers by the namespace registry.

mod schema;
mod sqlite;

pub use schema::{create_table_sql, CACHE_TABLE_COLUMNS};
pub use sqlite::SqliteBackend;

use crate::errors::CacheError;

pub trait Backend: Send + Sync {
    /// Create `table` unless it already exists.
    fn create_table(&self, table: &str) -> Result<(), CacheError>;

    /// Fetch the stored value for `key`, if any.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

    /// Insert a new record and commit. Returns `false` when a record with
    /// the same key already exists; the existing record is left untouched.
    fn insert(&self, table: &str, key: &[u8], value: &[u8]) -> Result<bool, CacheError>;
}
