//! SQLite schema for cache tables.
//!
//! Every namespace gets its own table with the same shape:
//! - `key`: derived argument key (primary key)
//! - `value`: encoded result
//! - `created_at`: RFC 3339 insert time, informational only

/// Column list shared by all cache tables.
pub const CACHE_TABLE_COLUMNS: &str = r#"
    key        BLOB PRIMARY KEY,
    value      BLOB NOT NULL,
    created_at TEXT NOT NULL
"#;

/// DDL for one cache table. `table` must already be a validated identifier.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({}) WITHOUT ROWID",
        table, CACHE_TABLE_COLUMNS
    )
}
