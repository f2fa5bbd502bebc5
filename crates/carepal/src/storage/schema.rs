//! `SQLite` schema definitions for carepal.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the namespaced snapshot table.
///
/// One row per store; `payload` is the whole store as JSON.
pub const CREATE_KV_STORE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv_store (
    namespace TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    checksum TEXT NOT NULL,
    format_version INTEGER NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `updated_at` for recency queries.
///
/// Added by the version 2 migration rather than the base schema.
pub const CREATE_UPDATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_kv_store_updated ON kv_store(updated_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_KV_STORE_TABLE, CREATE_METADATA_TABLE];
