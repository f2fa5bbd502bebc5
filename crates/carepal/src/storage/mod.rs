//! Storage layer for carepal.
//!
//! This module provides `SQLite`-based persistence for whole stores. Each
//! store is serialized to JSON and kept under its own namespace, with a
//! BLAKE3 checksum and a format version so damaged or foreign snapshots are
//! refused instead of misread.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Format version written with every snapshot.
///
/// Bump when a record shape changes incompatibly.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Namespaced snapshot store.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `value` and store it under `namespace`, replacing whatever
    /// was there.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database write fails.
    pub fn save<T: Serialize + ?Sized>(&self, namespace: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let checksum = checksum(&payload);

        self.conn.execute(
            r"
            INSERT INTO kv_store (namespace, payload, checksum, format_version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(namespace) DO UPDATE SET
                payload = excluded.payload,
                checksum = excluded.checksum,
                format_version = excluded.format_version,
                updated_at = excluded.updated_at
            ",
            params![
                namespace,
                payload,
                checksum,
                SNAPSHOT_FORMAT_VERSION,
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!(namespace, bytes = payload.len(), "snapshot saved");
        Ok(())
    }

    /// Load and deserialize the snapshot under `namespace`.
    ///
    /// Returns `None` if nothing was ever saved there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSnapshot`] for an unknown format version,
    /// [`Error::CorruptSnapshot`] on checksum mismatch, or a JSON error if the
    /// payload does not match `T`.
    pub fn load<T: DeserializeOwned>(&self, namespace: &str) -> Result<Option<T>> {
        let row: Option<(String, String, u32)> = self
            .conn
            .query_row(
                "SELECT payload, checksum, format_version FROM kv_store WHERE namespace = ?1",
                [namespace],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((payload, stored_checksum, format_version)) = row else {
            debug!(namespace, "no snapshot stored");
            return Ok(None);
        };

        if format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::IncompatibleSnapshot {
                namespace: namespace.to_string(),
                found: format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        if checksum(&payload) != stored_checksum {
            warn!(namespace, "snapshot checksum mismatch");
            return Err(Error::CorruptSnapshot {
                namespace: namespace.to_string(),
            });
        }

        let value = serde_json::from_str(&payload)?;
        debug!(namespace, bytes = payload.len(), "snapshot loaded");
        Ok(Some(value))
    }

    /// Delete the snapshot under `namespace`.
    ///
    /// Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, namespace: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM kv_store WHERE namespace = ?1", [namespace])?;
        Ok(affected > 0)
    }

    /// Every namespace with a stored snapshot, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT namespace FROM kv_store ORDER BY namespace")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Delete every snapshot, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let affected = self.conn.execute("DELETE FROM kv_store", [])?;
        if affected > 0 {
            info!("Cleared {} stored snapshots", affected);
        }
        Ok(affected)
    }

    /// Run `f` inside a single transaction; nothing is written unless it
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an error if the transaction cannot
    /// begin or commit.
    pub fn atomically<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (namespaces, payload_bytes): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(payload)), 0) FROM kv_store",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let last_write: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM kv_store ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let last_write = last_write
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            namespaces,
            payload_bytes,
            last_write,
            db_size_bytes,
        })
    }
}

/// BLAKE3 hex digest of a payload.
fn checksum(payload: &str) -> String {
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of stored snapshots.
    pub namespaces: i64,
    /// Total size of all payloads in bytes.
    pub payload_bytes: i64,
    /// When a snapshot was last written.
    pub last_write: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        qty: u32,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "z".to_string(),
                qty: 1,
            },
            Item {
                id: "a".to_string(),
                qty: 2,
            },
            Item {
                id: "m".to_string(),
                qty: 3,
            },
        ]
    }

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let storage = create_test_storage();
        storage.save("grocery", &items()).unwrap();

        let loaded: Vec<Item> = storage.load("grocery").unwrap().unwrap();
        assert_eq!(loaded, items());
    }

    #[test]
    fn test_load_missing_namespace() {
        let storage = create_test_storage();
        let loaded: Option<Vec<Item>> = storage.load("nothing").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let storage = create_test_storage();
        storage.save("grocery", &items()).unwrap();
        storage.save("grocery", &items()[..1]).unwrap();

        let loaded: Vec<Item> = storage.load("grocery").unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(storage.namespaces().unwrap(), vec!["grocery"]);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let storage = create_test_storage();
        storage.save("orders", &items()).unwrap();
        storage.save("bookings", &Vec::<Item>::new()).unwrap();

        assert_eq!(storage.namespaces().unwrap(), vec!["bookings", "orders"]);
        let bookings: Vec<Item> = storage.load("bookings").unwrap().unwrap();
        assert!(bookings.is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let storage = create_test_storage();
        storage.save("orders", &items()).unwrap();
        storage
            .conn
            .execute(
                "UPDATE kv_store SET payload = '[]' WHERE namespace = 'orders'",
                [],
            )
            .unwrap();

        let err = storage.load::<Vec<Item>>("orders").unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_unknown_format_version_is_rejected() {
        let storage = create_test_storage();
        storage.save("orders", &items()).unwrap();
        storage
            .conn
            .execute(
                "UPDATE kv_store SET format_version = 99 WHERE namespace = 'orders'",
                [],
            )
            .unwrap();

        let err = storage.load::<Vec<Item>>("orders").unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleSnapshot {
                found: 99,
                expected: SNAPSHOT_FORMAT_VERSION,
                ..
            }
        ));
    }

    #[test]
    fn test_shape_mismatch_is_json_error() {
        let storage = create_test_storage();
        storage.save("orders", &"just a string").unwrap();
        let err = storage.load::<Vec<Item>>("orders").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        storage.save("chat", &items()).unwrap();
        assert!(storage.remove("chat").unwrap());
        assert!(!storage.remove("chat").unwrap());
        assert!(storage.load::<Vec<Item>>("chat").unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let storage = create_test_storage();
        storage.save("a", &1).unwrap();
        storage.save("b", &2).unwrap();
        assert_eq!(storage.clear().unwrap(), 2);
        assert!(storage.namespaces().unwrap().is_empty());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let storage = create_test_storage();
        storage.save("orders", &items()).unwrap();

        let result: Result<()> = storage.atomically(|s| {
            s.save("orders", &Vec::<Item>::new())?;
            Err(Error::internal("abort"))
        });
        assert!(result.is_err());

        let loaded: Vec<Item> = storage.load("orders").unwrap().unwrap();
        assert_eq!(loaded, items());
    }

    #[test]
    fn test_atomically_commits() {
        let storage = create_test_storage();
        storage
            .atomically(|s| {
                s.save("a", &1)?;
                s.save("b", &2)
            })
            .unwrap();
        assert_eq!(storage.namespaces().unwrap().len(), 2);
    }

    #[test]
    fn test_stats_empty() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.namespaces, 0);
        assert_eq!(stats.payload_bytes, 0);
        assert!(stats.last_write.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();
        storage.save("orders", &items()).unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.namespaces, 1);
        assert!(stats.payload_bytes > 0);
        assert!(stats.last_write.is_some());
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path(), Path::new(":memory:"));
    }

    #[test]
    fn test_open_file_based_persists_across_opens() {
        let db_path =
            std::env::temp_dir().join(format!("carepal_test_{}.db", std::process::id()));

        {
            let storage = Storage::open(&db_path).unwrap();
            storage.save("orders", &items()).unwrap();
            assert_eq!(storage.path(), db_path);
        }

        let storage = Storage::open(&db_path).unwrap();
        let loaded: Vec<Item> = storage.load("orders").unwrap().unwrap();
        assert_eq!(loaded, items());
        assert!(storage.stats().unwrap().db_size_bytes > 0);

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("carepal_test_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/stores.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
