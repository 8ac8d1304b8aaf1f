//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

/// Store database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct StoreDb {
    pub(crate) conn: Connection,
}

impl StoreDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }

    /// Whether the stored bill carries exactly this `change_hash`.
    pub async fn bill_hash_matches(&self, bill_id: i64, change_hash: &str) -> Result<bool, Error> {
        let change_hash = change_hash.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let found = conn
                    .query_row(
                        "SELECT 1 FROM ls_bill WHERE bill_id = ?1 AND change_hash = ?2",
                        params![bill_id, change_hash],
                        |_| Ok(()),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await
            .map_err(Error::from)
    }

    /// Hash of the last dataset archive imported for a session.
    pub async fn session_import_hash(&self, session_id: i64) -> Result<Option<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let hash = conn
                    .query_row(
                        "SELECT import_hash FROM ls_session WHERE session_id = ?1",
                        params![session_id],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?;
                Ok(hash.flatten())
            })
            .await
            .map_err(Error::from)
    }

    /// Record a completed dataset import against its session.
    ///
    /// Returns the number of session rows updated (0 if the session is unknown).
    pub async fn record_import(&self, session_id: i64, hash: &str, date: &str) -> Result<usize, Error> {
        let hash = hash.to_string();
        let date = date.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let updated = conn.execute(
                    "UPDATE ls_session SET import_date = ?1, import_hash = ?2 WHERE session_id = ?3",
                    params![date, hash, session_id],
                )?;
                Ok(updated)
            })
            .await
            .map_err(Error::from)
    }

    /// Row count of a store table, for reports and tests.
    pub async fn count_rows(&self, table: &'static str) -> Result<i64, Error> {
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_open_file_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = StoreDb::open(dir.path().join("store.sqlite")).await.unwrap();
        assert_eq!(db.count_rows("ls_state").await.unwrap(), 52);
    }

    #[tokio::test]
    async fn test_record_import_and_read_back() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| conn.execute("INSERT INTO ls_session (session_id, state_id) VALUES (1900, 5)", []))
            .await
            .unwrap();

        assert_eq!(db.session_import_hash(1900).await.unwrap(), None);
        assert_eq!(db.record_import(1900, "abc123", "2024-01-02").await.unwrap(), 1);
        assert_eq!(db.session_import_hash(1900).await.unwrap().as_deref(), Some("abc123"));
        assert_eq!(db.record_import(42, "x", "2024-01-02").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bill_hash_matches() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.conn
            .call(|conn| conn.execute("INSERT INTO ls_bill (bill_id, change_hash) VALUES (10, 'aaa')", []))
            .await
            .unwrap();

        assert!(db.bill_hash_matches(10, "aaa").await.unwrap());
        assert!(!db.bill_hash_matches(10, "bbb").await.unwrap());
        assert!(!db.bill_hash_matches(11, "aaa").await.unwrap());
    }
}
