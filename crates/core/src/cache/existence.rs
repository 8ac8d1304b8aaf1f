//! Short-lived memo of "does this id exist" lookups.
//!
//! The cache is advisory: a miss falls back to the store, and a hit only
//! ever means "this id is already stored". Two backends sit behind one
//! interface, a bounded in-process cache and a SQLite file shared between
//! processes.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use crate::config::{AppConfig, ExistenceBackend};

/// Lifetime of an entry when the caller does not choose one.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(3600);

/// Key-value memo with per-entry expiry.
///
/// Implementations handle their own error recovery: a backend failure
/// degrades to a miss and is logged, never surfaced.
pub trait ExistenceCache: Send + Sync {
    /// Value stored under `key`, if present and unexpired.
    fn get(&self, key: &str) -> Option<i64>;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: i64, ttl: Duration);

    /// Drop every entry.
    fn flush(&self);
}

/// Upper bound on in-process entries before least-recently-used eviction.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process existence cache, bounded and evicting expired entries.
#[derive(Clone)]
pub struct MemoryExistenceCache {
    entries: Cache<String, Entry>,
}

impl std::fmt::Debug for MemoryExistenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExistenceCache").field("entries", &self.entries.entry_count()).finish()
    }
}

impl Default for MemoryExistenceCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: u64) -> Self {
        let entries = Cache::builder().max_capacity(capacity).expire_after(EntryExpiry).build();
        Self { entries }
    }

    /// Live entries after pending evictions have been applied.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        usize::try_from(self.entries.entry_count()).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExistenceCache for MemoryExistenceCache {
    fn get(&self, key: &str) -> Option<i64> {
        self.entries.get(key).map(|entry| entry.value)
    }

    fn set(&self, key: &str, value: i64, ttl: Duration) {
        self.entries.insert(key.to_string(), Entry { value, ttl });
    }

    fn flush(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }
}

/// Existence cache in a SQLite file, shared by every process opening it.
///
/// Expiry is stored as a unix timestamp so entries written by one process
/// age correctly when read by another.
#[derive(Debug)]
pub struct SqliteExistenceCache {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteExistenceCache {
    /// Open (or create) the shared cache file.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the file cannot be opened or initialised.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let conn = rusqlite::Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory instance for tests.
    pub fn open_in_memory() -> Result<Self, crate::Error> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, crate::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=1000;
             CREATE TABLE IF NOT EXISTS existence_cache (
                 key TEXT PRIMARY KEY,
                 value INTEGER NOT NULL,
                 expires_at INTEGER NOT NULL
             );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

impl ExistenceCache for SqliteExistenceCache {
    fn get(&self, key: &str) -> Option<i64> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row(
            "SELECT value FROM existence_cache WHERE key = ?1 AND expires_at > ?2",
            params![key, Self::now()],
            |row| row.get(0),
        )
        .optional()
        .unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "shared existence cache read failed");
            None
        })
    }

    fn set(&self, key: &str, value: i64, ttl: Duration) {
        let expires_at = Self::now() + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = conn.execute(
            "INSERT INTO existence_cache (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        ) {
            tracing::warn!(key, error = %e, "shared existence cache write failed");
        }
    }

    fn flush(&self) {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = conn.execute("DELETE FROM existence_cache", []) {
            tracing::warn!(error = %e, "shared existence cache flush failed");
        }
    }
}

/// Existence cache selected by `existence_cache`.
///
/// # Errors
///
/// Returns the SQLite error if the shared cache file cannot be opened.
pub fn open_existence_cache(config: &AppConfig) -> Result<Arc<dyn ExistenceCache>, crate::Error> {
    match (config.existence_cache, &config.existence_cache_path) {
        (ExistenceBackend::Shared, Some(path)) => Ok(Arc::new(SqliteExistenceCache::open(path)?)),
        (ExistenceBackend::Shared, None) => {
            tracing::warn!("shared existence cache has no path; using a private in-memory cache");
            Ok(Arc::new(MemoryExistenceCache::new()))
        }
        (ExistenceBackend::Memory, _) => Ok(Arc::new(MemoryExistenceCache::new())),
    }
}
