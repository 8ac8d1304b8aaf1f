//! File-backed response and document caches.
//!
//! Both caches store entries as plain files under a root directory. The
//! ephemeral mode judges freshness from the file's modification time at read
//! time; the permanent mode never expires anything.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::keys::CacheCategory;
use crate::Error;

/// Freshness policy of a [`FileCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Entries expire `ttl` seconds after they were written.
    Ephemeral { default_ttl: u64 },
    /// Entries never expire.
    Permanent,
}

/// Space reclaimed by [`FileCache::purge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub files: u64,
    pub bytes: u64,
}

/// A directory of cached files keyed by relative path.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    mode: CacheMode,
}

impl FileCache {
    /// Response cache with a fallback lifetime.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDir` if `root` is not an existing, writable directory.
    pub fn ephemeral(root: impl Into<PathBuf>, default_ttl: u64) -> Result<Self, Error> {
        Self::open(root.into(), CacheMode::Ephemeral { default_ttl })
    }

    /// Document cache whose entries are kept forever.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDir` if `root` is not an existing, writable directory.
    pub fn permanent(root: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::open(root.into(), CacheMode::Permanent)
    }

    fn open(root: PathBuf, mode: CacheMode) -> Result<Self, Error> {
        let meta = fs::metadata(&root).map_err(|e| Error::CacheDir { path: root.clone(), reason: e.to_string() })?;
        if !meta.is_dir() {
            return Err(Error::CacheDir { path: root, reason: "not a directory".into() });
        }
        if meta.permissions().readonly() {
            return Err(Error::CacheDir { path: root, reason: "not writable".into() });
        }
        Ok(Self { root, mode })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Absolute path for a key, refusing keys that escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, Error> {
        let rel = Path::new(key);
        let safe = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::CacheDir { path: self.root.join(key), reason: "key escapes cache root".into() });
        }
        Ok(self.root.join(rel))
    }

    /// Read an entry, honouring `ttl` (or the default) in ephemeral mode.
    pub fn get(&self, key: &str, ttl: Option<u64>) -> Option<Vec<u8>> {
        self.get_at(key, ttl, SystemTime::now())
    }

    /// [`FileCache::get`] evaluated at an explicit instant.
    pub fn get_at(&self, key: &str, ttl: Option<u64>, now: SystemTime) -> Option<Vec<u8>> {
        let path = self.resolve(key).ok()?;

        if let CacheMode::Ephemeral { default_ttl } = self.mode {
            let ttl = ttl.unwrap_or(default_ttl);
            if ttl == 0 {
                return None;
            }
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= Duration::from_secs(ttl) {
                tracing::debug!(key, age_secs = age.as_secs(), ttl, "cache entry stale");
                return None;
            }
        }

        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache entry treated as miss");
                None
            }
        }
    }

    /// Write an entry, creating intermediate directories.
    ///
    /// Returns the absolute path written.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheWrite` if a directory cannot be created or the
    /// file cannot be written.
    pub fn set(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::CacheWrite { path: parent.to_path_buf(), source })?;
        }
        fs::write(&path, bytes).map_err(|source| Error::CacheWrite { path: path.clone(), source })?;
        Ok(path)
    }

    /// Delete stale entries from the response cache's own category directories.
    ///
    /// A permanent cache is never purged.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheWrite` if a stale file cannot be removed.
    pub fn purge(&self) -> Result<PurgeReport, Error> {
        self.purge_at(SystemTime::now())
    }

    /// [`FileCache::purge`] evaluated at an explicit instant.
    pub fn purge_at(&self, now: SystemTime) -> Result<PurgeReport, Error> {
        let mut report = PurgeReport::default();
        if self.mode == CacheMode::Permanent {
            return Ok(report);
        }

        for category in CacheCategory::ALL {
            let dir = self.root.join(category.dir());
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            let ttl = Duration::from_secs(category.ttl());

            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let age = meta
                    .modified()
                    .ok()
                    .and_then(|m| now.duration_since(m).ok())
                    .unwrap_or(Duration::ZERO);
                if age > ttl || ttl.is_zero() {
                    fs::remove_file(&path).map_err(|source| Error::CacheWrite { path: path.clone(), source })?;
                    report.files += 1;
                    report.bytes += meta.len();
                }
            }
        }

        tracing::info!(files = report.files, bytes = report.bytes, "purged response cache");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified(cache: &FileCache, key: &str) -> SystemTime {
        fs::metadata(cache.root().join(key)).unwrap().modified().unwrap()
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileCache::ephemeral(dir.path().join("nope"), 3600);
        assert!(matches!(result, Err(Error::CacheDir { .. })));
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(FileCache::permanent(&file), Err(Error::CacheDir { .. })));
    }

    #[test]
    fn test_set_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::permanent(dir.path()).unwrap();
        let path = cache.set("text/ca/1900/ab1/5/pdf", b"%PDF").unwrap();
        assert!(path.ends_with("text/ca/1900/ab1/5/pdf"));
        assert_eq!(cache.get("text/ca/1900/ab1/5/pdf", None).unwrap(), b"%PDF");
    }

    #[test]
    fn test_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 3600).unwrap();
        cache.set("bill/100.json", b"{}").unwrap();
        let written = modified(&cache, "bill/100.json");

        let hit = cache.get_at("bill/100.json", Some(3600), written + Duration::from_secs(3599));
        assert!(hit.is_some());

        let miss = cache.get_at("bill/100.json", Some(3600), written + Duration::from_secs(3601));
        assert!(miss.is_none());
    }

    #[test]
    fn test_default_ttl_used_when_unspecified() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 60).unwrap();
        cache.set("bill/1.json", b"{}").unwrap();
        let written = modified(&cache, "bill/1.json");

        assert!(cache.get_at("bill/1.json", None, written + Duration::from_secs(59)).is_some());
        assert!(cache.get_at("bill/1.json", None, written + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn test_zero_ttl_always_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 3600).unwrap();
        cache.set("monitorlist/current_raw.json", b"{}").unwrap();
        assert!(cache.get("monitorlist/current_raw.json", Some(0)).is_none());
    }

    #[test]
    fn test_permanent_ignores_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::permanent(dir.path()).unwrap();
        cache.set("amendment/x", b"doc").unwrap();
        let far = SystemTime::now() + Duration::from_secs(10 * 365 * 86_400);
        assert!(cache.get_at("amendment/x", Some(1), far).is_some());
    }

    #[test]
    fn test_key_escaping_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::permanent(dir.path()).unwrap();
        assert!(matches!(cache.set("../evil", b"x"), Err(Error::CacheDir { .. })));
        assert!(cache.get("../evil", None).is_none());
    }

    #[test]
    fn test_purge_removes_only_stale_owned_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::ephemeral(dir.path(), 3600).unwrap();
        cache.set("bill/1.json", b"1234").unwrap();
        cache.set("text/2.json", b"12").unwrap();
        cache.set("other/3.json", b"123").unwrap();
        let written = modified(&cache, "bill/1.json");

        // Past the bill lifetime, well within the text lifetime.
        let report = cache.purge_at(written + Duration::from_secs(20_000)).unwrap();

        assert_eq!(report, PurgeReport { files: 1, bytes: 4 });
        assert!(!dir.path().join("bill/1.json").exists());
        assert!(dir.path().join("text/2.json").exists());
        assert!(dir.path().join("other/3.json").exists());
    }

    #[test]
    fn test_purge_leaves_permanent_cache_alone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::permanent(dir.path()).unwrap();
        cache.set("bill/1.json", b"x").unwrap();
        let far = SystemTime::now() + Duration::from_secs(10 * 365 * 86_400);

        assert_eq!(cache.purge_at(far).unwrap(), PurgeReport::default());
        assert!(dir.path().join("bill/1.json").exists());
    }
}
