//! Bulk import of extracted dataset archives.
//!
//! A dataset is a tree of JSON files, one entity per file, grouped in
//! `bill/`, `people/`, `vote/`, `text/`, `amendment/` and `supplement/`
//! directories. Each file is fed through the reconciler exactly as a push
//! payload would be. The archive hash is recorded against the session so an
//! unchanged dataset can be skipped next time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use walkdir::WalkDir;

use crate::Error;
use crate::model::Payload;
use crate::reconcile::Reconciler;

/// File holding the archive's content hash.
pub const HASH_FILE: &str = "hash.md5";

/// One file of an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path relative to the archive root, `/`-separated.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Source of dataset entries.
pub trait DatasetArchive: Send + Sync {
    /// Content hash published with the archive.
    fn hash(&self) -> Option<&str>;

    /// Date the archive was produced, `YYYY-MM-DD`.
    fn date(&self) -> &str;

    fn entries(&self) -> Result<Vec<ArchiveEntry>, Error>;
}

/// An archive already extracted to a directory.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
    hash: Option<String>,
    date: String,
}

impl DirectoryArchive {
    /// # Errors
    ///
    /// Returns `Error::Archive` if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Archive(format!("{} is not a directory", root.display())));
        }

        let hash_path = root.join(HASH_FILE);
        let hash = std::fs::read_to_string(&hash_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let date = std::fs::metadata(&hash_path)
            .and_then(|m| m.modified())
            .map(chrono::DateTime::<chrono::Local>::from)
            .unwrap_or_else(|_| chrono::Local::now())
            .format("%Y-%m-%d")
            .to_string();

        Ok(Self { root, hash, date })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DatasetArchive for DirectoryArchive {
    fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    fn date(&self) -> &str {
        &self.date
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>, Error> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = std::fs::read(entry.path())
                .map_err(|e| Error::Archive(format!("{}: {e}", entry.path().display())))?;
            entries.push(ArchiveEntry { path, bytes });
        }
        Ok(entries)
    }
}

/// Entity directories in processing order.
///
/// Bills come first so documents can resolve their parent bill.
const ROUTES: [&str; 6] = ["bill", "people", "vote", "text", "amendment", "supplement"];

fn route(path: &str) -> Option<usize> {
    let padded = format!("/{}", path.to_lowercase());
    ROUTES.iter().position(|dir| padded.contains(&format!("/{dir}/")))
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Refuse archives whose hash differs from this one.
    pub expected_hash: Option<String>,
    /// Decode every entry without touching the store.
    pub dry_run: bool,
    /// Re-import even when the hash is already recorded for the session.
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub hash: Option<String>,
    pub date: String,
    /// Session the import was recorded against.
    pub session_id: Option<i64>,
    /// Entries processed per entity directory.
    pub counts: BTreeMap<&'static str, usize>,
    pub skipped: usize,
    pub dry_run: bool,
    /// The archive was already imported for this session and was skipped.
    pub unchanged: bool,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Feeds dataset archives through a [`Reconciler`].
pub struct BulkImporter<'r> {
    reconciler: &'r mut Reconciler,
}

impl<'r> BulkImporter<'r> {
    pub fn new(reconciler: &'r mut Reconciler) -> Self {
        Self { reconciler }
    }

    /// Import every routable entry of `archive`.
    ///
    /// Every entry is decoded before anything is written. An archive whose
    /// hash is already recorded for its session is skipped unless
    /// `options.force` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::HashMismatch` before processing anything when the
    /// archive hash is not the expected one, `Error::Archive` for an entry
    /// that is not valid JSON, or the first reconciliation error.
    pub async fn import(&mut self, archive: &dyn DatasetArchive, options: &ImportOptions) -> Result<ImportReport, Error> {
        let started = Instant::now();

        if let Some(expected) = &options.expected_hash {
            let actual = archive.hash().unwrap_or_default();
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::HashMismatch { expected: expected.clone(), actual: actual.to_string() });
            }
        }

        let mut routed: Vec<(usize, ArchiveEntry)> = Vec::new();
        let mut skipped = 0;
        for entry in archive.entries()? {
            match route(&entry.path) {
                Some(index) if entry.path.to_lowercase().ends_with(".json") => routed.push((index, entry)),
                _ => skipped += 1,
            }
        }
        routed.sort_by(|(a, x), (b, y)| a.cmp(b).then_with(|| x.path.cmp(&y.path)));

        let mut session_id: Option<i64> = None;
        let mut other_sessions: Vec<i64> = Vec::new();
        let mut payloads: Vec<(usize, Payload)> = Vec::with_capacity(routed.len());

        for (index, entry) in routed {
            let payload =
                Payload::from_slice(&entry.bytes).map_err(|e| Error::Archive(format!("{}: {e}", entry.path)))?;

            if let Payload::Bill(bill) = &payload {
                let id = bill.effective_session_id();
                match session_id {
                    None => session_id = Some(id),
                    Some(first) if first != id && !other_sessions.contains(&id) => other_sessions.push(id),
                    Some(_) => {}
                }
            }
            payloads.push((index, payload));
        }

        let mut report = ImportReport {
            hash: archive.hash().map(str::to_string),
            date: archive.date().to_string(),
            session_id,
            counts: BTreeMap::new(),
            skipped,
            dry_run: options.dry_run,
            unchanged: false,
            elapsed: Duration::ZERO,
        };

        if !options.force
            && let (Some(session), Some(hash)) = (session_id, archive.hash())
            && self.is_current(session, hash).await?
        {
            report.unchanged = true;
            report.skipped += payloads.len();
            report.elapsed = started.elapsed();
            tracing::info!(session_id = session, hash, "dataset already imported; skipping");
            return Ok(report);
        }

        for (index, payload) in payloads {
            if !options.dry_run {
                self.reconciler.process(payload).await?;
            }
            *report.counts.entry(ROUTES[index]).or_default() += 1;
        }

        if !other_sessions.is_empty() {
            tracing::warn!(
                ?session_id,
                ?other_sessions,
                "archive spans several sessions; recording the import against the first"
            );
        }

        if !options.dry_run
            && let (Some(session), Some(hash)) = (session_id, archive.hash())
        {
            self.reconciler.db().record_import(session, hash, archive.date()).await?;
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            hash = ?report.hash,
            session_id = ?report.session_id,
            processed = report.total(),
            skipped = report.skipped,
            dry_run = report.dry_run,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "dataset import finished"
        );
        Ok(report)
    }

    /// Whether `hash` is the last archive imported for `session_id`.
    pub async fn is_current(&self, session_id: i64, hash: &str) -> Result<bool, Error> {
        Ok(self
            .reconciler
            .db()
            .session_import_hash(session_id)
            .await?
            .is_some_and(|stored| stored.eq_ignore_ascii_case(hash)))
    }
}
