//! Change notifications for downstream consumers.
//!
//! After an entity commits, a signal `(object_type, object_id)` is raised in
//! one of two places: the `ls_signal` table, or a drop directory holding one
//! small JSON file per object. Consumers mark table rows processed; the
//! engine re-arms them on the next change.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_rusqlite::params;

use crate::config::{AppConfig, MiddlewareSignal};
use crate::store::{StoreDb, timestamp};
use crate::{Error, config::ConfigError};

/// Body of a drop-directory signal file.
#[derive(Debug, Serialize)]
struct SignalFile<'a> {
    object_type: &'a str,
    object_id: i64,
    updated: String,
}

/// Destination for change notifications.
#[derive(Debug, Clone, Default)]
pub enum SignalSink {
    #[default]
    Disabled,
    /// Rows in `ls_signal`.
    Table,
    /// `{object_type}.{object_id}` files in a directory.
    Directory(PathBuf),
}

impl SignalSink {
    /// Sink selected by `middleware_signal`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if directory signalling has no directory.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        match config.middleware_signal {
            MiddlewareSignal::None => Ok(Self::Disabled),
            MiddlewareSignal::Table => Ok(Self::Table),
            MiddlewareSignal::Directory => config
                .signal_dir
                .clone()
                .map(Self::Directory)
                .ok_or_else(|| ConfigError::Missing {
                    field: "signal_dir".into(),
                    hint: "set LEGISYNC_SIGNAL_DIR when middleware_signal = directory".into(),
                }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Raise a signal. Returns whether a new or re-armed signal was written.
    ///
    /// # Errors
    ///
    /// Returns the store or filesystem error.
    pub async fn emit(&self, db: &StoreDb, object_type: &str, object_id: i64) -> Result<bool, Error> {
        match self {
            Self::Disabled => Ok(false),
            Self::Table => emit_row(db, object_type, object_id).await,
            Self::Directory(dir) => emit_file(dir, object_type, object_id).await,
        }
    }
}

async fn emit_row(db: &StoreDb, object_type: &str, object_id: i64) -> Result<bool, Error> {
    let object_type = object_type.to_string();
    let now = timestamp();
    db.conn
        .call(move |conn| -> Result<bool, Error> {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO ls_signal (object_type, object_id, processed, updated, created)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![object_type, object_id, now],
            )?;
            if inserted > 0 {
                return Ok(true);
            }
            let rearmed = conn.execute(
                "UPDATE ls_signal SET processed = 0, updated = ?3
                 WHERE object_type = ?1 AND object_id = ?2 AND processed >= 1",
                params![object_type, object_id, now],
            )?;
            Ok(rearmed > 0)
        })
        .await
        .map_err(Error::from)
}

async fn emit_file(dir: &Path, object_type: &str, object_id: i64) -> Result<bool, Error> {
    let path = dir.join(format!("{object_type}.{object_id}"));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(false);
    }

    let body = serde_json::to_vec(&SignalFile { object_type, object_id, updated: timestamp() })?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| Error::CacheWrite { path: path.clone(), source })?;
    Ok(true)
}
