//! Published dataset archives compared against what the store has imported.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use legisync_core::cache::ApiOperation;
use legisync_core::model::state_abbr;

use crate::{PullError, Synchronizer};

/// Which published archives a scan looks at.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub state: Option<String>,
    pub year: Option<i64>,
    /// Only these sessions, when not empty.
    pub sessions: Vec<i64>,
    pub skip_sessions: Vec<i64>,
    /// `Some(true)` keeps special sessions only, `Some(false)` regular ones.
    pub special: Option<bool>,
}

impl ScanFilter {
    fn keeps(&self, entry: &DatasetEntry) -> bool {
        if !self.sessions.is_empty() && !self.sessions.contains(&entry.session_id) {
            return false;
        }
        if self.skip_sessions.contains(&entry.session_id) {
            return false;
        }
        self.special.is_none_or(|special| special == (entry.special != 0))
    }
}

/// One `datasetlist` entry.
#[derive(Debug, Clone, Default, Deserialize)]
struct DatasetEntry {
    #[serde(default)]
    state_id: i64,
    #[serde(default)]
    session_id: i64,
    #[serde(default)]
    special: i64,
    #[serde(default)]
    year_start: i64,
    #[serde(default)]
    year_end: i64,
    #[serde(default)]
    session_tag: String,
    #[serde(default)]
    session_name: String,
    #[serde(default)]
    dataset_hash: String,
    #[serde(default)]
    dataset_date: String,
    #[serde(default)]
    dataset_size: u64,
}

/// How a published archive relates to the last one imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetState {
    /// No archive was ever imported for the session.
    New,
    /// The published hash differs from the imported one.
    Changed,
    Same,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    pub state: String,
    pub session_id: i64,
    /// `2023` or `2023-2024`.
    pub years: String,
    pub session: String,
    pub dataset_hash: String,
    pub dataset_date: String,
    pub dataset_size: u64,
    pub status: DatasetState,
}

impl Synchronizer {
    /// Published archives matching `filter`, each marked against the store.
    ///
    /// # Errors
    ///
    /// Returns the request error, or `PullError::Parse` when the response
    /// carries no readable `datasetlist`.
    pub async fn scan_datasets(&self, filter: &ScanFilter) -> Result<Vec<DatasetStatus>, PullError> {
        let op = ApiOperation::DatasetList { state: filter.state.as_ref().map(|s| s.to_uppercase()), year: filter.year };
        let mut value = self.client().request_json(&op).await?;
        let list = match value.get_mut("datasetlist").map(Value::take) {
            Some(Value::Array(items)) => items,
            Some(Value::Object(map)) => map.into_iter().map(|(_, v)| v).collect(),
            _ => return Err(PullError::Parse(format!("{} returned no datasetlist", op.name()))),
        };

        let mut out = Vec::new();
        for item in list {
            let entry: DatasetEntry = serde_json::from_value(item).map_err(|e| PullError::Parse(e.to_string()))?;
            if entry.session_id <= 0 || !filter.keeps(&entry) {
                continue;
            }

            let stored = self.reconciler().db().session_import_hash(entry.session_id).await?;
            let status = match stored {
                None => DatasetState::New,
                Some(hash) if hash.eq_ignore_ascii_case(&entry.dataset_hash) => DatasetState::Same,
                Some(_) => DatasetState::Changed,
            };
            let years = if entry.year_end > entry.year_start {
                format!("{}-{}", entry.year_start, entry.year_end)
            } else {
                entry.year_start.to_string()
            };
            out.push(DatasetStatus {
                state: state_abbr(entry.state_id).unwrap_or_default().to_string(),
                session_id: entry.session_id,
                years,
                session: if entry.session_tag.is_empty() { entry.session_name } else { entry.session_tag },
                dataset_hash: entry.dataset_hash,
                dataset_date: entry.dataset_date,
                dataset_size: entry.dataset_size,
                status,
            });
        }

        let eligible = out.iter().filter(|d| d.status != DatasetState::Same).count();
        tracing::info!(checked = out.len(), eligible, "dataset list scanned");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use legisync_core::cache::MemoryExistenceCache;
    use legisync_core::{FileCache, Payload, ReconcileOptions, Reconciler, SignalSink, StoreDb};

    use super::*;
    use crate::SyncOptions;
    use crate::pull::tests::{FakeTransport, client};

    async fn synchronizer(transport: Arc<FakeTransport>, api: &TempDir, docs: &TempDir) -> Synchronizer {
        let db = StoreDb::open_in_memory().await.unwrap();
        let documents = Arc::new(FileCache::permanent(docs.path()).unwrap());
        let reconciler = Reconciler::new(
            db,
            Arc::new(MemoryExistenceCache::new()),
            documents,
            SignalSink::Disabled,
            ReconcileOptions::default(),
        );
        Synchronizer::new(client(transport, api.path()), reconciler, SyncOptions::default())
    }

    fn dataset_list() -> Value {
        json!({"status": "OK", "datasetlist": [
            {"state_id": 5, "session_id": 1900, "special": 0, "year_start": 2023, "year_end": 2024,
             "session_tag": "Regular Session", "dataset_hash": "aaa", "dataset_date": "2024-05-01", "dataset_size": 1000},
            {"state_id": 5, "session_id": 1901, "special": 1, "year_start": 2023, "year_end": 2023,
             "session_tag": "1st Special Session", "dataset_hash": "bbb", "dataset_date": "2024-05-02", "dataset_size": 200},
            {"state_id": 5, "session_id": 1800, "special": 0, "year_start": 2021, "year_end": 2022,
             "session_tag": "Regular Session", "dataset_hash": "ccc", "dataset_date": "2022-12-01", "dataset_size": 900}
        ]})
    }

    #[tokio::test]
    async fn test_scan_marks_new_changed_same() {
        let (api, docs) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getDatasetList:", dataset_list());
        let mut sync = synchronizer(transport.clone(), &api, &docs).await;
        let sessions = Payload::from_value(json!({"status": "OK", "sessions": [
            {"session_id": 1900, "state_id": 5, "year_start": 2023},
            {"session_id": 1800, "state_id": 5, "year_start": 2021}
        ]}))
        .unwrap();
        sync.reconciler_mut().process(sessions).await.unwrap();
        let db = sync.reconciler().db();
        db.record_import(1900, "old", "2024-01-01").await.unwrap();
        db.record_import(1800, "CCC", "2022-12-01").await.unwrap();

        let filter = ScanFilter { state: Some("ca".into()), year: Some(2), ..Default::default() };
        let scanned = sync.scan_datasets(&filter).await.unwrap();

        let statuses: Vec<_> = scanned.iter().map(|d| (d.session_id, d.status)).collect();
        assert_eq!(
            statuses,
            vec![(1900, DatasetState::Changed), (1901, DatasetState::New), (1800, DatasetState::Same)]
        );
        assert_eq!(scanned[0].state, "CA");
        assert_eq!(scanned[0].years, "2023-2024");
        assert_eq!(scanned[1].years, "2023");
        assert!(transport.last_query().contains(&("state".to_string(), "CA".to_string())));
        assert!(transport.last_query().contains(&("year".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_scan_filters_sessions() {
        let (api, docs) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getDatasetList:", dataset_list());
        let sync = synchronizer(transport, &api, &docs).await;

        let regular = ScanFilter { special: Some(false), skip_sessions: vec![1800], ..Default::default() };
        let scanned = sync.scan_datasets(&regular).await.unwrap();
        assert_eq!(scanned.iter().map(|d| d.session_id).collect::<Vec<_>>(), vec![1900]);

        let only = ScanFilter { sessions: vec![1901], ..Default::default() };
        let scanned = sync.scan_datasets(&only).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].session, "1st Special Session");
    }

    #[tokio::test]
    async fn test_scan_without_list_is_parse_error() {
        let (api, docs) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let transport = Arc::new(FakeTransport::default());
        transport.respond("getDatasetList:", json!({"status": "OK"}));
        let sync = synchronizer(transport, &api, &docs).await;

        let err = sync.scan_datasets(&ScanFilter::default()).await.unwrap_err();
        assert!(matches!(err, PullError::Parse(_)));
    }
}
