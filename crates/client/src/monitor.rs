//! The remote monitor list, pushed to and pulled from.
//!
//! Local monitor and ignore lists live in the store. These operations mirror
//! a local change remotely (`setMonitor`) or import the remote list, optionally
//! adopting its stances locally.

use serde_json::Value;

use legisync_core::cache::{ApiOperation, MonitorAction};
use legisync_core::store::Stance;
use legisync_core::{ImportMode, Payload};

use crate::{PullError, SyncReport, Synchronizer};

/// Record whose monitor list is read.
const CURRENT_RECORD: &str = "current";

/// Entries of a list that may arrive as an array or an indexed object.
fn items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

fn int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stance as sent by the API, either its number or its name.
fn stance(value: Option<&Value>) -> Stance {
    match value {
        Some(Value::String(name)) => match name.trim().to_ascii_lowercase().as_str() {
            "support" => Stance::Support,
            "oppose" => Stance::Oppose,
            other => Stance::from_i64(other.parse().unwrap_or_default()),
        },
        other => Stance::from_i64(int(other).unwrap_or_default()),
    }
}

impl Synchronizer {
    /// Apply `action` to the remote monitor list.
    ///
    /// Returns the per-bill messages of the reply. Messages starting with
    /// `ERROR` are logged as warnings; the call itself still succeeds.
    pub async fn push_monitor(
        &self,
        action: MonitorAction,
        bill_ids: &[i64],
        stance: Stance,
    ) -> Result<Vec<(i64, String)>, PullError> {
        if bill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let op = ApiOperation::SetMonitor { action, bill_ids: bill_ids.to_vec(), stance };
        let value = self.client().request_json(&op).await?;

        let mut replies = Vec::new();
        if let Some(Value::Object(map)) = value.get("return") {
            for (id, message) in map {
                let message = message.as_str().map_or_else(|| message.to_string(), str::to_string);
                let bill_id = id.parse().unwrap_or_default();
                if message.to_ascii_uppercase().starts_with("ERROR") {
                    tracing::warn!(bill_id, action = action.as_str(), %message, "remote monitor list refused bill");
                } else {
                    tracing::debug!(bill_id, action = action.as_str(), %message, "remote monitor list updated");
                }
                replies.push((bill_id, message));
            }
        }
        replies.sort();
        Ok(replies)
    }

    /// Import the bills on the remote monitor list that `mode` selects.
    ///
    /// With `adopt`, every remote entry is first monitored locally with its
    /// remote stance. Ignored bills are never fetched.
    pub async fn sync_remote_monitor_list(&mut self, adopt: bool, mode: ImportMode) -> Result<SyncReport, PullError> {
        let op = ApiOperation::MonitorList { record: CURRENT_RECORD.into(), raw: true };
        let value = self.client().request_json(&op).await?;

        if adopt {
            let db = self.reconciler().db().clone();
            let mut adopted = 0;
            for item in items(value.get("monitorlist")) {
                if let Some(bill_id) = int(item.get("bill_id")).filter(|id| *id > 0) {
                    db.monitor(bill_id, stance(item.get("stance"))).await?;
                    adopted += 1;
                }
            }
            tracing::info!(adopted, "remote monitor list adopted locally");
        }

        let list = match Payload::from_value(value)? {
            Payload::MonitorList(list) => list,
            other => return Err(PullError::Parse(format!("{} returned {}", op.name(), other.kind()))),
        };
        let requested = self.reconciler_mut().process_monitor_list(list, mode).await?;
        let ignored = self.reconciler().db().ignored_bills().await?;

        let (skipped, ids): (Vec<i64>, Vec<i64>) = requested.into_iter().partition(|id| ignored.contains(id));
        let mut report = self.import_bills(&ids).await;
        report.ignored = skipped.len();

        tracing::info!(requested = report.requested, imported = report.imported, failed = report.failed, "remote monitor list synchronized");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    use legisync_core::cache::MemoryExistenceCache;
    use legisync_core::{FileCache, ReconcileOptions, Reconciler, SignalSink, StoreDb};

    use super::*;
    use crate::SyncOptions;
    use crate::pull::tests::{FakeTransport, client};

    struct Harness {
        sync: Synchronizer,
        transport: Arc<FakeTransport>,
        _api: TempDir,
        _docs: TempDir,
    }

    async fn harness() -> Harness {
        let api = tempfile::tempdir().unwrap();
        let docs = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let db = StoreDb::open_in_memory().await.unwrap();
        let reconciler = Reconciler::new(
            db,
            Arc::new(MemoryExistenceCache::new()),
            Arc::new(FileCache::permanent(docs.path()).unwrap()),
            SignalSink::Disabled,
            ReconcileOptions { want_vote_details: false, ..Default::default() },
        );
        let options = SyncOptions { bill_pause: Duration::ZERO, ..Default::default() };
        let sync = Synchronizer::new(client(transport.clone(), api.path()), reconciler, options);
        Harness { sync, transport, _api: api, _docs: docs }
    }

    fn bill(bill_id: i64) -> Value {
        json!({"status": "OK", "bill": {
            "bill_id": bill_id, "change_hash": "abc", "session_id": 1900, "state_id": 5,
            "session": {"session_id": 1900, "state_id": 5, "session_name": "Regular"},
            "bill_number": format!("AB{bill_id}"), "title": "Water"
        }})
    }

    #[tokio::test]
    async fn test_push_monitor_reports_messages() {
        let h = harness().await;
        h.transport.respond(
            "setMonitor:",
            json!({"status": "OK", "return": {"101": "ERROR Unknown bill_id", "100": "Monitor added"}}),
        );

        let replies = h.sync.push_monitor(MonitorAction::Monitor, &[100, 101], Stance::Support).await.unwrap();
        assert_eq!(replies, vec![(100, "Monitor added".to_string()), (101, "ERROR Unknown bill_id".to_string())]);

        let query = h.transport.last_query();
        assert!(query.contains(&("action".to_string(), "monitor".to_string())));
        assert!(query.contains(&("stance".to_string(), "support".to_string())));
        assert!(query.contains(&("list".to_string(), "100,101".to_string())));
    }

    #[tokio::test]
    async fn test_push_monitor_empty_list_is_noop() {
        let h = harness().await;
        let replies = h.sync.push_monitor(MonitorAction::Remove, &[], Stance::Watch).await.unwrap();
        assert!(replies.is_empty());
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_monitor_list_adopted_and_imported() {
        let mut h = harness().await;
        h.transport.respond(
            "getMonitorListRaw:",
            json!({"status": "OK", "monitorlist": [
                {"bill_id": 100, "state": "CA", "number": "AB100", "change_hash": "abc", "stance": "Oppose"},
                {"bill_id": 102, "state": "CA", "number": "AB102", "change_hash": "abc", "stance": 1}
            ]}),
        );
        h.transport.respond("getBill:100", bill(100));
        h.transport.respond("getBill:102", bill(102));

        let report = h.sync.sync_remote_monitor_list(true, ImportMode::Changed).await.unwrap();
        assert_eq!(report.imported, 2);

        let monitored = h.sync.reconciler().db().monitored_bills().await.unwrap();
        let mut stances: Vec<_> = monitored.iter().map(|m| (m.bill_id, m.stance)).collect();
        stances.sort_by_key(|(id, _)| *id);
        assert_eq!(stances, vec![(100, Stance::Oppose), (102, Stance::Support)]);
    }

    #[tokio::test]
    async fn test_remote_monitor_list_skips_ignored_without_adopting() {
        let mut h = harness().await;
        h.transport.respond(
            "getMonitorListRaw:",
            json!({"status": "OK", "monitorlist": [
                {"bill_id": 100, "change_hash": "abc", "stance": 0},
                {"bill_id": 102, "change_hash": "def", "stance": 2}
            ]}),
        );
        h.transport.respond("getBill:100", bill(100));
        h.sync.reconciler().db().ignore(102).await.unwrap();

        let report = h.sync.sync_remote_monitor_list(false, ImportMode::Changed).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.ignored, 1);
        assert!(!h.transport.calls().contains(&"getBill:102".to_string()));
        assert!(h.sync.reconciler().db().monitored_bills().await.unwrap().is_empty());
    }

    #[test]
    fn test_stance_names_and_numbers() {
        assert_eq!(stance(Some(&json!("Support"))), Stance::Support);
        assert_eq!(stance(Some(&json!("2"))), Stance::Oppose);
        assert_eq!(stance(Some(&json!(1))), Stance::Support);
        assert_eq!(stance(None), Stance::Watch);
    }
}
