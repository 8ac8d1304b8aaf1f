//! Bill lists turned into fetch requests.

use tokio_rusqlite::rusqlite::{OptionalExtension, params};

use super::probe::Entity;
use super::{ImportMode, Reconciler, Scope};
use crate::Error;
use crate::missing::MissingCategory;
use crate::model::{ListEntry, MasterList, MonitorList, SearchResult};

impl Reconciler {
    /// Queue every listed bill that `mode` selects. Returns the bill ids
    /// requested.
    pub async fn process_master_list(&mut self, list: MasterList, mode: ImportMode) -> Result<Vec<i64>, Error> {
        self.missing.reset();
        self.request_bills(list.bills, mode).await
    }

    /// Like [`process_master_list`](Self::process_master_list), ignoring
    /// results whose relevance is at or below `cutoff`.
    pub async fn process_search(
        &mut self,
        result: SearchResult,
        mode: ImportMode,
        cutoff: i64,
    ) -> Result<Vec<i64>, Error> {
        self.missing.reset();
        let entries = result.results.into_iter().filter(|e| e.relevance > cutoff).collect();
        self.request_bills(entries, mode).await
    }

    pub async fn process_monitor_list(&mut self, list: MonitorList, mode: ImportMode) -> Result<Vec<i64>, Error> {
        self.missing.reset();
        self.request_bills(list.bills, mode).await
    }

    async fn request_bills(&mut self, entries: Vec<ListEntry>, mode: ImportMode) -> Result<Vec<i64>, Error> {
        let (requested, _) = self
            .apply(move |s| {
                let mut requested = Vec::new();
                for entry in entries.iter().filter(|e| e.bill_id > 0) {
                    if wants(s, entry, mode)? && s.missing.request(MissingCategory::Bills, entry.bill_id) {
                        requested.push(entry.bill_id);
                    }
                }
                Ok(requested)
            })
            .await?;
        tracing::debug!(requested = requested.len(), ?mode, "bill list reconciled");
        Ok(requested)
    }
}

fn wants(s: &mut Scope<'_>, entry: &ListEntry, mode: ImportMode) -> Result<bool, Error> {
    match mode {
        ImportMode::New => Ok(!s.probe.exists(Entity::Bill, entry.bill_id)?),
        ImportMode::Changed | ImportMode::All => {
            let current = s
                .conn
                .prepare_cached("SELECT 1 FROM ls_bill WHERE bill_id = ?1 AND change_hash = ?2")?
                .query_row(params![entry.bill_id, entry.change_hash], |_| Ok(()))
                .optional()?;
            Ok(current.is_none())
        }
    }
}
