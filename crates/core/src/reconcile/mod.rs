//! Reconciliation of decoded payloads into the relational store.
//!
//! Every top-level entity (bill, document, roll call, person, session) is
//! applied inside its own transaction: the stored snapshot is loaded, the
//! payload is diffed against it and only differing rows are written. A
//! failure anywhere rolls the whole entity back. Existence confirmations and
//! change signals are published only after the commit succeeds.
//!
//! Objects the payload references but the store lacks accumulate in a
//! [`MissingQueue`] that callers drain to decide what to fetch next.

mod bill;
mod documents;
mod lists;
mod people;
pub mod probe;
pub(crate) mod rows;
mod session;
pub mod write;


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::Connection;

use crate::Error;
use crate::cache::{ExistenceCache, FileCache};
use crate::missing::{MissingMap, MissingQueue};
use crate::model::Payload;
use crate::signal::SignalSink;
use crate::store::{StoreDb, timestamp};

pub use bill::BillSnapshot;
pub use probe::Entity;
pub use write::{Write, WriteKind, WriteLog};

use probe::Probe;
use rows::Columns;
use write::Writer;

/// Which list entries become bill requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Only bills not yet stored.
    New,
    /// Bills whose stored change hash differs.
    #[default]
    Changed,
    /// Same selection as `Changed`; kept for configuration compatibility.
    All,
}

/// Engine toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Request full text for newly seen text stubs.
    pub want_bill_text: bool,
    pub want_amendment: bool,
    pub want_supplement: bool,
    /// Request roll call detail for newly seen vote stubs.
    pub want_vote_details: bool,
    /// Store empty and `0000-00-00` dates as NULL.
    pub massage_dates: bool,
    pub import_mode: ImportMode,
    /// Search results at or below this relevance are ignored.
    pub relevance_cutoff: i64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            want_bill_text: false,
            want_amendment: false,
            want_supplement: false,
            want_vote_details: true,
            massage_dates: false,
            import_mode: ImportMode::Changed,
            relevance_cutoff: 0,
        }
    }
}

/// Whether an entity was stored before this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    New,
    Existing,
}

/// Result of reconciling one top-level entity.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Signal object type (`bill`, `text`, `rollcall`, ...).
    pub object: &'static str,
    pub id: i64,
    pub state: EntryState,
    pub writes: WriteLog,
}

impl Outcome {
    /// Whether reconciliation changed anything in the store.
    pub fn changed(&self) -> bool {
        !self.writes.is_empty()
    }
}

/// Per-transaction working set handed to the entity routines.
pub(crate) struct Scope<'a> {
    pub conn: &'a Connection,
    pub w: Writer<'a>,
    pub probe: Probe<'a>,
    pub missing: MissingQueue,
    pub options: ReconcileOptions,
    pub cols: Columns,
    pub documents: &'a FileCache,
    /// Extra signals raised while applying, e.g. a session touched by a bill.
    pub signals: Vec<(&'static str, i64)>,
}

impl Scope<'_> {
    pub fn request_if(&mut self, wanted: bool, category: crate::missing::MissingCategory, id: i64) {
        if wanted {
            self.missing.request(category, id);
        }
    }
}

/// Applies payloads to the store.
///
/// One reconciler serves one writer; methods take `&mut self` because the
/// missing queue is per call.
pub struct Reconciler {
    db: StoreDb,
    existence: Arc<dyn ExistenceCache>,
    documents: Arc<FileCache>,
    signals: SignalSink,
    options: ReconcileOptions,
    missing: MissingQueue,
}

struct Applied<T> {
    value: T,
    writes: WriteLog,
    missing: MissingQueue,
    confirmed: Vec<(String, i64)>,
    signals: Vec<(&'static str, i64)>,
}

impl Reconciler {
    pub fn new(
        db: StoreDb,
        existence: Arc<dyn ExistenceCache>,
        documents: Arc<FileCache>,
        signals: SignalSink,
        options: ReconcileOptions,
    ) -> Self {
        Self { db, existence, documents, signals, options, missing: MissingQueue::new() }
    }

    pub fn db(&self) -> &StoreDb {
        &self.db
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    pub(crate) fn columns(&self) -> Columns {
        Columns { massage_dates: self.options.massage_dates }
    }

    /// Objects requested by the last `process_*` call.
    pub fn missing(&self) -> &MissingQueue {
        &self.missing
    }

    /// Missing ids grouped by category.
    pub fn get_missing(&self) -> &MissingMap {
        self.missing.get_all()
    }

    /// Decode and apply a raw payload body.
    ///
    /// # Errors
    ///
    /// A non-`OK` status or malformed body fails before the store is touched.
    pub async fn process_bytes(&mut self, bytes: &[u8]) -> Result<Vec<Outcome>, Error> {
        self.missing.reset();
        let payload = Payload::from_slice(bytes)?;
        self.process(payload).await
    }

    /// Apply any decoded payload.
    ///
    /// List payloads produce no outcomes; their requests land in the missing
    /// queue.
    pub async fn process(&mut self, payload: Payload) -> Result<Vec<Outcome>, Error> {
        let mode = self.options.import_mode;
        match payload {
            Payload::Bill(bill) => Ok(vec![self.process_bill(*bill).await?]),
            Payload::Text(text) => Ok(vec![self.process_text(*text).await?]),
            Payload::Amendment(amendment) => Ok(vec![self.process_amendment(*amendment).await?]),
            Payload::Supplement(supplement) => Ok(vec![self.process_supplement(*supplement).await?]),
            Payload::RollCall(roll_call) => Ok(vec![self.process_roll_call(*roll_call).await?]),
            Payload::Person(person) => Ok(vec![self.process_person(*person).await?]),
            Payload::Session(session) => Ok(vec![self.process_session(*session).await?]),
            Payload::Sessions(sessions) => self.process_session_list(sessions).await,
            Payload::MasterList(list) => self.process_master_list(list, mode).await.map(|_| Vec::new()),
            Payload::SearchResult(result) => {
                let cutoff = self.options.relevance_cutoff;
                self.process_search(result, mode, cutoff).await.map(|_| Vec::new())
            }
            Payload::MonitorList(list) => self.process_monitor_list(list, mode).await.map(|_| Vec::new()),
        }
    }

    /// Run `apply` in one transaction and publish its side effects on commit.
    async fn apply<T, F>(&mut self, apply: F) -> Result<(T, WriteLog), Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut Scope<'_>) -> Result<T, Error> + Send + 'static,
    {
        let existence = Arc::clone(&self.existence);
        let documents = Arc::clone(&self.documents);
        let options = self.options;
        let cols = self.columns();

        let applied = self
            .db
            .conn
            .call(move |conn| -> Result<Applied<T>, Error> {
                let tx = conn.transaction()?;
                let applied = {
                    let mut scope = Scope {
                        conn: &tx,
                        w: Writer::new(&tx, timestamp()),
                        probe: Probe::new(&tx, existence.as_ref()),
                        missing: MissingQueue::new(),
                        options,
                        cols,
                        documents: documents.as_ref(),
                        signals: Vec::new(),
                    };
                    let value = apply(&mut scope)?;
                    Applied {
                        value,
                        writes: scope.w.into_log(),
                        missing: scope.missing,
                        confirmed: scope.probe.into_confirmed(),
                        signals: scope.signals,
                    }
                };
                tx.commit()?;
                Ok(applied)
            })
            .await
            .map_err(Error::from)?;

        probe::publish(self.existence.as_ref(), applied.confirmed);
        self.missing.merge(applied.missing);
        for (object, id) in applied.signals {
            self.signal(object, id).await;
        }
        Ok((applied.value, applied.writes))
    }

    /// Raise a change signal; failures are logged, never propagated.
    async fn signal(&self, object: &'static str, id: i64) {
        if let Err(e) = self.signals.emit(&self.db, object, id).await {
            tracing::warn!(object, id, error = %e, "failed to raise change signal");
        }
    }
}
