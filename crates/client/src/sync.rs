//! Pull synchronization: lists to bills to their dependent objects.
//!
//! A pass reads bill lists (per configured state, the local monitor list, or
//! the pages of configured searches), asks the reconciler which entries need
//! fetching, then imports each bill together with whatever the reconciler
//! reported missing for it. Failures are contained per bill so one bad record
//! never stops a pass.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;

use legisync_core::cache::{ApiOperation, ListTarget, SearchQuery};
use legisync_core::config::UpdateType;
use legisync_core::model::{MasterList, SearchResult};
use legisync_core::{AppConfig, ImportMode, MissingCategory, MissingQueue, Payload, Reconciler};

use crate::search::{ALL_STATES, SearchPlan};
use crate::{PullClient, PullError};

/// What a pass covers and how it paces itself.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub update_type: UpdateType,
    /// State abbreviations walked in `state` and `state_search` modes.
    pub states: Vec<String>,
    /// Search entries run in `search` and `state_search` modes.
    pub searches: Vec<String>,
    pub import_mode: ImportMode,
    /// Default cutoff for search results, overridable per entry.
    pub relevance_cutoff: i64,
    /// Pause between consecutive bills.
    pub bill_pause: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            update_type: config.update_type,
            states: config.states.clone(),
            searches: config.searches.clone(),
            import_mode: config.import_mode,
            relevance_cutoff: config.relevance_cutoff,
            bill_pause: config.bill_pause(),
        }
    }
}

/// Counts from one batch or pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Bills selected for import.
    pub requested: usize,
    pub imported: usize,
    /// Bills whose import failed.
    pub failed: usize,
    /// Selected bills skipped because they are on the ignore list.
    pub ignored: usize,
    /// Bill lists that could not be fetched.
    pub lists_failed: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: SyncReport) {
        self.requested += other.requested;
        self.imported += other.imported;
        self.failed += other.failed;
        self.ignored += other.ignored;
        self.lists_failed += other.lists_failed;
    }
}

/// Drives a [`PullClient`] and a [`Reconciler`] together.
pub struct Synchronizer {
    client: PullClient,
    reconciler: Reconciler,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(client: PullClient, reconciler: Reconciler, options: SyncOptions) -> Self {
        Self { client, reconciler, options }
    }

    pub fn client(&self) -> &PullClient {
        &self.client
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub(crate) fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    /// Import each bill and its missing dependents.
    ///
    /// A failing bill is logged and counted; the batch continues.
    pub async fn import_bills(&mut self, ids: &[i64]) -> SyncReport {
        let mut report = SyncReport { requested: ids.len(), ..Default::default() };

        for (i, &bill_id) in ids.iter().enumerate() {
            if i > 0 && !self.options.bill_pause.is_zero() {
                tokio::time::sleep(self.options.bill_pause).await;
            }
            match self.import_bill(bill_id).await {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    tracing::error!(bill_id, error = %e, "bill import failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn import_bill(&mut self, bill_id: i64) -> Result<(), PullError> {
        self.fetch(ApiOperation::Bill { id: bill_id }).await?;
        let wanted = self.reconciler.missing().clone();

        for &id in wanted.get(MissingCategory::Texts) {
            self.fetch(ApiOperation::BillText { id }).await?;
        }
        for &id in wanted.get(MissingCategory::Amendments) {
            self.fetch(ApiOperation::Amendment { id }).await?;
        }
        for &id in wanted.get(MissingCategory::Supplements) {
            self.fetch(ApiOperation::Supplement { id }).await?;
        }

        let mut people = MissingQueue::new();
        for &id in wanted.get(MissingCategory::Sponsors) {
            people.request(MissingCategory::Sponsors, id);
        }
        for &id in wanted.get(MissingCategory::Votes) {
            self.fetch(ApiOperation::RollCall { id }).await?;
            people.merge(self.reconciler.missing().clone());
        }
        for &id in people.get(MissingCategory::Sponsors) {
            self.fetch(ApiOperation::Person { id }).await?;
        }

        tracing::debug!(bill_id, dependents = wanted.len() + people.len(), "bill imported");
        Ok(())
    }

    async fn fetch(&mut self, op: ApiOperation) -> Result<(), PullError> {
        let payload = self.client.request(&op).await?;
        self.reconciler.process(payload).await?;
        Ok(())
    }

    async fn master_list(&self, state: &str) -> Result<MasterList, PullError> {
        let op = ApiOperation::MasterList { target: ListTarget::State(state.to_uppercase()), raw: true };
        match self.client.request(&op).await? {
            Payload::MasterList(list) => Ok(list),
            other => Err(PullError::Parse(format!("{} returned {}", op.name(), other.kind()))),
        }
    }

    /// Import every bill of `state` that `mode` selects, minus ignored bills.
    pub async fn sync_state(&mut self, state: &str, mode: ImportMode) -> Result<SyncReport, PullError> {
        let list = self.master_list(state).await?;
        let requested = self.reconciler.process_master_list(list, mode).await?;
        let ignored = self.reconciler.db().ignored_bills().await?;

        let (skipped, ids): (Vec<i64>, Vec<i64>) = requested.into_iter().partition(|id| ignored.contains(id));
        let mut report = self.import_bills(&ids).await;
        report.ignored = skipped.len();

        tracing::info!(state, requested = report.requested, imported = report.imported, failed = report.failed, "state synchronized");
        Ok(report)
    }

    /// Store every session the API lists for `state`.
    pub async fn sync_sessions(&mut self, state: &str) -> Result<usize, PullError> {
        let payload = self.client.request(&ApiOperation::SessionList { state: state.to_uppercase() }).await?;
        let outcomes = self.reconciler.process(payload).await?;
        tracing::info!(state, sessions = outcomes.len(), "session list synchronized");
        Ok(outcomes.len())
    }

    async fn search_page(&self, plan: &SearchPlan, page: i64) -> Result<SearchResult, PullError> {
        let op = ApiOperation::Search(SearchQuery {
            state: Some(plan.state.clone()),
            query: Some(plan.query.clone()),
            page: Some(page),
            raw: true,
            ..Default::default()
        });
        match self.client.request(&op).await? {
            Payload::SearchResult(result) => Ok(result),
            other => Err(PullError::Parse(format!("{} returned {}", op.name(), other.kind()))),
        }
    }

    /// Import the bills a search entry selects, page by page.
    ///
    /// `entry` may override `state` and the relevance cutoff (see
    /// [`SearchPlan`]). Paging stops at the last page, at an empty page, or
    /// at the first page holding a result at or below the cutoff.
    pub async fn sync_search(&mut self, state: &str, entry: &str, mode: ImportMode) -> Result<SyncReport, PullError> {
        let plan = SearchPlan::parse(entry, state, self.options.relevance_cutoff);
        let ignored = self.reconciler.db().ignored_bills().await?;

        let mut ids: Vec<i64> = Vec::new();
        let mut skipped = 0;
        let mut page = 1;
        loop {
            let result = self.search_page(&plan, page).await?;
            let summary = result.summary.clone().unwrap_or_default();
            let exhausted = summary.count == 0
                || result.results.is_empty()
                || result.results.iter().any(|r| r.relevance <= plan.relevance)
                || summary.page_total <= page;

            for id in self.reconciler.process_search(result, mode, plan.relevance).await? {
                if ignored.contains(&id) {
                    skipped += 1;
                } else if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            if exhausted {
                break;
            }
            page += 1;
        }

        let mut report = self.import_bills(&ids).await;
        report.ignored = skipped;
        tracing::info!(
            state = %plan.state,
            query = %plan.query,
            pages = page,
            requested = report.requested,
            imported = report.imported,
            "search synchronized"
        );
        Ok(report)
    }

    /// Refresh the monitor list.
    ///
    /// Monitored bills never stored are fetched directly; stored ones are
    /// checked against their state's master list.
    pub async fn sync_monitored(&mut self, mode: ImportMode) -> Result<SyncReport, PullError> {
        let monitored = self.reconciler.db().monitored_bills().await?;
        let ignored = self.reconciler.db().ignored_bills().await?;

        let mut skipped = 0;
        let mut ids = Vec::new();
        let mut by_state: BTreeMap<String, HashSet<i64>> = BTreeMap::new();
        for bill in monitored {
            if ignored.contains(&bill.bill_id) {
                skipped += 1;
                continue;
            }
            match bill.state_abbr {
                Some(state) => {
                    by_state.entry(state).or_default().insert(bill.bill_id);
                }
                None => ids.push(bill.bill_id),
            }
        }

        let mut lists_failed = 0;
        for (state, wanted) in by_state {
            let list = match self.master_list(&state).await {
                Ok(list) => list,
                Err(e) => {
                    tracing::error!(state = %state, error = %e, "master list fetch failed");
                    lists_failed += 1;
                    continue;
                }
            };
            let requested = self.reconciler.process_master_list(list, mode).await?;
            ids.extend(requested.into_iter().filter(|id| wanted.contains(id)));
        }

        let mut report = self.import_bills(&ids).await;
        report.ignored = skipped;
        report.lists_failed = lists_failed;

        tracing::info!(requested = report.requested, imported = report.imported, failed = report.failed, "monitor list synchronized");
        Ok(report)
    }

    /// One daemon pass in the configured update mode.
    pub async fn run_pass(&mut self) -> SyncReport {
        let start = Instant::now();
        let mode = self.options.import_mode;
        let mut report = SyncReport::default();

        match self.options.update_type {
            UpdateType::State => {
                for state in self.options.states.clone() {
                    match self.sync_state(&state, mode).await {
                        Ok(r) => report.absorb(r),
                        Err(e) => {
                            tracing::error!(state = %state, error = %e, "state sync failed");
                            report.lists_failed += 1;
                        }
                    }
                }
            }
            UpdateType::Monitored => match self.sync_monitored(mode).await {
                Ok(r) => report.absorb(r),
                Err(e) => {
                    tracing::error!(error = %e, "monitor list sync failed");
                    report.lists_failed += 1;
                }
            },
            UpdateType::Search | UpdateType::StateSearch => {
                let states = if self.options.update_type == UpdateType::Search {
                    vec![ALL_STATES.to_string()]
                } else {
                    self.options.states.clone()
                };
                for state in &states {
                    for entry in self.options.searches.clone() {
                        match self.sync_search(state, &entry, mode).await {
                            Ok(r) => report.absorb(r),
                            Err(e) => {
                                tracing::error!(state = %state, search = %entry, error = %e, "search sync failed");
                                report.lists_failed += 1;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(
            requested = report.requested,
            imported = report.imported,
            failed = report.failed,
            ignored = report.ignored,
            lists_failed = report.lists_failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sync pass complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use legisync_core::cache::MemoryExistenceCache;
    use legisync_core::{FileCache, ReconcileOptions, SignalSink, StoreDb};

    use super::*;
    use crate::pull::tests::{FakeTransport, client};

    struct Harness {
        sync: Synchronizer,
        transport: Arc<FakeTransport>,
        _api: TempDir,
        _docs: TempDir,
    }

    async fn harness(options: SyncOptions) -> Harness {
        let api = tempfile::tempdir().unwrap();
        let docs = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());

        let db = StoreDb::open_in_memory().await.unwrap();
        let documents = Arc::new(FileCache::permanent(docs.path()).unwrap());
        let reconcile = ReconcileOptions { want_bill_text: true, want_vote_details: true, ..Default::default() };
        let reconciler =
            Reconciler::new(db, Arc::new(MemoryExistenceCache::new()), documents, SignalSink::Disabled, reconcile);

        let sync = Synchronizer::new(client(transport.clone(), api.path()), reconciler, options);
        Harness { sync, transport, _api: api, _docs: docs }
    }

    fn options() -> SyncOptions {
        SyncOptions { bill_pause: Duration::ZERO, ..Default::default() }
    }

    fn bill(bill_id: i64, change_hash: &str) -> Value {
        json!({"status": "OK", "bill": {
            "bill_id": bill_id,
            "change_hash": change_hash,
            "session_id": 1900,
            "session": {"session_id": 1900, "state_id": 5, "year_start": 2023, "year_end": 2024, "session_name": "Regular"},
            "state": "CA",
            "state_id": 5,
            "bill_number": format!("AB{bill_id}"),
            "title": "Water",
            "sponsors": [{"people_id": 1, "person_hash": "h1", "name": "Member 1", "sponsor_type_id": 1, "sponsor_order": 1}],
            "texts": [{"doc_id": 500, "date": "2023-01-05", "type_id": 1, "mime_id": 2, "text_hash": "t1"}],
            "votes": [{"roll_call_id": 900, "date": "2023-02-01", "desc": "Third reading", "yea": 1, "nay": 1, "total": 2, "passed": 1, "chamber_id": 15}]
        }})
    }

    fn respond_dependents(transport: &FakeTransport) {
        transport.respond(
            "getBillText:500",
            json!({"status": "OK", "text": {
                "doc_id": 500, "bill_id": 100, "date": "2023-01-05", "type_id": 1, "mime_id": 2,
                "text_hash": "t1", "doc": "aGVsbG8="
            }}),
        );
        transport.respond(
            "getRollCall:900",
            json!({"status": "OK", "roll_call": {
                "roll_call_id": 900, "bill_id": 100, "yea": 1, "nay": 1, "total": 2, "passed": 1, "chamber_id": 15,
                "votes": [{"people_id": 1, "vote_id": 1}, {"people_id": 77, "vote_id": 2}]
            }}),
        );
        transport.respond(
            "getPerson:77",
            json!({"status": "OK", "person": {"people_id": 77, "person_hash": "h77", "state_id": 5, "name": "Member 77"}}),
        );
    }

    async fn count(sync: &Synchronizer, table: &'static str) -> i64 {
        sync.reconciler().db().count_rows(table).await.unwrap()
    }

    #[tokio::test]
    async fn test_import_bill_follows_missing_objects() {
        let mut h = harness(options()).await;
        h.transport.respond("getBill:100", bill(100, "abc"));
        respond_dependents(&h.transport);

        let report = h.sync.import_bills(&[100]).await;
        assert_eq!(report, SyncReport { requested: 1, imported: 1, ..Default::default() });
        assert_eq!(h.transport.calls(), vec!["getBill:100", "getBillText:500", "getRollCall:900", "getPerson:77"]);

        assert_eq!(count(&h.sync, "ls_bill").await, 1);
        assert_eq!(count(&h.sync, "ls_bill_vote_detail").await, 2);
        assert_eq!(count(&h.sync, "ls_people").await, 2);
    }

    #[tokio::test]
    async fn test_failed_bill_does_not_stop_batch() {
        let mut h = harness(options()).await;
        h.transport.respond("getBill:100", bill(100, "abc"));
        respond_dependents(&h.transport);

        let report = h.sync.import_bills(&[404, 100]).await;
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(count(&h.sync, "ls_bill").await, 1);
    }

    #[tokio::test]
    async fn test_sync_state_skips_ignored_bills() {
        let mut h = harness(options()).await;
        h.transport.respond(
            "getMasterListRaw:",
            json!({"status": "OK", "masterlist": {
                "session": {"session_id": 1900, "state_id": 5},
                "0": {"bill_id": 100, "number": "AB100", "change_hash": "abc"},
                "1": {"bill_id": 101, "number": "AB101", "change_hash": "def"}
            }}),
        );
        h.transport.respond("getBill:100", bill(100, "abc"));
        respond_dependents(&h.transport);
        h.sync.reconciler().db().ignore(101).await.unwrap();

        let report = h.sync.sync_state("ca", ImportMode::Changed).await.unwrap();
        assert_eq!(report.requested, 1);
        assert_eq!(report.imported, 1);
        assert_eq!(report.ignored, 1);
        assert!(!h.transport.calls().contains(&"getBill:101".to_string()));
    }

    #[tokio::test]
    async fn test_sync_monitored_fetches_unseen_then_checks_list() {
        let mut h = harness(options()).await;
        h.transport.respond("getBill:100", bill(100, "abc"));
        respond_dependents(&h.transport);
        h.transport.respond(
            "getMasterListRaw:",
            json!({"status": "OK", "masterlist": {
                "0": {"bill_id": 100, "number": "AB100", "change_hash": "abc"},
                "1": {"bill_id": 102, "number": "AB102", "change_hash": "zzz"}
            }}),
        );
        h.sync
            .reconciler()
            .db()
            .monitor(100, legisync_core::store::Stance::Watch)
            .await
            .unwrap();

        let first = h.sync.sync_monitored(ImportMode::Changed).await.unwrap();
        assert_eq!(first.imported, 1);
        assert!(!h.transport.calls().contains(&"getMasterListRaw:".to_string()));

        let second = h.sync.sync_monitored(ImportMode::Changed).await.unwrap();
        assert_eq!(second.requested, 0);
        assert!(h.transport.calls().contains(&"getMasterListRaw:".to_string()));
        assert!(!h.transport.calls().contains(&"getBill:102".to_string()));
    }

    fn plain_bill(bill_id: i64) -> Value {
        json!({"status": "OK", "bill": {
            "bill_id": bill_id, "change_hash": "abc", "session_id": 1900, "state_id": 5,
            "session": {"session_id": 1900, "state_id": 5, "session_name": "Regular"},
            "bill_number": format!("AB{bill_id}"), "title": "Water"
        }})
    }

    fn search_page(page: i64, page_total: i64, results: &[(i64, i64)]) -> Value {
        let results: Vec<Value> = results
            .iter()
            .map(|(bill_id, relevance)| json!({"relevance": relevance, "bill_id": bill_id, "change_hash": "abc"}))
            .collect();
        json!({"status": "OK", "searchresult": {
            "summary": {"count": results.len(), "page_current": page, "page_total": page_total, "query": "water"},
            "results": results
        }})
    }

    #[tokio::test]
    async fn test_sync_search_stops_at_relevance_cutoff() {
        let mut h = harness(SyncOptions { relevance_cutoff: 50, ..options() }).await;
        h.transport.respond("getSearchRaw::1", search_page(1, 3, &[(100, 90), (101, 80)]));
        h.transport.respond("getSearchRaw::2", search_page(2, 3, &[(102, 70), (103, 40)]));
        for id in [100, 101, 102] {
            h.transport.respond(&format!("getBill:{id}"), plain_bill(id));
        }

        let report = h.sync.sync_search(ALL_STATES, "water", ImportMode::Changed).await.unwrap();

        assert_eq!(report.requested, 3);
        assert_eq!(report.imported, 3);
        let calls = h.transport.calls();
        assert!(calls.contains(&"getSearchRaw::2".to_string()));
        assert!(!calls.contains(&"getSearchRaw::3".to_string()));
        assert!(!calls.contains(&"getBill:103".to_string()));
    }

    #[tokio::test]
    async fn test_sync_search_applies_overrides_and_ignore_list() {
        let mut h = harness(options()).await;
        h.transport.respond("getSearchRaw::1", search_page(1, 1, &[(200, 90), (201, 70), (202, 55)]));
        h.transport.respond("getBill:200", plain_bill(200));
        h.sync.reconciler().db().ignore(201).await.unwrap();

        let report = h.sync.sync_search(ALL_STATES, "tx,60|drought", ImportMode::Changed).await.unwrap();

        let query = h.transport.last_query();
        assert!(query.contains(&("state".to_string(), "TX".to_string())));
        assert!(query.contains(&("query".to_string(), "drought".to_string())));
        assert_eq!(report.requested, 1);
        assert_eq!(report.imported, 1);
        assert_eq!(report.ignored, 1);
        assert!(!h.transport.calls().contains(&"getBill:202".to_string()));
    }

    #[tokio::test]
    async fn test_run_pass_state_search_walks_states() {
        let mut h = harness(SyncOptions {
            update_type: UpdateType::StateSearch,
            states: vec!["CA".into(), "NY".into()],
            searches: vec!["water".into()],
            ..options()
        })
        .await;
        h.transport.respond("getSearchRaw::1", search_page(1, 1, &[(100, 90)]));
        h.transport.respond("getBill:100", plain_bill(100));

        let report = h.sync.run_pass().await;

        let searches = h.transport.calls().iter().filter(|c| *c == "getSearchRaw::1").count();
        assert_eq!(searches, 2);
        assert_eq!(report.imported, 1);
        assert_eq!(report.lists_failed, 0);
        assert!(h.transport.last_query().contains(&("state".to_string(), "NY".to_string())));
    }

    #[tokio::test]
    async fn test_sync_sessions_stores_list() {
        let mut h = harness(options()).await;
        h.transport.respond(
            "getSessionList:",
            json!({"status": "OK", "sessions": [
                {"session_id": 1800, "state_id": 5, "year_start": 2021, "session_name": "2021-2022"},
                {"session_id": 1900, "state_id": 5, "year_start": 2023, "session_name": "2023-2024"}
            ]}),
        );

        assert_eq!(h.sync.sync_sessions("ca").await.unwrap(), 2);
        assert_eq!(count(&h.sync, "ls_session").await, 2);
        assert!(h.transport.last_query().contains(&("state".to_string(), "CA".to_string())));
    }

    #[tokio::test]
    async fn test_run_pass_counts_failed_lists() {
        let mut h = harness(SyncOptions {
            update_type: UpdateType::State,
            states: vec!["CA".into()],
            ..options()
        })
        .await;

        let report = h.sync.run_pass().await;
        assert_eq!(report.lists_failed, 1);
        assert_eq!(report.requested, 0);
    }
}
