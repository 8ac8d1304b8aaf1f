//! Remote operations, their response cache keys and lifetimes.
//!
//! Keys are relative paths of the form `{category}/{key}.json`. Identifier
//! operations key on the id alone; searches key on a sanitized, lower-cased
//! join of every query parameter.

use serde::{Deserialize, Serialize};

use crate::store::Stance;

/// Longest search key fragment, leaving room for `.json` under a 255 byte name limit.
const MAX_SEARCH_CHUNK: usize = 250;

/// Lifetime of immutable artifacts (texts, amendments, supplements, roll calls).
const IMMUTABLE_TTL: u64 = 2_592_000;

/// Top-level directories owned by the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    SessionList,
    MasterList,
    Bill,
    Text,
    Amendment,
    Supplement,
    RollCall,
    People,
    Search,
    DatasetList,
    MonitorList,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 11] = [
        CacheCategory::SessionList,
        CacheCategory::MasterList,
        CacheCategory::Bill,
        CacheCategory::Text,
        CacheCategory::Amendment,
        CacheCategory::Supplement,
        CacheCategory::RollCall,
        CacheCategory::People,
        CacheCategory::Search,
        CacheCategory::DatasetList,
        CacheCategory::MonitorList,
    ];

    pub fn dir(self) -> &'static str {
        match self {
            CacheCategory::SessionList => "sessionlist",
            CacheCategory::MasterList => "masterlist",
            CacheCategory::Bill => "bill",
            CacheCategory::Text => "text",
            CacheCategory::Amendment => "amendment",
            CacheCategory::Supplement => "supplement",
            CacheCategory::RollCall => "rollcall",
            CacheCategory::People => "people",
            CacheCategory::Search => "search",
            CacheCategory::DatasetList => "datasetlist",
            CacheCategory::MonitorList => "monitorlist",
        }
    }

    /// Age in seconds after which an entry of this category is stale.
    pub fn ttl(self) -> u64 {
        match self {
            CacheCategory::SessionList => 86_400,
            CacheCategory::MasterList | CacheCategory::Search => 3600,
            CacheCategory::Bill => 10_800,
            CacheCategory::Text | CacheCategory::Amendment | CacheCategory::Supplement | CacheCategory::RollCall => {
                IMMUTABLE_TTL
            }
            CacheCategory::People => 604_800,
            CacheCategory::DatasetList => 86_400,
            CacheCategory::MonitorList => 0,
        }
    }
}

/// Session or state a master list is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTarget {
    Session(i64),
    State(String),
}

/// Parameters of a full-text or bill-number search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// State abbreviation or `ALL`.
    pub state: Option<String>,
    pub bill: Option<String>,
    pub query: Option<String>,
    /// 1=all, 2=current, 3=recent, 4=prior, otherwise a specific year.
    pub year: Option<i64>,
    pub page: Option<i64>,
    /// Raw searches return only ids, relevance and change hashes.
    pub raw: bool,
}

/// Change applied to the remote monitor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorAction {
    Monitor,
    Ignore,
    /// Drop the bill from whichever remote list holds it.
    Remove,
}

impl MonitorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorAction::Monitor => "monitor",
            MonitorAction::Ignore => "ignore",
            MonitorAction::Remove => "remove",
        }
    }
}

/// One request against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOperation {
    SessionList { state: String },
    MasterList { target: ListTarget, raw: bool },
    Bill { id: i64 },
    BillText { id: i64 },
    Amendment { id: i64 },
    Supplement { id: i64 },
    RollCall { id: i64 },
    Person { id: i64 },
    Search(SearchQuery),
    DatasetList { state: Option<String>, year: Option<i64> },
    MonitorList { record: String, raw: bool },
    SetMonitor { action: MonitorAction, bill_ids: Vec<i64>, stance: Stance },
}

impl ApiOperation {
    /// Operation name sent as the `op` query parameter.
    pub fn name(&self) -> &'static str {
        match self {
            ApiOperation::SessionList { .. } => "getSessionList",
            ApiOperation::MasterList { raw: false, .. } => "getMasterList",
            ApiOperation::MasterList { raw: true, .. } => "getMasterListRaw",
            ApiOperation::Bill { .. } => "getBill",
            ApiOperation::BillText { .. } => "getBillText",
            ApiOperation::Amendment { .. } => "getAmendment",
            ApiOperation::Supplement { .. } => "getSupplement",
            ApiOperation::RollCall { .. } => "getRollCall",
            ApiOperation::Person { .. } => "getPerson",
            ApiOperation::Search(q) if q.raw => "getSearchRaw",
            ApiOperation::Search(_) => "getSearch",
            ApiOperation::DatasetList { .. } => "getDatasetList",
            ApiOperation::MonitorList { raw: false, .. } => "getMonitorList",
            ApiOperation::MonitorList { raw: true, .. } => "getMonitorListRaw",
            ApiOperation::SetMonitor { .. } => "setMonitor",
        }
    }

    /// Operation-specific query parameters (excluding key and op).
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            ApiOperation::SessionList { state } => vec![("state", state.clone())],
            ApiOperation::MasterList { target: ListTarget::Session(id), .. } => vec![("id", id.to_string())],
            ApiOperation::MasterList { target: ListTarget::State(state), .. } => vec![("state", state.clone())],
            ApiOperation::Bill { id }
            | ApiOperation::BillText { id }
            | ApiOperation::Amendment { id }
            | ApiOperation::Supplement { id }
            | ApiOperation::RollCall { id }
            | ApiOperation::Person { id } => vec![("id", id.to_string())],
            ApiOperation::Search(q) => {
                let mut params = Vec::new();
                if let Some(state) = &q.state {
                    params.push(("state", state.clone()));
                }
                if let Some(bill) = &q.bill {
                    params.push(("bill", bill.clone()));
                }
                if let Some(query) = &q.query {
                    params.push(("query", query.clone()));
                }
                if let Some(year) = q.year {
                    params.push(("year", year.to_string()));
                }
                if let Some(page) = q.page {
                    params.push(("page", page.to_string()));
                }
                params
            }
            ApiOperation::DatasetList { state, year } => {
                let mut params = Vec::new();
                if let Some(state) = state {
                    params.push(("state", state.clone()));
                }
                if let Some(year) = year {
                    params.push(("year", year.to_string()));
                }
                params
            }
            ApiOperation::MonitorList { record, .. } => vec![("record", record.clone())],
            ApiOperation::SetMonitor { action, bill_ids, stance } => {
                let list = bill_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
                let stance = match stance {
                    Stance::Watch => "watch",
                    Stance::Support => "support",
                    Stance::Oppose => "oppose",
                };
                vec![("action", action.as_str().into()), ("stance", stance.into()), ("list", list)]
            }
        }
    }

    pub fn category(&self) -> CacheCategory {
        match self {
            ApiOperation::SessionList { .. } => CacheCategory::SessionList,
            ApiOperation::MasterList { .. } => CacheCategory::MasterList,
            ApiOperation::Bill { .. } => CacheCategory::Bill,
            ApiOperation::BillText { .. } => CacheCategory::Text,
            ApiOperation::Amendment { .. } => CacheCategory::Amendment,
            ApiOperation::Supplement { .. } => CacheCategory::Supplement,
            ApiOperation::RollCall { .. } => CacheCategory::RollCall,
            ApiOperation::Person { .. } => CacheCategory::People,
            ApiOperation::Search(_) => CacheCategory::Search,
            ApiOperation::DatasetList { .. } => CacheCategory::DatasetList,
            ApiOperation::MonitorList { .. } | ApiOperation::SetMonitor { .. } => CacheCategory::MonitorList,
        }
    }

    /// Response lifetime in seconds; 0 means never served from cache.
    pub fn ttl(&self) -> u64 {
        match self {
            ApiOperation::SetMonitor { .. } => 0,
            op => op.category().ttl(),
        }
    }

    /// Relative cache path for this request.
    pub fn cache_key(&self) -> String {
        let key = match self {
            ApiOperation::SessionList { state } => state.to_lowercase(),
            ApiOperation::MasterList { target, raw } => {
                let base = match target {
                    ListTarget::Session(id) => id.to_string(),
                    ListTarget::State(state) => state.to_lowercase(),
                };
                if *raw { format!("{base}_raw") } else { base }
            }
            ApiOperation::Bill { id }
            | ApiOperation::BillText { id }
            | ApiOperation::Amendment { id }
            | ApiOperation::Supplement { id }
            | ApiOperation::RollCall { id }
            | ApiOperation::Person { id } => id.to_string(),
            ApiOperation::Search(q) => search_key(q),
            ApiOperation::DatasetList { state, year } => {
                let mut chunks = vec!["list".to_string()];
                chunks.extend(state.clone());
                chunks.extend(year.map(|y| format!("y{y}")));
                chunks.join("_").to_lowercase()
            }
            ApiOperation::MonitorList { record, raw } => {
                let record = record.to_lowercase();
                if *raw { format!("{record}_raw") } else { record }
            }
            ApiOperation::SetMonitor { action, .. } => action.as_str().to_string(),
        };
        format!("{}/{key}.json", self.category().dir())
    }
}

/// Document cache path for a stored document.
///
/// Layout is `{object}/{state}/{session}/{bill_number}/{id}/{extension}`,
/// lower-cased. Path separators inside the bill number are replaced so the
/// number stays a single component.
pub fn document_key(object: &str, state_abbr: &str, session_id: i64, bill_number: &str, id: i64, mime_id: i64) -> String {
    let number: String = bill_number.chars().map(|c| if c == '/' || c == '\\' { '_' } else { c }).collect();
    format!(
        "{object}/{state_abbr}/{session_id}/{number}/{id}/{}",
        crate::model::mime_extension(mime_id)
    )
    .to_lowercase()
}

/// Filesystem-safe key for a search.
///
/// Joins state, raw flag, bill, `y{year}`, `p{page}` and the query text with
/// `_`, lower-cases, keeps ASCII word characters, spaces and `-~,;[]().`,
/// drops runs of two or more dots and caps the length.
pub fn search_key(q: &SearchQuery) -> String {
    let mut chunks: Vec<String> = Vec::new();
    chunks.extend(q.state.clone());
    if q.raw {
        chunks.push("raw".into());
    }
    chunks.extend(q.bill.clone());
    chunks.extend(q.year.map(|y| format!("y{y}")));
    chunks.extend(q.page.map(|p| format!("p{p}")));
    chunks.extend(q.query.clone());

    let joined = chunks.join("_").to_lowercase();
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || "_-~,;[]().".contains(*c))
        .collect();

    let mut key = String::with_capacity(kept.len());
    let mut dots = 0usize;
    for c in kept.chars() {
        if c == '.' {
            dots += 1;
            continue;
        }
        if dots == 1 {
            key.push('.');
        }
        dots = 0;
        key.push(c);
    }
    if dots == 1 {
        key.push('.');
    }

    key.truncate(MAX_SEARCH_CHUNK);
    key
}
