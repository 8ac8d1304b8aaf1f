//! Lightweight bill lists: master lists, search results and monitor lists.

use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use super::session::Session;

/// Just enough of a bill to decide whether it needs fetching.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEntry {
    #[serde(deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub change_hash: String,
    #[serde(default, alias = "bill_number", deserialize_with = "lenient::string")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub relevance: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MasterList {
    pub session: Option<Session>,
    pub bills: Vec<ListEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSummary {
    #[serde(default, deserialize_with = "lenient::int")]
    pub count: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub page_current: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub page_total: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub query: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub summary: Option<SearchSummary>,
    pub results: Vec<ListEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorList {
    pub bills: Vec<ListEntry>,
}

fn entries(value: Value, header: &str) -> Result<(Option<Value>, Vec<ListEntry>), serde_json::Error> {
    let header_value = match &value {
        Value::Object(map) => map.get(header).cloned(),
        _ => None,
    };
    let bills = lenient::indexed_values(value, &[header])
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<ListEntry>, _>>()?;
    Ok((header_value, bills))
}

impl MasterList {
    pub(crate) fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let (session, bills) = entries(value, "session")?;
        let session = session.map(serde_json::from_value).transpose()?;
        Ok(Self { session, bills })
    }
}

impl SearchResult {
    pub(crate) fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        // Raw searches nest their entries under `results`.
        if let Value::Object(map) = &mut value
            && let Some(nested) = map.remove("results")
        {
            let summary = map.remove("summary").map(serde_json::from_value).transpose()?;
            let (_, results) = entries(nested, "")?;
            return Ok(Self { summary, results });
        }
        let (summary, results) = entries(value, "summary")?;
        let summary = summary.map(serde_json::from_value).transpose()?;
        Ok(Self { summary, results })
    }
}

impl MonitorList {
    pub(crate) fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let (_, bills) = entries(value, "")?;
        Ok(Self { bills })
    }
}
