//! Typed payload records.
//!
//! Every response or push body is decoded here, once, into explicit structs.
//! The reconciliation engine never sees raw JSON.
//!
//! ### Envelope
//! - `status`: when present, anything but `OK` fails before the store is touched.
//! - Exactly one content key selects the record type (`bill`, `text`,
//!   `amendment`, `supplement`, `roll_call`, `person`, `session`, `sessions`,
//!   `masterlist`, `searchresult`, `monitorlist`).

pub mod bill;
pub mod documents;
pub(crate) mod lenient;
pub mod lists;
pub mod people;
pub mod session;
pub mod state;

pub use bill::{
    AmendmentRef, Bill, CalendarEvent, Committee, History, Progress, Referral, Sast, Sponsor, Subject,
    SupplementRef, TextRef, VoteRef,
};
pub use documents::{Amendment, BillText, Supplement, mime_extension};
pub use lists::{ListEntry, MasterList, MonitorList, SearchResult, SearchSummary};
pub use people::{Person, RollCall, VoteDetail};
pub use session::Session;
pub use state::{STATES, state_abbr, state_id};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Error;

/// Status value marking a successful response.
pub const STATUS_OK: &str = "OK";

/// A decoded payload, one variant per content key.
#[derive(Debug, Clone)]
pub enum Payload {
    Bill(Box<Bill>),
    Text(Box<BillText>),
    Amendment(Box<Amendment>),
    Supplement(Box<Supplement>),
    RollCall(Box<RollCall>),
    Person(Box<Person>),
    Session(Box<Session>),
    Sessions(Vec<Session>),
    MasterList(MasterList),
    SearchResult(SearchResult),
    MonitorList(MonitorList),
}

/// Content keys in routing order.
const CONTENT_KEYS: [&str; 11] = [
    "bill",
    "text",
    "amendment",
    "supplement",
    "roll_call",
    "person",
    "session",
    "sessions",
    "masterlist",
    "searchresult",
    "monitorlist",
];

/// Fail unless the envelope's status (if any) is `OK`.
///
/// # Errors
///
/// Returns `Error::Status` carrying the offending status value.
pub fn check_status(value: &Value) -> Result<(), Error> {
    match value.get("status") {
        None => Ok(()),
        Some(Value::String(status)) if status == STATUS_OK => Ok(()),
        Some(Value::String(status)) => Err(Error::Status(status.clone())),
        Some(other) => Err(Error::Status(other.to_string())),
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::InvalidPayload(format!("{key}: {e}")))
}

fn invalid(key: &str) -> impl FnOnce(String) -> Error + '_ {
    move |reason| Error::InvalidPayload(format!("{key}: {reason}"))
}

impl Payload {
    /// Decode raw response bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` for malformed JSON, otherwise as
    /// [`Payload::from_value`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Check the envelope status, then decode the single content key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Status` for a non-OK status and
    /// `Error::InvalidPayload` when no content key is present or the
    /// record fails validation.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        check_status(&value)?;

        let Value::Object(mut envelope) = value else {
            return Err(Error::InvalidPayload("payload is not a JSON object".into()));
        };

        let Some(key) = CONTENT_KEYS.iter().copied().find(|key| envelope.contains_key(*key)) else {
            return Err(Error::InvalidPayload("no recognised content key".into()));
        };
        let body = envelope.remove(key).unwrap_or(Value::Null);

        let payload = match key {
            "bill" => {
                let bill: Bill = decode(key, body)?;
                bill.validate().map_err(invalid(key))?;
                Payload::Bill(Box::new(bill))
            }
            "text" => {
                let text: BillText = decode(key, body)?;
                documents::validate_document(key, text.meta.doc_id, text.bill_id).map_err(invalid(key))?;
                Payload::Text(Box::new(text))
            }
            "amendment" => {
                let amendment: Amendment = decode(key, body)?;
                documents::validate_document(key, amendment.meta.amendment_id, amendment.bill_id)
                    .map_err(invalid(key))?;
                Payload::Amendment(Box::new(amendment))
            }
            "supplement" => {
                let supplement: Supplement = decode(key, body)?;
                documents::validate_document(key, supplement.meta.supplement_id, supplement.bill_id)
                    .map_err(invalid(key))?;
                Payload::Supplement(Box::new(supplement))
            }
            "roll_call" => {
                let roll_call: RollCall = decode(key, body)?;
                roll_call.validate().map_err(invalid(key))?;
                Payload::RollCall(Box::new(roll_call))
            }
            "person" => {
                let person: Person = decode(key, body)?;
                person.validate().map_err(invalid(key))?;
                Payload::Person(Box::new(person))
            }
            "session" => {
                let session: Session = decode(key, body)?;
                session.validate().map_err(invalid(key))?;
                Payload::Session(Box::new(session))
            }
            "sessions" => {
                let sessions: Vec<Session> = lenient::indexed_values(body, &[])
                    .into_iter()
                    .map(|v| decode(key, v))
                    .collect::<Result<_, _>>()?;
                for session in &sessions {
                    session.validate().map_err(invalid(key))?;
                }
                Payload::Sessions(sessions)
            }
            "masterlist" => Payload::MasterList(MasterList::from_value(body).map_err(|e| invalid(key)(e.to_string()))?),
            "searchresult" => {
                Payload::SearchResult(SearchResult::from_value(body).map_err(|e| invalid(key)(e.to_string()))?)
            }
            _ => Payload::MonitorList(MonitorList::from_value(body).map_err(|e| invalid(key)(e.to_string()))?),
        };

        Ok(payload)
    }

    /// Content key this payload was decoded from.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Bill(_) => "bill",
            Payload::Text(_) => "text",
            Payload::Amendment(_) => "amendment",
            Payload::Supplement(_) => "supplement",
            Payload::RollCall(_) => "roll_call",
            Payload::Person(_) => "person",
            Payload::Session(_) => "session",
            Payload::Sessions(_) => "sessions",
            Payload::MasterList(_) => "masterlist",
            Payload::SearchResult(_) => "searchresult",
            Payload::MonitorList(_) => "monitorlist",
        }
    }
}
