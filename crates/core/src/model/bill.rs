//! Bill aggregate and its child records.

use serde::Deserialize;

use super::lenient;
use super::people::Person;
use super::session::Session;

/// A bill as delivered by `getBill` or a push payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bill {
    #[serde(deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub change_hash: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub session_id: i64,
    #[serde(default, deserialize_with = "lenient::object")]
    pub session: Option<Session>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_link: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub status: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status_date: String,
    #[serde(default, deserialize_with = "lenient::list")]
    pub progress: Vec<Progress>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub state_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub bill_number: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bill_type_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub body_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub current_body_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub pending_committee_id: i64,
    #[serde(default, deserialize_with = "lenient::object")]
    pub committee: Option<Committee>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub referrals: Vec<Referral>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub history: Vec<History>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub sponsors: Vec<Sponsor>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub sasts: Vec<Sast>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub subjects: Vec<Subject>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub texts: Vec<TextRef>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub votes: Vec<VoteRef>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub amendments: Vec<AmendmentRef>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub supplements: Vec<SupplementRef>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub calendar: Vec<CalendarEvent>,
    #[serde(default, deserialize_with = "lenient::reason_ids")]
    pub reasons: Vec<i64>,
}

impl Bill {
    /// The session id, preferring the embedded session object.
    pub fn effective_session_id(&self) -> i64 {
        self.session
            .as_ref()
            .map(|s| s.session_id)
            .filter(|id| *id > 0)
            .unwrap_or(self.session_id)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.bill_id <= 0 {
            return Err(format!("bill_id must be positive, got {}", self.bill_id));
        }
        if self.effective_session_id() <= 0 {
            return Err(format!("bill {} has no session", self.bill_id));
        }
        Ok(())
    }
}

/// Committee currently holding a bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Committee {
    #[serde(default, deserialize_with = "lenient::int")]
    pub committee_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub chamber_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Progress {
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub event: i64,
}

/// One step of the committee referral chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Referral {
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub committee_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub chamber_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub chamber_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub importance: i64,
}

/// A sponsor is a person plus their role on this bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sponsor {
    #[serde(flatten)]
    pub person: Person,
    #[serde(default, deserialize_with = "lenient::int")]
    pub sponsor_type_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub sponsor_order: i64,
}

/// Same-as / similar-to cross reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sast {
    #[serde(default, deserialize_with = "lenient::int")]
    pub type_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sast_bill_number: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub sast_bill_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subject {
    #[serde(default, deserialize_with = "lenient::int")]
    pub subject_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject_name: String,
}

/// Text stub listed on a bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextRef {
    #[serde(deserialize_with = "lenient::int")]
    pub doc_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub type_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub mime_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_link: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub text_size: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text_hash: String,
}

/// Roll call stub listed on a bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteRef {
    #[serde(deserialize_with = "lenient::int")]
    pub roll_call_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub yea: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub nay: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub nv: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub absent: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub total: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub passed: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub chamber_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_link: String,
}

/// Amendment stub listed on a bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmendmentRef {
    #[serde(deserialize_with = "lenient::int")]
    pub amendment_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub adopted: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub chamber_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub mime_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_link: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub amendment_size: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub amendment_hash: String,
}

/// Supplement stub (fiscal note, analysis, ...) listed on a bill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplementRef {
    #[serde(deserialize_with = "lenient::int")]
    pub supplement_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub type_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub mime_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_link: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub supplement_size: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub supplement_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarEvent {
    #[serde(default, deserialize_with = "lenient::int")]
    pub type_id: i64,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub event_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
}
