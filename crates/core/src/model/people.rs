//! Legislators and roll call votes.

use serde::Deserialize;

use super::bill::VoteRef;
use super::lenient;

/// A legislator, standalone or embedded in a sponsor list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    #[serde(deserialize_with = "lenient::int")]
    pub people_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub person_hash: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub state_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub party_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub role_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub middle_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub suffix: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nickname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub district: String,
    /// Committee id when this "person" is a sponsoring committee.
    #[serde(default, rename = "committee_id", deserialize_with = "lenient::int")]
    pub committee_sponsor_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub votesmart_id: i64,
    #[serde(default, rename = "ftm_eid", deserialize_with = "lenient::int")]
    pub followthemoney_eid: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub opensecrets_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ballotpedia: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub knowwho_pid: i64,
}

impl Person {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.people_id <= 0 {
            return Err(format!("people_id must be positive, got {}", self.people_id));
        }
        Ok(())
    }
}

/// Full roll call with the per-legislator vote detail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollCall {
    #[serde(flatten)]
    pub summary: VoteRef,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::list")]
    pub votes: Vec<VoteDetail>,
}

impl RollCall {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.summary.roll_call_id <= 0 {
            return Err(format!("roll_call_id must be positive, got {}", self.summary.roll_call_id));
        }
        if self.bill_id <= 0 {
            return Err(format!("roll call {} has no bill", self.summary.roll_call_id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteDetail {
    #[serde(deserialize_with = "lenient::int")]
    pub people_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub vote_id: i64,
}
