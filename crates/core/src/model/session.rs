//! Legislative sessions.

use serde::Deserialize;

use super::lenient;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(deserialize_with = "lenient::int")]
    pub session_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub state_id: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub year_start: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub year_end: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub prefile: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub sine_die: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub prior: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub special: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_tag: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_name: String,
    /// Hash of the current dataset archive, present in session lists.
    #[serde(default, deserialize_with = "lenient::string")]
    pub dataset_hash: String,
}

impl Session {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.session_id <= 0 {
            return Err(format!("session_id must be positive, got {}", self.session_id));
        }
        Ok(())
    }
}
