//! Content-addressed identity for calendar events.

use md5::{Digest, Md5};

/// Hex characters kept from the digest.
pub const EVENT_HASH_LEN: usize = 8;

/// Identity of a calendar event, derived from its descriptive fields.
///
/// The fields are joined with `-`, lowercased and MD5-hashed; the first
/// eight hex characters are kept so hashes match those already stored by
/// other clients of the same database.
pub fn compute_event_hash(event_type: &str, date: &str, time: &str, location: &str, description: &str) -> String {
    let source = format!("{event_type}-{date}-{time}-{location}-{description}").to_lowercase();
    let mut hash = hex::encode(Md5::digest(source.as_bytes()));
    hash.truncate(EVENT_HASH_LEN);
    hash
}
