//! Existence checks against the cache, falling back to the store.

use std::time::Duration;

use tokio_rusqlite::rusqlite::{Connection, OptionalExtension};

use crate::Error;
use crate::cache::ExistenceCache;

/// How long a confirmed existence stays memoised.
pub const PROBE_TTL: Duration = Duration::from_secs(1800);

/// Entities whose existence can be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Bill,
    Session,
    Committee,
    Person,
    Subject,
    Text,
    Vote,
    Amendment,
    Supplement,
    Monitor,
    Ignore,
}

impl Entity {
    pub fn table(self) -> &'static str {
        match self {
            Entity::Bill => "ls_bill",
            Entity::Session => "ls_session",
            Entity::Committee => "ls_committee",
            Entity::Person => "ls_people",
            Entity::Subject => "ls_subject",
            Entity::Text => "ls_bill_text",
            Entity::Vote => "ls_bill_vote",
            Entity::Amendment => "ls_bill_amendment",
            Entity::Supplement => "ls_bill_supplement",
            Entity::Monitor => "ls_monitor",
            Entity::Ignore => "ls_ignore",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            Entity::Bill | Entity::Monitor | Entity::Ignore => "bill_id",
            Entity::Session => "session_id",
            Entity::Committee => "committee_id",
            Entity::Person => "people_id",
            Entity::Subject => "subject_id",
            Entity::Text => "text_id",
            Entity::Vote => "roll_call_id",
            Entity::Amendment => "amendment_id",
            Entity::Supplement => "supplement_id",
        }
    }

    /// Key under which a confirmed id is memoised.
    pub fn cache_key(self, id: i64) -> String {
        format!("{}:{id}", self.table())
    }
}

/// Existence lookups scoped to one transaction.
///
/// Confirmations are held back until the caller commits, so a rolled-back
/// insert never lands in the shared cache.
pub(crate) struct Probe<'a> {
    conn: &'a Connection,
    cache: &'a dyn ExistenceCache,
    confirmed: Vec<(String, i64)>,
}

impl<'a> Probe<'a> {
    pub fn new(conn: &'a Connection, cache: &'a dyn ExistenceCache) -> Self {
        Self { conn, cache, confirmed: Vec::new() }
    }

    pub fn exists(&mut self, entity: Entity, id: i64) -> Result<bool, Error> {
        let key = entity.cache_key(id);
        if self.cache.get(&key).is_some() {
            return Ok(true);
        }

        let sql = format!("SELECT 1 FROM {} WHERE {} = ?1", entity.table(), entity.id_column());
        let found = self
            .conn
            .prepare_cached(&sql)?
            .query_row([id], |_| Ok(()))
            .optional()?
            .is_some();
        if found {
            self.confirmed.push((key, id));
        }
        Ok(found)
    }

    /// Confirmations to publish once the transaction has committed.
    pub fn into_confirmed(self) -> Vec<(String, i64)> {
        self.confirmed
    }
}

/// Write committed confirmations to the cache.
pub(crate) fn publish(cache: &dyn ExistenceCache, confirmed: Vec<(String, i64)>) {
    for (key, id) in confirmed {
        cache.set(&key, id, PROBE_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryExistenceCache;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE ls_bill (bill_id INTEGER PRIMARY KEY); INSERT INTO ls_bill VALUES (7);")
            .unwrap();
        conn
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(Entity::Bill.cache_key(7), "ls_bill:7");
        assert_eq!(Entity::Vote.cache_key(1), "ls_bill_vote:1");
    }

    #[test]
    fn test_store_fallback_and_deferred_publish() {
        let conn = conn();
        let cache = MemoryExistenceCache::new();
        let mut probe = Probe::new(&conn, &cache);

        assert!(probe.exists(Entity::Bill, 7).unwrap());
        assert!(!probe.exists(Entity::Bill, 8).unwrap());
        assert!(cache.is_empty());

        publish(&cache, probe.into_confirmed());
        assert_eq!(cache.get("ls_bill:7"), Some(7));
        assert_eq!(cache.get("ls_bill:8"), None);
    }

    #[test]
    fn test_cache_hit_skips_store() {
        let conn = conn();
        let cache = MemoryExistenceCache::new();
        cache.set("ls_bill:99", 99, PROBE_TTL);

        let mut probe = Probe::new(&conn, &cache);
        assert!(probe.exists(Entity::Bill, 99).unwrap());
        assert!(probe.into_confirmed().is_empty());
    }
}
