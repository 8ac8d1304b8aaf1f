//! Deduplicated accumulator of objects referenced but not stored locally.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// What an orchestrator should fetch next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingCategory {
    Bills,
    Texts,
    Amendments,
    Supplements,
    /// People, whether sponsors or roll call voters.
    Sponsors,
    Votes,
}

impl MissingCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MissingCategory::Bills => "bills",
            MissingCategory::Texts => "texts",
            MissingCategory::Amendments => "amendments",
            MissingCategory::Supplements => "supplements",
            MissingCategory::Sponsors => "sponsors",
            MissingCategory::Votes => "votes",
        }
    }
}

/// Missing ids grouped by category, in first-request order.
pub type MissingMap = BTreeMap<MissingCategory, Vec<i64>>;

/// Accumulates `(category, id)` requests, each at most once per run.
#[derive(Debug, Clone, Default)]
pub struct MissingQueue {
    seen: HashSet<(MissingCategory, i64)>,
    ordered: MissingMap,
}

impl MissingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. Returns `false` if the pair was already queued.
    pub fn request(&mut self, category: MissingCategory, id: i64) -> bool {
        if !self.seen.insert((category, id)) {
            return false;
        }
        self.ordered.entry(category).or_default().push(id);
        true
    }

    pub fn get_all(&self) -> &MissingMap {
        &self.ordered
    }

    pub fn get(&self, category: MissingCategory) -> &[i64] {
        self.ordered.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Fold another run's requests into this one, keeping dedup.
    pub fn merge(&mut self, other: MissingQueue) {
        for (category, ids) in other.ordered {
            for id in ids {
                self.request(category, id);
            }
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.ordered.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_dedup() {
        let mut queue = MissingQueue::new();
        assert!(queue.request(MissingCategory::Texts, 5));
        assert!(!queue.request(MissingCategory::Texts, 5));
        assert!(!queue.request(MissingCategory::Texts, 5));
        assert_eq!(queue.get(MissingCategory::Texts), &[5]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_same_id_different_categories() {
        let mut queue = MissingQueue::new();
        queue.request(MissingCategory::Texts, 5);
        queue.request(MissingCategory::Votes, 5);
        assert_eq!(queue.get_all().len(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let mut queue = MissingQueue::new();
        for id in [3, 1, 2, 1] {
            queue.request(MissingCategory::Sponsors, id);
        }
        assert_eq!(queue.get(MissingCategory::Sponsors), &[3, 1, 2]);
    }

    #[test]
    fn test_reset() {
        let mut queue = MissingQueue::new();
        queue.request(MissingCategory::Bills, 1);
        queue.reset();
        assert!(queue.is_empty());
        assert!(queue.request(MissingCategory::Bills, 1));
    }

    #[test]
    fn test_merge_keeps_dedup() {
        let mut a = MissingQueue::new();
        a.request(MissingCategory::Bills, 1);
        let mut b = MissingQueue::new();
        b.request(MissingCategory::Bills, 1);
        b.request(MissingCategory::Bills, 2);
        a.merge(b);
        assert_eq!(a.get(MissingCategory::Bills), &[1, 2]);
    }

    #[test]
    fn test_serializes_lowercase() {
        let mut queue = MissingQueue::new();
        queue.request(MissingCategory::Texts, 9);
        let json = serde_json::to_value(queue.get_all()).unwrap();
        assert_eq!(json, serde_json::json!({"texts": [9]}));
    }
}
