//! Episode scope and metadata filtering
//!
//! The episode scope is applied twice: once as a storage prefix when listing
//! candidates, and again on every fetched record. Metadata constraints need the
//! full record and are only checked after the fetch.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::record::EmbeddingRecord;

/// Decides whether a record may appear in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    episode_ids: BTreeSet<String>,
    metadata: BTreeMap<String, String>,
}

impl ScopeFilter {
    /// Create a filter. An empty episode set admits every episode; constraints
    /// are conjunctive.
    pub fn new<I, S>(episode_ids: I, metadata: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            episode_ids: episode_ids.into_iter().map(Into::into).collect(),
            metadata,
        }
    }

    /// Episodes in scope, or `None` when every episode is eligible.
    #[must_use]
    pub fn episode_scope(&self) -> Option<&BTreeSet<String>> {
        (!self.episode_ids.is_empty()).then_some(&self.episode_ids)
    }

    /// Whether `episode_id` falls inside the episode scope.
    #[must_use]
    pub fn admits_episode(&self, episode_id: &str) -> bool {
        self.episode_ids.is_empty() || self.episode_ids.contains(episode_id)
    }

    /// Whether every metadata constraint is satisfied by `metadata`.
    #[must_use]
    pub fn admits_metadata(&self, metadata: &BTreeMap<String, Value>) -> bool {
        self.metadata.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .is_some_and(|actual| value_matches(actual, expected))
        })
    }

    /// Full eligibility check for a fetched record.
    #[must_use]
    pub fn admits(&self, record: &EmbeddingRecord) -> bool {
        self.admits_episode(&record.episode_id) && self.admits_metadata(&record.metadata)
    }
}

// strings compare by content, everything else by its JSON text
fn value_matches(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_record;

    fn constraints(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        let filter = ScopeFilter::default();
        assert!(filter.episode_scope().is_none());
        assert!(filter.admits(&make_record("onikakushi", "c1", 1, vec![1.0])));
        assert!(filter.admits(&make_record("watanagashi", "c1", 1, vec![1.0])));
    }

    #[test]
    fn test_episode_scope() {
        let filter = ScopeFilter::new(["onikakushi"], BTreeMap::new());
        assert_eq!(filter.episode_scope().map(BTreeSet::len), Some(1));
        assert!(filter.admits(&make_record("onikakushi", "c1", 1, vec![1.0])));
        assert!(!filter.admits(&make_record("watanagashi", "c1", 1, vec![1.0])));
    }

    #[test]
    fn test_metadata_constraints_are_conjunctive() {
        let mut record = make_record("onikakushi", "c1", 1, vec![1.0]);
        record.metadata.insert("arc".into(), Value::from("question"));
        record.metadata.insert("day".into(), Value::from(3));

        let both = ScopeFilter::new(Vec::<String>::new(), constraints(&[("arc", "question"), ("day", "3")]));
        assert!(both.admits(&record));

        let one_wrong = ScopeFilter::new(Vec::<String>::new(), constraints(&[("arc", "question"), ("day", "4")]));
        assert!(!one_wrong.admits(&record));
    }

    #[test]
    fn test_unknown_metadata_key_fails_to_match() {
        let record = make_record("onikakushi", "c1", 1, vec![1.0]);
        let filter = ScopeFilter::new(Vec::<String>::new(), constraints(&[("missing", "x")]));
        assert!(!filter.admits(&record));
    }

    #[test]
    fn test_string_values_compare_without_quotes() {
        let record = make_record("onikakushi", "c1", 1, vec![1.0]);
        let filter = ScopeFilter::new(
            Vec::<String>::new(),
            constraints(&[("episodeName", "Episode onikakushi")]),
        );
        assert!(filter.admits(&record));
    }
}
