//! Stored passage records and the storage key layout
//!
//! Every indexed message is persisted as one [`EmbeddingRecord`] under
//! `embeddings/{episode_id}/{chapter_id}/{id}`. The episode segment comes first
//! so a whole episode can be enumerated with a single prefix listing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embed::Embedding;
use crate::{Error, Result};

/// Root prefix for all embedding records.
pub const KEY_ROOT: &str = "embeddings/";

/// Metadata key holding the human-readable episode label.
pub const EPISODE_NAME_KEY: &str = "episodeName";

/// Open metadata attached to a record.
pub type Metadata = BTreeMap<String, Value>;

/// One indexed passage with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    /// Unique identifier for this record
    pub id: String,
    /// Episode this passage belongs to; also the storage key prefix
    pub episode_id: String,
    /// Chapter within the episode
    pub chapter_id: String,
    /// Message number, unique within (episode, chapter)
    pub message_id: u64,
    /// Speaking character, when the passage has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Primary-language (English) text
    pub text_primary: String,
    /// Secondary-language (Japanese) text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_secondary: Option<String>,
    /// Embedding of the passage
    pub vector: Embedding,
    /// Arbitrary additional metadata; must carry `episodeName`
    #[serde(default)]
    pub metadata: Metadata,
}

impl EmbeddingRecord {
    /// Storage key for this record.
    #[must_use]
    pub fn key(&self) -> String {
        record_key(&self.episode_id, &self.chapter_id, &self.id)
    }

    /// The `episodeName` metadata value, if present as a non-empty string.
    #[must_use]
    pub fn episode_name(&self) -> Option<&str> {
        self.metadata
            .get(EPISODE_NAME_KEY)
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    /// Check the invariants every stored record must satisfy.
    ///
    /// Records failing this check are treated as malformed by readers.
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: &str| -> Result<()> {
            Err(Error::InvalidInput(format!("record {}: {what}", self.id)))
        };

        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("record id is empty".to_string()));
        }
        if !is_key_segment(&self.episode_id) {
            return invalid("episodeId is not a valid key segment");
        }
        if !is_key_segment(&self.chapter_id) {
            return invalid("chapterId is not a valid key segment");
        }
        if self.message_id == 0 {
            return invalid("messageId must be positive");
        }
        if self.text_primary.trim().is_empty() {
            return invalid("textPrimary is empty");
        }
        if self.vector.is_empty() {
            return invalid("vector is empty");
        }
        if self.episode_name().is_none() {
            return invalid("metadata.episodeName is missing");
        }
        Ok(())
    }
}

/// Storage key for a record.
#[must_use]
pub fn record_key(episode_id: &str, chapter_id: &str, record_id: &str) -> String {
    format!("{KEY_ROOT}{episode_id}/{chapter_id}/{record_id}")
}

/// Prefix that enumerates every record of one episode.
///
/// The trailing slash keeps `ep1` from matching `ep10`.
#[must_use]
pub fn episode_prefix(episode_id: &str) -> String {
    format!("{KEY_ROOT}{episode_id}/")
}

/// Whether a value can be used as a single path segment in a storage key.
#[must_use]
pub fn is_key_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::make_record;

    #[test]
    fn test_key_layout() {
        let record = make_record("onikakushi", "day1", 3, vec![1.0, 0.0]);
        assert_eq!(record.key(), "embeddings/onikakushi/day1/onikakushi-day1-3");
        assert!(record.key().starts_with(&episode_prefix("onikakushi")));
    }

    #[test]
    fn test_episode_prefix_does_not_match_longer_ids() {
        let key = record_key("ep10", "c1", "r1");
        assert!(!key.starts_with(&episode_prefix("ep1")));
    }

    #[test]
    fn test_serde_uses_camel_case_and_omits_absent_options() {
        let record = make_record("onikakushi", "day1", 3, vec![1.0, 0.0]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["episodeId"], "onikakushi");
        assert_eq!(json["messageId"], 3);
        assert!(json.get("speaker").is_none());
        assert!(json.get("textSecondary").is_none());
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let json = r#"{
            "id": "r1", "episodeId": "ep", "chapterId": "c", "messageId": 1,
            "textPrimary": "hi", "vector": [0.5],
            "metadata": {"episodeName": "Episode"}
        }"#;
        let record: EmbeddingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.speaker, None);
        assert_eq!(record.text_secondary, None);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_records() {
        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.message_id = 0;
        assert!(record.validate().is_err());

        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.text_primary = "  ".to_string();
        assert!(record.validate().is_err());

        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.metadata.clear();
        assert!(record.validate().is_err());

        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.metadata.insert(EPISODE_NAME_KEY.to_string(), Value::from(7));
        assert!(record.validate().is_err());

        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.vector.clear();
        assert!(record.validate().is_err());

        let mut record = make_record("ep", "c", 1, vec![1.0, 0.0]);
        record.chapter_id = "a/b".to_string();
        assert!(record.validate().is_err());
    }
}
