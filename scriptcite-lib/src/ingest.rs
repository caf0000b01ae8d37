//! Script ingestion
//!
//! Turns a segmented script (episodes, chapters, messages) into stored
//! [`EmbeddingRecord`]s, one per message.
//!
//! # Input format
//!
//! ```json
//! {
//!   "episodes": [{
//!     "id": "onikakushi",
//!     "name": "Onikakushi-hen",
//!     "chapters": [{
//!       "id": "day1",
//!       "messages": [
//!         {"id": 1, "speaker": "Rena", "text": "Hau~", "textSecondary": "はう～"}
//!       ]
//!     }]
//!   }]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::embed::Embedder;
use crate::record::{is_key_segment, EmbeddingRecord, Metadata, EPISODE_NAME_KEY};
use crate::store::{ObjectStore, RecordStore};
use crate::{Error, Result};

/// A whole script ready for indexing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Script {
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    /// Human-readable label, stored as `episodeName` metadata
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default)]
    pub text_secondary: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Script {
    /// Parse a script from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("failed to parse script: {e}")))
    }

    /// Total number of messages across all episodes.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.episodes
            .iter()
            .flat_map(|e| &e.chapters)
            .map(|c| c.messages.len())
            .sum()
    }

    /// Check the script can be stored without breaking record invariants.
    pub fn validate(&self) -> Result<()> {
        let mut episodes = HashSet::new();
        for episode in &self.episodes {
            if !is_key_segment(&episode.id) {
                return Err(invalid(format!("episode id {:?} is not usable in a key", episode.id)));
            }
            if !episodes.insert(episode.id.as_str()) {
                return Err(invalid(format!("duplicate episode {}", episode.id)));
            }
            if episode.name.trim().is_empty() {
                return Err(invalid(format!("episode {} has no name", episode.id)));
            }

            let mut chapters = HashSet::new();
            for chapter in &episode.chapters {
                let at = format!("{}/{}", episode.id, chapter.id);
                if !is_key_segment(&chapter.id) {
                    return Err(invalid(format!("chapter id {:?} is not usable in a key", chapter.id)));
                }
                if !chapters.insert(chapter.id.as_str()) {
                    return Err(invalid(format!("duplicate chapter {at}")));
                }

                let mut messages = HashSet::new();
                for message in &chapter.messages {
                    if message.id == 0 {
                        return Err(invalid(format!("{at}: message ids must be positive")));
                    }
                    if !messages.insert(message.id) {
                        return Err(invalid(format!("{at}: duplicate message {}", message.id)));
                    }
                    if message.text.trim().is_empty() {
                        return Err(invalid(format!("{at}: message {} has no text", message.id)));
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidInput(message)
}

/// Embeds script messages and writes them as records.
pub struct Indexer<'a, E: Embedder, S: ObjectStore> {
    embedder: &'a E,
    records: &'a RecordStore<S>,
    batch_size: usize,
}

impl<'a, E: Embedder, S: ObjectStore> Indexer<'a, E, S> {
    #[must_use]
    pub fn new(embedder: &'a E, records: &'a RecordStore<S>) -> Self {
        Self {
            embedder,
            records,
            batch_size: 64,
        }
    }

    /// Messages sent to the embedder per request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Validate, embed and store every message. Returns the number of records written.
    ///
    /// The whole script is validated before anything is written.
    pub async fn index_script(&self, script: &Script) -> Result<usize> {
        script.validate()?;

        let mut written = 0;
        for episode in &script.episodes {
            for chapter in &episode.chapters {
                for batch in chapter.messages.chunks(self.batch_size) {
                    written += self.index_batch(episode, chapter, batch).await?;
                }
                debug!(episode = %episode.id, chapter = %chapter.id, "chapter indexed");
            }
        }
        info!(records = written, model = self.embedder.model_name(), "script indexed");
        Ok(written)
    }

    async fn index_batch(&self, episode: &Episode, chapter: &Chapter, batch: &[Message]) -> Result<usize> {
        let texts: Vec<&str> = batch.iter().map(|m| m.text.as_str()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} embeddings for {} passages",
                vectors.len(),
                batch.len()
            )));
        }

        let expected = self.embedder.dimension();
        for (message, vector) in batch.iter().zip(vectors) {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
            let record = build_record(episode, chapter, message, vector);
            self.records.put_record(&record).await?;
        }
        Ok(batch.len())
    }
}

fn build_record(episode: &Episode, chapter: &Chapter, message: &Message, vector: Vec<f32>) -> EmbeddingRecord {
    let mut metadata = Metadata::new();
    metadata.insert(EPISODE_NAME_KEY.to_string(), Value::from(episode.name.clone()));
    if let Some(timestamp) = &message.timestamp {
        metadata.insert("timestamp".to_string(), Value::from(timestamp.clone()));
    }

    EmbeddingRecord {
        id: format!("{}-{}-{}", episode.id, chapter.id, message.id),
        episode_id: episode.id.clone(),
        chapter_id: chapter.id.clone(),
        message_id: message.id,
        speaker: non_blank(message.speaker.as_deref()),
        text_primary: message.text.clone(),
        text_secondary: non_blank(message.text_secondary.as_deref()),
        vector,
        metadata,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
