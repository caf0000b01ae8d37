//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::embed::{Embedder, Embedding};
use crate::record::{EmbeddingRecord, Metadata, EPISODE_NAME_KEY};
use crate::store::{MemoryObjectStore, ObjectStore};
use crate::{Error, Result};

pub(crate) fn make_record(
    episode: &str,
    chapter: &str,
    message_id: u64,
    vector: Vec<f32>,
) -> EmbeddingRecord {
    let mut metadata = Metadata::new();
    metadata.insert(
        EPISODE_NAME_KEY.to_string(),
        Value::from(format!("Episode {episode}")),
    );
    EmbeddingRecord {
        id: format!("{episode}-{chapter}-{message_id}"),
        episode_id: episode.to_string(),
        chapter_id: chapter.to_string(),
        message_id,
        speaker: None,
        text_primary: format!("Line {message_id} of {episode}/{chapter}"),
        text_secondary: None,
        vector,
        metadata,
    }
}

/// Two-dimensional unit vector whose cosine with `[1, 0]` is `score`.
pub(crate) fn unit_with_score(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).max(0.0).sqrt()]
}

/// Embedder returning the same vector for every input.
pub(crate) struct StaticEmbedder {
    vector: Embedding,
    dimension: usize,
    fail: bool,
    query_calls: AtomicUsize,
}

impl StaticEmbedder {
    pub(crate) fn new(vector: Embedding) -> Self {
        Self {
            dimension: vector.len(),
            vector,
            fail: false,
            query_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![1.0])
        }
    }

    /// Declare a dimension the returned vectors do not have.
    pub(crate) fn declaring(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub(crate) fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if self.fail {
            return Err(Error::Embedding("provider unavailable".to_string()));
        }
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }

    async fn embed_query(&self, _text: &str) -> Result<Embedding> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Embedding("provider unavailable".to_string()));
        }
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "static"
    }
}

/// Memory store with injectable failures and in-flight accounting.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryObjectStore,
    pub(crate) fail_listing: bool,
    pub(crate) failing_keys: HashSet<String>,
    pub(crate) get_delay: Option<Duration>,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) gets: AtomicUsize,
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(Error::Store("listing unavailable".to_string()));
        }
        self.inner.list_keys(prefix).await
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let result = if self.failing_keys.contains(key) {
            Err(Error::Store(format!("timeout reading {key}")))
        } else {
            self.inner.get_object(key).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.inner.put_object(key, bytes).await
    }
}
