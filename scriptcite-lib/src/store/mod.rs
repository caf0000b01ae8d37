//! Object storage backends and the record adapter on top of them
//!
//! Records are serialized as JSON objects under keys of the form
//! `embeddings/{episodeId}/{chapterId}/{recordId}`. Any key/value backend that
//! can enumerate by prefix works; two are provided:
//!
//! - [`MemoryObjectStore`]: in-process map for tests and small corpora
//! - [`FsObjectStore`]: one JSON file per key under a root directory
//!
//! # Usage
//!
//! ```ignore
//! use scriptcite_lib::store::{FsObjectStore, RecordStore};
//!
//! let records = RecordStore::new(FsObjectStore::new("./index"));
//!
//! // Enumerate two episodes
//! let keys = records.list_candidate_keys(Some(&episodes)).await?;
//!
//! // Fetch one record; missing or malformed objects come back as None
//! let record = records.fetch_record(&keys[0]).await;
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::record::{episode_prefix, is_key_segment, EmbeddingRecord, KEY_ROOT};
use crate::Result;

/// Trait for key/value object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every key starting with `prefix`
    ///
    /// No ordering is guaranteed.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read the object stored under `key`, or `None` if there is none
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any existing object
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_keys(prefix).await
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get_object(key).await
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        (**self).put_object(key, bytes).await
    }
}

/// Reads and writes [`EmbeddingRecord`]s through an [`ObjectStore`].
pub struct RecordStore<S: ObjectStore> {
    objects: S,
}

impl<S: ObjectStore> RecordStore<S> {
    /// Wrap an object store.
    #[must_use]
    pub fn new(objects: S) -> Self {
        Self { objects }
    }

    /// Keys of every candidate record.
    ///
    /// With an episode scope, one listing is issued per episode prefix and the
    /// results concatenated. Without one, the whole corpus is listed. A failed
    /// listing fails the call.
    pub async fn list_candidate_keys(
        &self,
        episode_ids: Option<&BTreeSet<String>>,
    ) -> Result<Vec<String>> {
        let Some(episode_ids) = episode_ids else {
            return self.objects.list_keys(KEY_ROOT).await;
        };

        let mut keys = Vec::new();
        for episode_id in episode_ids {
            // no record can be stored under an id that is not a key segment
            if !is_key_segment(episode_id) {
                debug!(episode = %episode_id, "episode id is not a key segment, nothing to list");
                continue;
            }
            let found = self.objects.list_keys(&episode_prefix(episode_id)).await?;
            debug!(episode = %episode_id, count = found.len(), "listed episode");
            keys.extend(found);
        }
        Ok(keys)
    }

    /// Fetch and decode one record.
    ///
    /// Read failures, missing objects and malformed payloads are logged and
    /// reported as `None` so a single bad key never aborts a search.
    pub async fn fetch_record(&self, key: &str) -> Option<EmbeddingRecord> {
        let bytes = match self.objects.get_object(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!(key, "record listed but not found, skipping");
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "failed to read record, skipping");
                return None;
            }
        };

        let record: EmbeddingRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                warn!(key, error = %err, "malformed record, skipping");
                return None;
            }
        };
        if let Err(err) = record.validate() {
            warn!(key, error = %err, "invalid record, skipping");
            return None;
        }
        Some(record)
    }

    /// Serialize a record and write it under its canonical key.
    pub async fn put_record(&self, record: &EmbeddingRecord) -> Result<()> {
        record.validate()?;
        let bytes = serde_json::to_vec(record)?;
        self.objects.put_object(&record.key(), bytes).await
    }

    /// Returns a reference to the underlying object store.
    #[must_use]
    pub fn objects(&self) -> &S {
        &self.objects
    }
}

mod fs;
mod memory;

pub use fs::*;
pub use memory::*;
