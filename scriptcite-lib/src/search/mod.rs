//! High-level search interface
//!
//! Combines an embedder and a record store into the semantic search entry point.
//!
//! # Pipeline
//!
//! ```text
//! query -> embed -> list keys (episode prefix) -> fetch (bounded fan-out)
//!       -> scope/metadata filter -> cosine score -> min_score -> rank -> top_k
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use scriptcite_lib::search::{SearchEngine, SearchOptions};
//!
//! let engine = SearchEngine::new(embedder, store);
//! let options = SearchOptions::new()
//!     .episodes(["onikakushi"])
//!     .min_score(0.5)
//!     .top_k(5);
//! let results = engine.semantic_search("Who was at the dam site?", &options).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};

use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::embed::Embedder;
use crate::filter::ScopeFilter;
use crate::ingest::{Indexer, Script};
use crate::record::{EmbeddingRecord, Metadata};
use crate::similarity::{self, RankKey, Ranked};
use crate::store::{ObjectStore, RecordStore};
use crate::{Error, Result};

/// Engine-wide limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Result count used when a search does not set `top_k`
    pub default_top_k: usize,
    /// Largest `top_k` a search may request
    pub max_top_k: usize,
    /// Maximum record fetches in flight per search
    pub max_concurrent_fetches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_top_k: 100,
            max_concurrent_fetches: 16,
        }
    }
}

impl EngineConfig {
    /// Effective result count for a requested `top_k`.
    ///
    /// A request above `max_top_k` is rejected rather than truncated, so a
    /// caller never receives fewer results than qualified without being told.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_top_k.min(self.max_top_k)),
            Some(top_k) if top_k > self.max_top_k => Err(Error::InvalidInput(format!(
                "top_k {top_k} exceeds the maximum of {}",
                self.max_top_k
            ))),
            Some(top_k) => Ok(top_k),
        }
    }
}

/// Per-search options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    /// Restrict results to these episodes; empty means all episodes
    pub episode_ids: BTreeSet<String>,
    /// Metadata key/value pairs every result must carry
    pub metadata_filters: BTreeMap<String, String>,
    /// Maximum number of results
    pub top_k: Option<usize>,
    /// Inclusive lower bound on similarity
    pub min_score: Option<f32>,
}

impl SearchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn episodes<I, S>(mut self, episode_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.episode_ids.extend(episode_ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata_filters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    fn scope(&self) -> ScopeFilter {
        ScopeFilter::new(self.episode_ids.iter().cloned(), self.metadata_filters.clone())
    }
}

/// A scored passage. Carries everything from the stored record except the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub id: String,
    pub episode_id: String,
    /// Copied from the record's `episodeName` metadata
    pub episode_name: String,
    pub chapter_id: String,
    pub message_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text_primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_secondary: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Cosine similarity to the query, -1.0 to 1.0
    pub score: f32,
}

impl RetrievalResult {
    fn from_record(record: EmbeddingRecord, score: f32) -> Self {
        let episode_name = record
            .episode_name()
            .map_or_else(|| record.episode_id.clone(), str::to_owned);
        Self {
            id: record.id,
            episode_id: record.episode_id,
            episode_name,
            chapter_id: record.chapter_id,
            message_id: record.message_id,
            speaker: record.speaker,
            text_primary: record.text_primary,
            text_secondary: record.text_secondary,
            metadata: record.metadata,
            score,
        }
    }
}

impl Ranked for RetrievalResult {
    fn rank_key(&self) -> RankKey<'_> {
        RankKey {
            score: self.score,
            message_id: self.message_id,
            episode_id: &self.episode_id,
            chapter_id: &self.chapter_id,
            id: &self.id,
        }
    }
}

/// Semantic search over stored script passages.
pub struct SearchEngine<E: Embedder, S: ObjectStore> {
    embedder: E,
    records: RecordStore<S>,
    config: EngineConfig,
}

impl<E: Embedder, S: ObjectStore> SearchEngine<E, S> {
    /// Create a new search engine with default limits.
    #[must_use]
    pub fn new(embedder: E, store: S) -> Self {
        Self::with_config(embedder, store, EngineConfig::default())
    }

    /// Create a new search engine with explicit limits.
    #[must_use]
    pub fn with_config(embedder: E, store: S, config: EngineConfig) -> Self {
        Self {
            embedder,
            records: RecordStore::new(store),
            config,
        }
    }

    /// Embed and store every message of a script. Returns the number of records written.
    pub async fn index(&self, script: &Script) -> Result<usize> {
        Indexer::new(&self.embedder, &self.records)
            .index_script(script)
            .await
    }

    /// [`index`](Self::index) with an explicit number of messages per embedding request.
    pub async fn index_with_batch_size(&self, script: &Script, batch_size: usize) -> Result<usize> {
        Indexer::new(&self.embedder, &self.records)
            .with_batch_size(batch_size)
            .index_script(script)
            .await
    }

    /// Find the passages most similar to `query`.
    ///
    /// Fails only when the query cannot be embedded or candidates cannot be
    /// listed. Individual records that are missing, malformed, out of scope or
    /// of the wrong dimension are skipped.
    pub async fn semantic_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RetrievalResult>> {
        self.search_pipeline(query, options).await
    }

    /// [`semantic_search`](Self::semantic_search) that gives up as soon as
    /// `cancel` fires, dropping all outstanding fetches.
    pub async fn semantic_search_with_cancel(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievalResult>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("search cancelled");
                Err(Error::Cancelled)
            }
            result = self.search_pipeline(query, options) => result,
        }
    }

    async fn search_pipeline(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RetrievalResult>> {
        if options.min_score.is_some_and(f32::is_nan) {
            return Err(Error::InvalidInput("min_score is NaN".to_string()));
        }
        let top_k = self.config.resolve_top_k(options.top_k)?;
        let scope = options.scope();

        let query_vector = self.embedder.embed_query(query).await?;
        let expected = self.embedder.dimension();
        if query_vector.is_empty() || query_vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: query_vector.len(),
            });
        }

        let keys = self
            .records
            .list_candidate_keys(scope.episode_scope())
            .await?;
        let candidates = keys.len();
        debug!(candidates, top_k, "scoring candidates");

        let records = &self.records;
        let mut results: Vec<RetrievalResult> = stream::iter(keys)
            .map(move |key| async move { records.fetch_record(&key).await })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .filter_map(|record| {
                future::ready(record.and_then(|record| {
                    score_candidate(record, &query_vector, &scope, options.min_score)
                }))
            })
            .collect()
            .await;

        let qualified = results.len();
        similarity::rank(&mut results, top_k);
        debug!(candidates, qualified, returned = results.len(), "search complete");
        Ok(results)
    }

    /// Returns a reference to the embedder.
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Returns a reference to the record store.
    #[must_use]
    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    /// Returns the engine limits.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn score_candidate(
    record: EmbeddingRecord,
    query: &[f32],
    scope: &ScopeFilter,
    min_score: Option<f32>,
) -> Option<RetrievalResult> {
    if !scope.admits(&record) {
        debug!(id = %record.id, "record outside scope, skipping");
        return None;
    }

    let score = match similarity::score(query, &record.vector) {
        Ok(score) if score.is_finite() => score,
        Ok(score) => {
            warn!(id = %record.id, score, "non-finite similarity, skipping");
            return None;
        }
        Err(err) => {
            warn!(id = %record.id, error = %err, "vector dimension mismatch, skipping");
            return None;
        }
    };

    if min_score.is_some_and(|min| score < min) {
        return None;
    }
    Some(RetrievalResult::from_record(record, score))
}
