//! scriptcite - semantic retrieval with citations over episodic scripts
//!
//! # Architecture
//!
//! ```text
//! Script -> Indexer -> Embedder -> RecordStore (embeddings/{episode}/{chapter}/{id})
//!                                      |
//! Query -> Embedder -> SearchEngine <--+  (episode prefix, bounded fetch, filter, rank)
//!                          |
//!                   RetrievalResult -> Citation / group_by_episode
//! ```
//!
//! # Example
//!
//! ```ignore
//! use scriptcite_lib::{
//!     citation::{group_by_episode, to_citation},
//!     embed::{OpenAiConfig, OpenAiEmbedder},
//!     search::{SearchEngine, SearchOptions},
//!     store::FsObjectStore,
//! };
//!
//! let embedder = OpenAiEmbedder::new(OpenAiConfig::new(api_key))?;
//! let engine = SearchEngine::new(embedder, FsObjectStore::new("./index"));
//!
//! let options = SearchOptions::new().episodes(["onikakushi"]).min_score(0.3);
//! let results = engine.semantic_search("Why did Rena get angry?", &options).await?;
//! let citations: Vec<_> = results.iter().map(to_citation).collect();
//! let by_episode = group_by_episode(&results);
//! ```

pub mod citation;
pub mod embed;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod record;
pub mod search;
pub mod similarity;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
