//! Text embedding providers
//!
//! The retrieval engine only needs one vector per query, but ingestion embeds
//! whole chapters at once, so providers expose both entry points.
//!
//! # Providers
//!
//! - [`OpenAiEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//! - [`BgeEmbedder`]: local BAAI/bge-large-en-v1.5 via fastembed (feature `bge`)
//! - [`CachedEmbedder`]: LRU cache of query vectors in front of another provider
//!
//! # Usage
//!
//! ```ignore
//! use scriptcite_lib::embed::{Embedder, OpenAiEmbedder};
//!
//! let embedder = OpenAiEmbedder::new(OpenAiConfig::new(api_key))?;
//!
//! // Embed passages (for indexing)
//! let vectors = embedder.embed_documents(&["Rena smiled.", "Mion laughed."]).await?;
//!
//! // Embed a question (for searching)
//! let query = embedder.embed_query("Who hid the bat?").await?;
//! ```

use async_trait::async_trait;

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed multiple passages for indexing
    ///
    /// Returns exactly one vector per input, in input order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    ///
    /// Note: Some models (like BGE) use different prompts for queries vs documents.
    /// This method handles that distinction.
    async fn embed_query(&self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        (**self).embed_query(text).await
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(feature = "bge")]
mod bge;
mod cache;
mod openai;

#[cfg(feature = "bge")]
pub use bge::*;
pub use cache::*;
pub use openai::*;
