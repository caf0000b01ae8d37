use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::embed::{Embedder, Embedding};
use crate::Result;

/// Keeps recent query vectors so repeated questions skip the provider call.
///
/// Only [`Embedder::embed_query`] is cached; document batches pass straight
/// through. Failed lookups are never cached.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    cache: Mutex<LruCache<String, Embedding>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Wrap `inner` with a cache holding up to `capacity` queries.
    pub fn new(inner: E, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached query vectors.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Returns a reference to the wrapped embedder.
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.inner.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            debug!("query embedding cache hit");
            return Ok(hit.clone());
        }

        // not holding the lock across the provider call
        let embedding = self.inner.embed_query(text).await?;
        self.cache
            .lock()
            .await
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
