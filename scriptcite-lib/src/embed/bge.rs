use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// BGE embedder using BAAI/bge-large-en-v1.5.
///
/// Uses fastembed for ONNX-based inference. This model produces 1024-dimensional
/// embeddings and supports up to 512 tokens per input. Inference is CPU bound
/// and runs on the blocking pool.
pub struct BgeEmbedder {
    model: std::sync::Arc<Mutex<TextEmbedding>>,
}

impl BgeEmbedder {
    /// Create a new BGE embedder.
    ///
    /// Downloads the model on first use (~1.2GB).
    pub fn new() -> Result<Self> {
        let opts = InitOptions::new(EmbeddingModel::BGELargeENV15)
            .with_show_download_progress(true);

        TextEmbedding::try_new(opts)
            .map(|model| Self {
                model: std::sync::Arc::new(Mutex::new(model)),
            })
            .map_err(|e| Error::Embedding(e.to_string()))
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            model
                .embed(texts, None)
                .map_err(|e| Error::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
    }
}

#[async_trait]
impl Embedder for BgeEmbedder {
    fn model_name(&self) -> &str {
        "BAAI/bge-large-en-v1.5"
    }

    fn dimension(&self) -> usize {
        1024
    }

    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.run(texts.iter().map(|t| (*t).to_string()).collect())
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        // BGE uses a special prompt prefix for queries to improve retrieval
        let query_text = format!("Represent this sentence for searching relevant passages: {text}");

        self.run(vec![query_text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }
}
