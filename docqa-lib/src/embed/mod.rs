//! Text embedding
//!
//! The default model is sentence-transformers/all-MiniLM-L6-v2 via the
//! fastembed crate (ONNX runtime). [`HashEmbedder`] is a deterministic,
//! model-free stand-in for tests and offline use.
//!
//! # Model Details
//!
//! - Dimensions: 384
//! - Max tokens: 256
//!
//! # Usage
//!
//! ```ignore
//! use docqa_lib::embed::{MiniLmEmbedder, SharedEmbedder};
//!
//! let embedder = SharedEmbedder::new(MiniLmEmbedder::new(None)?);
//!
//! // Embed documents (for indexing)
//! let doc_embeddings = embedder.embed_batch(vec!["Chapter one...".into()]).await?;
//!
//! // Embed query (for searching)
//! let query_embedding = embedder.embed_one("What happens in chapter one?").await?;
//! ```

use std::sync::{Arc, Mutex};

use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
pub trait Embedder: Send + Sync {
    /// Embed multiple documents for indexing
    ///
    /// Documents may be batched for efficiency.
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    ///
    /// Note: Some models use different prompts for queries vs documents.
    /// This method handles that distinction.
    fn embed_query(&mut self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

mod hash;
mod minilm;

pub use hash::*;
pub use minilm::*;

/// Cloneable handle that lets async code share one embedder.
///
/// Inference runs on tokio's blocking pool. Calls are serialised on the
/// model, and every result is checked against the embedder's contract: one
/// vector per input, in order, all of [`SharedEmbedder::dimension`] length.
#[derive(Clone)]
pub struct SharedEmbedder {
    inner: Arc<Mutex<Box<dyn Embedder>>>,
    dimension: usize,
    model_name: String,
}

impl SharedEmbedder {
    pub fn new(embedder: impl Embedder + 'static) -> Self {
        let dimension = embedder.dimension();
        let model_name = embedder.model_name().to_string();
        Self {
            inner: Arc::new(Mutex::new(Box::new(embedder))),
            dimension,
            model_name,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Embed passages, one vector per input in input order.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let inner = Arc::clone(&self.inner);
        let embeddings = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let mut embedder = inner
                .lock()
                .map_err(|_| Error::Embedding("embedder lock poisoned".to_string()))?;
            embedder.embed_documents(&refs)
        })
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))??;

        if embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "model returned {} embeddings for {expected} inputs",
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        Ok(embeddings)
    }

    /// Embed a single query string.
    pub async fn embed_one(&self, text: impl Into<String>) -> Result<Embedding> {
        let text = text.into();
        let inner = Arc::clone(&self.inner);
        let embedding = tokio::task::spawn_blocking(move || {
            let mut embedder = inner
                .lock()
                .map_err(|_| Error::Embedding("embedder lock poisoned".to_string()))?;
            embedder.embed_query(&text)
        })
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))??;

        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "expected {}-dimensional embedding from {}, got {}",
                self.dimension,
                self.model_name,
                embedding.len()
            )));
        }
        Ok(())
    }
}
