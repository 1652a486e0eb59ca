//! High-level retrieval interface
//!
//! Combines the embedder and the index registry: chunks go in through
//! [`Retriever::index`], questions come back out of [`Retriever::retrieve`]
//! as ranked passages.
//!
//! # Usage
//!
//! ```ignore
//! use docqa_lib::retrieve::Retriever;
//!
//! let retriever = Retriever::new(embedder, registry);
//! retriever.index(&id, &chunks).await?;
//! let context = retriever.retrieve(&id, "What is the warranty period?", 3).await?;
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::chunk::Chunk;
use crate::embed::SharedEmbedder;
use crate::store::{IndexId, IndexRegistry, SearchResult, VectorIndex};
use crate::{Error, Result};

/// Passages ranked by decreasing similarity to a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievedContext {
    passages: Vec<SearchResult>,
}

impl RetrievedContext {
    pub fn new(passages: Vec<SearchResult>) -> Self {
        Self { passages }
    }

    /// Passage texts in rank order.
    pub fn texts(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn passages(&self) -> &[SearchResult] {
        &self.passages
    }

    pub fn into_passages(self) -> Vec<SearchResult> {
        self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl FromIterator<String> for RetrievedContext {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .enumerate()
                .map(|(id, text)| SearchResult {
                    id,
                    text,
                    score: 0.0,
                })
                .collect(),
        )
    }
}

/// Embeds questions and searches the named index.
#[derive(Clone)]
pub struct Retriever {
    embedder: SharedEmbedder,
    indexes: Arc<IndexRegistry>,
}

impl Retriever {
    #[must_use]
    pub fn new(embedder: SharedEmbedder, indexes: Arc<IndexRegistry>) -> Self {
        Self { embedder, indexes }
    }

    /// Embed every chunk and replace the index `id` with the result.
    pub async fn index(&self, id: &IndexId, chunks: &[Chunk]) -> Result<Arc<VectorIndex>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(texts.clone()).await?;

        let entries = texts.into_iter().zip(embeddings).collect();
        self.indexes
            .build(id, self.embedder.model_name(), entries)
            .await
    }

    /// The `k` passages of index `id` most similar to `question`.
    ///
    /// Fails with [`Error::IndexNotFound`] when nothing was built for `id` and
    /// with [`Error::IndexCorrupt`] when it was built by a different embedder.
    pub async fn retrieve(
        &self,
        id: &IndexId,
        question: &str,
        k: usize,
    ) -> Result<RetrievedContext> {
        let index = self.indexes.get(id).await?;
        if index.dimension() != self.embedder.dimension()
            || index.model() != self.embedder.model_name()
        {
            return Err(Error::corrupt(
                self.indexes.path_for(id),
                format!(
                    "built with {} ({} dimensions) but the embedder is {} ({} dimensions)",
                    index.model(),
                    index.dimension(),
                    self.embedder.model_name(),
                    self.embedder.dimension()
                ),
            ));
        }

        let query = self.embedder.embed_one(question).await?;
        let passages = index.search(&query, k)?;
        tracing::debug!(index = %id, k, found = passages.len(), "retrieved context");

        Ok(RetrievedContext::new(passages))
    }

    #[must_use]
    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    #[must_use]
    pub fn indexes(&self) -> &Arc<IndexRegistry> {
        &self.indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkMetadata, Chunker, FixedSizeChunker};
    use crate::embed::HashEmbedder;
    use tempfile::tempdir;

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            id: i.to_string(),
            text: text.to_string(),
            sequence_index: i,
            metadata: ChunkMetadata::default(),
        }
    }

    fn retriever(root: &std::path::Path, dimension: usize) -> Retriever {
        Retriever::new(
            SharedEmbedder::new(HashEmbedder::new(dimension)),
            Arc::new(IndexRegistry::new(root)),
        )
    }

    #[tokio::test]
    async fn test_sky_is_blue() {
        let dir = tempdir().unwrap();
        let retriever = retriever(dir.path(), 384);
        let id = IndexId::default();

        retriever
            .index(&id, &[chunk(0, "The sky is blue."), chunk(1, "Grass is green.")])
            .await
            .unwrap();

        let context = retriever.retrieve(&id, "What color is the sky?", 1).await.unwrap();
        assert_eq!(context.texts(), vec!["The sky is blue."]);
    }

    #[tokio::test]
    async fn test_retrieve_before_index_is_not_found() {
        let dir = tempdir().unwrap();
        let retriever = retriever(dir.path(), 16);

        let err = retriever
            .retrieve(&IndexId::default(), "anything?", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_index_empty_chunk_set_fails() {
        let dir = tempdir().unwrap();
        let retriever = retriever(dir.path(), 16);

        let err = retriever.index(&IndexId::default(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::IndexBuild(_)));
    }

    #[tokio::test]
    async fn test_results_bounded_and_ordered() {
        let dir = tempdir().unwrap();
        let retriever = retriever(dir.path(), 128);
        let id = IndexId::default();

        let text = "apples grow on trees. bananas are yellow. cherries are red. \
                    dates are sweet. elderberries make wine.";
        let chunks = FixedSizeChunker::new(24, 4)
            .unwrap()
            .chunk(text, ChunkMetadata::default());
        retriever.index(&id, &chunks).await.unwrap();

        let context = retriever.retrieve(&id, "which fruit is red", 3).await.unwrap();
        assert_eq!(context.len(), 3);
        for pair in context.passages().windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let all = retriever.retrieve(&id, "which fruit is red", 100).await.unwrap();
        assert_eq!(all.len(), chunks.len());
    }

    #[tokio::test]
    async fn test_embedder_dimension_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let id = IndexId::default();
        retriever(dir.path(), 32)
            .index(&id, &[chunk(0, "some text")])
            .await
            .unwrap();

        let err = retriever(dir.path(), 64)
            .retrieve(&id, "text", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexCorrupt { .. }));
    }
}
