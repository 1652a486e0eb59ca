use std::hash::{DefaultHasher, Hash, Hasher};

use crate::embed::{Embedder, Embedding};
use crate::Result;

/// Model name recorded for indexes built by [`HashEmbedder`].
pub const HASH_MODEL_NAME: &str = "feature-hash-v1";

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lower-cased alphanumeric token adds 1.0 to the bucket its hash
/// selects. Texts sharing words get similar vectors, which is enough for
/// tests, demos, and running the pipeline without a model download.
///
/// Buckets come from std's `DefaultHasher`, which may change between Rust
/// releases. The hashing scheme is part of [`HASH_MODEL_NAME`], which is
/// recorded in persisted indexes; bump it if the bucketing changes, and
/// rebuild hash-embedded indexes after a toolchain upgrade.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0; self.dimension];
        for token in tokens(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashEmbedder {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        HASH_MODEL_NAME
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_is_versioned() {
        assert_eq!(HashEmbedder::default().model_name(), "feature-hash-v1");
    }

    #[test]
    fn test_deterministic() {
        let mut a = HashEmbedder::new(32);
        let mut b = HashEmbedder::new(32);
        assert_eq!(
            a.embed_query("The sky is blue.").unwrap(),
            b.embed_query("The sky is blue.").unwrap()
        );
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let mut e = HashEmbedder::default();
        assert_eq!(
            e.embed_query("Sky, blue!").unwrap(),
            e.embed_query("sky blue").unwrap()
        );
    }

    #[test]
    fn test_token_counts() {
        let mut e = HashEmbedder::new(16);
        let v = e.embed_query("one two three").unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(v.iter().sum::<f32>(), 3.0);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let mut e = HashEmbedder::new(4);
        assert_eq!(e.embed_query("  ...  ").unwrap(), vec![0.0; 4]);
    }
}
