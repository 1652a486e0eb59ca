//! Vector index and its on-disk lifecycle
//!
//! # Storage Model
//!
//! Each index entry consists of:
//! - Text: an owned copy of the chunk it was built from
//! - Vector: the unit-length embedding of that text
//!
//! Entry ids are insertion positions. An index is built once from a full
//! entry set, persisted, and replaced wholesale by the next build. Similarity
//! is cosine: vectors are normalised at build time and scored by dot product.
//!
//! # Usage
//!
//! ```ignore
//! use docqa_lib::store::{IndexId, IndexRegistry};
//!
//! let registry = IndexRegistry::new("vector_store");
//! let id = IndexId::default();
//!
//! // Replace the index with a freshly embedded document
//! registry.build(&id, "all-MiniLM-L6-v2", entries).await?;
//!
//! // Search by vector similarity
//! let results = registry.get(&id).await?.search(&query_embedding, 3)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::embed::Embedding;

/// A search result with similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Insertion position of the matched entry
    pub id: usize,
    /// The matched chunk text
    pub text: String,
    /// Cosine similarity, -1.0 to 1.0 (higher is more similar)
    pub score: f32,
}

/// One stored passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub vector: Embedding,
}

mod index;
mod persist;
mod registry;

pub use index::*;
pub use registry::*;
