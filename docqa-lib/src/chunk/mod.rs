//! Document chunking strategies
//!
//! A chunk is the unit of retrieval: a bounded piece of the extracted
//! document text. Sizes and overlaps are measured in characters, never bytes,
//! so multi-byte text is never split inside a code point.
//!
//! - [`FixedSizeChunker`]: sliding character window, the default
//! - [`ParagraphChunker`]: packs whole paragraphs under the same size bound
//!
//! # Implementing a Chunker
//!
//! ```ignore
//! use docqa_lib::chunk::{Chunker, Chunk, ChunkMetadata};
//!
//! struct MyChunker { /* ... */ }
//!
//! impl Chunker for MyChunker {
//!     fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk> {
//!         // Your chunking logic here
//!         todo!()
//!     }
//!
//!     fn name(&self) -> &str {
//!         "mine"
//!     }
//! }
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A chunk of text with its metadata
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Chunk {
    /// Content hash of the chunk text
    pub id: String,
    /// The text content of this chunk
    pub text: String,
    /// 0-based order of this chunk within its document
    pub sequence_index: usize,
    /// Metadata about the source and position
    pub metadata: ChunkMetadata,
}

/// Metadata associated with a chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ChunkMetadata {
    /// Source document identifier
    pub source_id: Option<String>,
    /// Character offset of the chunk within the source document
    pub position: usize,
    /// Total number of chunks from this source
    pub total_chunks: Option<usize>,
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split content into chunks
    ///
    /// # Arguments
    /// * `content` - The text content to chunk
    /// * `metadata` - Base metadata to attach to each chunk
    ///
    /// # Returns
    /// Chunks in document order with increasing `sequence_index`.
    /// Empty content yields no chunks.
    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

mod fixed;
mod paragraph;

pub use fixed::*;
pub use paragraph::*;

/// Checks the `0 <= overlap < chunk_size` window invariant.
fn validate_window(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::InvalidInput("chunk_size must be greater than 0".into()));
    }
    if overlap >= chunk_size {
        return Err(Error::InvalidInput(format!(
            "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Turns `(position, text)` pieces into numbered chunks sharing `metadata`.
fn number_chunks(pieces: Vec<(usize, String)>, mut metadata: ChunkMetadata) -> Vec<Chunk> {
    metadata.total_chunks = Some(pieces.len());

    pieces
        .into_iter()
        .enumerate()
        .map(|(sequence_index, (position, text))| {
            let mut m = metadata.clone();
            m.position = position;
            Chunk {
                id: generate_id(&text),
                text,
                sequence_index,
                metadata: m,
            }
        })
        .collect()
}

fn generate_id(string: &str) -> String {
    let mut hasher = DefaultHasher::new();
    string.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_window() {
        assert!(validate_window(10, 0).is_ok());
        assert!(validate_window(10, 9).is_ok());
        assert!(matches!(validate_window(0, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_window(10, 10), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_window(10, 11), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_number_chunks_sets_sequence_and_total() {
        let meta = ChunkMetadata {
            source_id: Some("doc".into()),
            ..Default::default()
        };
        let chunks = number_chunks(vec![(0, "ab".into()), (2, "cd".into())], meta);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[1].sequence_index, 1);
        assert_eq!(chunks[1].metadata.position, 2);
        assert_eq!(chunks[1].metadata.total_chunks, Some(2));
        assert_eq!(chunks[1].metadata.source_id.as_deref(), Some("doc"));
    }
}
