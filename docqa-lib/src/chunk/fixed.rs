use std::iter;

use crate::chunk::{number_chunks, validate_window, Chunk, ChunkMetadata, Chunker};
use crate::Result;

/// Fixed-size chunker - slides a character window over the text
///
/// Each chunk holds up to `chunk_size` characters and starts `chunk_size -
/// overlap` characters after the previous one. The last chunk ends at the end
/// of the text and may be shorter.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker, rejecting `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        validate_window(chunk_size, overlap)?;
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Character windows over `content` as `(char_offset, slice)` pairs.
    pub(crate) fn windows<'a>(&self, content: &'a str) -> Vec<(usize, &'a str)> {
        // byte offset of every char boundary, including the end of the string
        let bounds: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(iter::once(content.len()))
            .collect();
        let total_chars = bounds.len() - 1;
        let stride = self.chunk_size - self.overlap;

        let mut windows = Vec::with_capacity(total_chars.div_ceil(stride));
        let mut start = 0;
        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            windows.push((start, &content[bounds[start]..bounds[end]]));
            if end == total_chars {
                break;
            }
            start += stride;
        }
        windows
    }
}

impl Chunker for FixedSizeChunker {
    fn name(&self) -> &str {
        "fixed"
    }

    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk> {
        let pieces = self
            .windows(content)
            .into_iter()
            .map(|(position, text)| (position, text.to_string()))
            .collect();
        number_chunks(pieces, metadata)
    }
}
