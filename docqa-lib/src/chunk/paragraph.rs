use std::collections::VecDeque;

use crate::chunk::{number_chunks, validate_window, Chunk, ChunkMetadata, Chunker, FixedSizeChunker};
use crate::Result;

const SEPARATOR: &str = "\n\n";
const SEPARATOR_LEN: usize = 2;

/// Paragraph chunker - packs whole paragraphs into size-bounded chunks
///
/// Good for: prose where a blank line marks a topic change
///
/// Paragraphs are joined with a blank line until the next one would push the
/// chunk past `chunk_size` characters. The next chunk then starts with the
/// trailing paragraphs of the previous one, as many as fit in `overlap`
/// characters. A paragraph longer than `chunk_size` is cut with the fixed
/// window instead.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    window: FixedSizeChunker,
}

impl ParagraphChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        validate_window(chunk_size, overlap)?;
        Ok(Self {
            window: FixedSizeChunker::new(chunk_size, overlap)?,
        })
    }
}

/// Paragraphs waiting to be emitted, with their joined length in characters.
#[derive(Default)]
struct Pending<'a> {
    paragraphs: VecDeque<(usize, &'a str, usize)>,
    len: usize,
}

impl<'a> Pending<'a> {
    fn len_with(&self, extra: usize) -> usize {
        if self.paragraphs.is_empty() {
            extra
        } else {
            self.len + SEPARATOR_LEN + extra
        }
    }

    fn push(&mut self, position: usize, text: &'a str, chars: usize) {
        self.len = self.len_with(chars);
        self.paragraphs.push_back((position, text, chars));
    }

    fn pop_front(&mut self) {
        if let Some((_, _, chars)) = self.paragraphs.pop_front() {
            self.len = if self.paragraphs.is_empty() {
                0
            } else {
                self.len - chars - SEPARATOR_LEN
            };
        }
    }

    fn joined(&self) -> Option<(usize, String)> {
        let (position, _, _) = self.paragraphs.front()?;
        let text: Vec<&str> = self.paragraphs.iter().map(|(_, t, _)| *t).collect();
        Some((*position, text.join(SEPARATOR)))
    }
}

impl Chunker for ParagraphChunker {
    fn name(&self) -> &str {
        "paragraph"
    }

    fn chunk(&self, content: &str, metadata: ChunkMetadata) -> Vec<Chunk> {
        let chunk_size = self.window.chunk_size();
        let overlap = self.window.overlap();

        let mut pieces = Vec::new();
        let mut pending = Pending::default();

        for (position, paragraph) in Paragraphs::from(content) {
            let chars = paragraph.chars().count();

            if chars > chunk_size {
                pieces.extend(pending.joined());
                pending = Pending::default();
                for (offset, window) in self.window.windows(paragraph) {
                    pieces.push((position + offset, window.to_string()));
                }
                continue;
            }

            if !pending.paragraphs.is_empty() && pending.len_with(chars) > chunk_size {
                pieces.extend(pending.joined());
                // keep a tail of at most `overlap` characters that still leaves room
                while !pending.paragraphs.is_empty()
                    && (pending.len > overlap || pending.len_with(chars) > chunk_size)
                {
                    pending.pop_front();
                }
            }

            pending.push(position, paragraph, chars);
        }

        // flush remaining paragraphs
        pieces.extend(pending.joined());

        number_chunks(pieces, metadata)
    }
}

/// Iterates over blank-line separated paragraphs as `(char_offset, text)`,
/// with trailing whitespace trimmed from each paragraph.
struct Paragraphs<'a> {
    s: &'a str,
    chars: usize,
}

impl<'a> Paragraphs<'a> {
    fn from(s: &'a str) -> Self {
        Self { s, chars: 0 }
    }
}

impl<'a> Iterator for Paragraphs<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        // Find the start of the paragraph.
        loop {
            if self.s.is_empty() {
                return None;
            }
            let (line, rest) = split_first_line(self.s);
            if !is_blank(line) {
                break;
            }
            self.chars += line.chars().count();
            self.s = rest;
        }

        // Find the end of the paragraph.
        let start = self.chars;
        let mut len = 0;
        loop {
            let (line, _) = split_first_line(&self.s[len..]);
            if is_blank(line) {
                break;
            }
            len += line.len();
        }

        let (paragraph, rest) = self.s.split_at(len);
        self.chars += paragraph.chars().count();
        self.s = rest;
        Some((start, paragraph.trim_end()))
    }
}

fn is_blank(line: &str) -> bool {
    line.chars().all(char::is_whitespace)
}

fn split_first_line(s: &str) -> (&str, &str) {
    let len = match s.find('\n') {
        Some(i) => i + 1,
        None => s.len(),
    };
    s.split_at(len)
}
