//! Section-aware chunking with overlap
//!
//! Each chunk owns a `chunk_size` window of one section's text; the indexed
//! text additionally carries up to `overlap` chars of the preceding window for
//! context. Windows never cross section boundaries, so a section of `n` chars
//! yields exactly `ceil(n / chunk_size)` chunks.

use uuid::Uuid;

use crate::types::{Chunk, Document};

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Chars owned by each chunk
    chunk_size: usize,
    /// Chars of preceding context prepended
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; `overlap` is capped below `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a section of `chars` chars produces
    pub fn expected_chunks(&self, chars: usize) -> usize {
        chars.div_ceil(self.chunk_size)
    }

    /// Chunk every section of a document (embeddings left empty)
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let offsets = doc.section_offsets();
        let mut chunks = Vec::new();

        for (section_index, (section, base)) in doc.sections.iter().zip(offsets).enumerate() {
            let text = section.text();
            for window in self.windows(&text) {
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    document_id: doc.id,
                    section_index,
                    section_heading: section.heading.clone(),
                    chunk_index: chunks.len(),
                    char_offset: base + window.start,
                    char_len: window.text.chars().count(),
                    text: window.text,
                    embedding: Vec::new(),
                });
            }
        }

        chunks
    }

    /// Split text into owned windows plus overlap prefix
    fn windows(&self, text: &str) -> Vec<Window> {
        let chars: Vec<char> = text.chars().collect();
        let mut windows = Vec::with_capacity(self.expected_chunks(chars.len()));

        let mut start = 0usize;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let context = start.saturating_sub(self.overlap);
            windows.push(Window {
                start,
                text: chars[context..end].iter().collect(),
            });
            start = end;
        }

        windows
    }
}

struct Window {
    /// Section-relative char offset of the owned part
    start: usize,
    text: String,
}
