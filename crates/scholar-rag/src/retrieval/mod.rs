//! Chunk index and similarity search

pub mod index;
pub mod search;

pub use index::{ChunkIndex, IndexSnapshot};
pub use search::{cosine_similarity, Retriever, ScoredChunk};
