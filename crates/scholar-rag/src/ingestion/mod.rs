//! Document ingestion: format detection, parsing, structure, chunking and indexing

pub mod chunker;
pub mod format;
pub mod indexer;
pub mod ocr;
pub mod parser;
pub mod remote;
pub mod structure;

pub use chunker::TextChunker;
pub use indexer::Indexer;
pub use ocr::OcrEngine;
pub use parser::{hash_content, DocumentParser, ParsedDocument};
pub use remote::{RemoteFetcher, RemoteFile};
