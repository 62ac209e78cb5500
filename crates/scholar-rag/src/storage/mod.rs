//! Flat-file persistence: documents, summaries and conversations

pub mod conversations;
pub mod documents;
pub mod fs;

pub use conversations::ConversationStore;
pub use documents::DocumentStore;
pub use fs::StorageLayout;
