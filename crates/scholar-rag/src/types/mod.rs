//! Core types for the literature pipeline

pub mod conversation;
pub mod document;
pub mod query;
pub mod response;

pub use conversation::*;
pub use document::*;
pub use query::*;
pub use response::*;
