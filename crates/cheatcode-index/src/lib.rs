//! Code indexing and semantic retrieval.
//!
//! Source files are walked and split into bounded chunks, each chunk is
//! embedded, and the resulting vectors are persisted under
//! `<project>/.cheatcode/db`. Queries are embedded with the same model and
//! answered by similarity search with optional MMR re-ranking.

pub mod document;
pub mod error;
pub mod indexer;
pub mod retriever;
pub mod store;

pub use document::DocumentChunk;
pub use error::{IndexError, Result};
