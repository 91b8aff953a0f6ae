use serde::{Deserialize, Serialize};

/// A contiguous slice of one source file, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Path of the originating file, relative to the indexed project root.
    pub source_path: String,
    pub content: String,
    /// Position of this chunk within its file, starting at zero.
    pub chunk_index: usize,
}
