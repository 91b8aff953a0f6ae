//! Source file discovery and chunking.

mod loader;
mod splitter;
mod types;

pub use loader::{LoadReport, LoaderConfig, SkippedFile, SourceLoader};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::DocumentChunk;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
