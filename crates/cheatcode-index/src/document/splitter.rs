use crate::error::{IndexError, Result};

use super::types::DocumentChunk;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `chunk_size` is zero or the overlap is not
    /// smaller than the chunk size.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IndexError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text on paragraph boundaries into chunks of at most `chunk_size` characters.
///
/// Paragraph separators stay attached to the preceding piece, so with zero
/// overlap the emitted chunks concatenate back to the input. Blank input
/// yields no chunks. Paragraphs longer than `chunk_size` are hard-split.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration fails validation.
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let pieces: Vec<String> = split_paragraphs(text)
            .into_iter()
            .flat_map(|p| hard_split(p, self.config.chunk_size))
            .collect();

        merge_pieces(&pieces, self.config.chunk_size, self.config.chunk_overlap)
    }

    #[must_use]
    pub fn split_document(&self, source_path: &str, text: &str) -> Vec<DocumentChunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                source_path: source_path.to_owned(),
                content,
                chunk_index,
            })
            .collect()
    }
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, sep) in text.match_indices(PARAGRAPH_SEPARATOR) {
        let end = idx + sep.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn hard_split(piece: &str, chunk_size: usize) -> Vec<String> {
    if piece.chars().count() <= chunk_size {
        return vec![piece.to_owned()];
    }
    let chars: Vec<char> = piece.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect()
}

/// Greedily packs pieces into chunks, carrying whole trailing pieces forward as overlap.
fn merge_pieces(pieces: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let lens: Vec<usize> = pieces.iter().map(|p| p.chars().count()).collect();
    let mut chunks = Vec::new();
    let mut window_start = 0;
    let mut current_len = 0;

    for idx in 0..pieces.len() {
        if idx > window_start && current_len + lens[idx] > chunk_size {
            chunks.push(pieces[window_start..idx].concat());

            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                if overlap_len + lens[i] > chunk_overlap {
                    break;
                }
                overlap_len += lens[i];
                overlap_start = i;
            }
            // Overlap must still leave room for the incoming piece.
            while overlap_start < idx && overlap_len + lens[idx] > chunk_size {
                overlap_len -= lens[overlap_start];
                overlap_start += 1;
            }
            window_start = overlap_start;
            current_len = overlap_len;
        }
        current_len += lens[idx];
    }

    if window_start < pieces.len() {
        chunks.push(pieces[window_start..].concat());
    }

    chunks
}
