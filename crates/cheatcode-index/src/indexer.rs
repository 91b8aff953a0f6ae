//! Project indexing: walk, chunk, embed, persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cheatcode_llm::{LlmError, LlmProvider};

use crate::document::{LoaderConfig, SkippedFile, SourceLoader, SplitterConfig, TextSplitter};
use crate::error::{IndexError, Result};
use crate::store::{VectorIndex, db_dir};

#[derive(Debug, Clone, Default)]
pub struct IndexerConfig {
    pub loader: LoaderConfig,
    pub splitter: SplitterConfig,
}

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub skipped: Vec<SkippedFile>,
    pub duration_ms: u64,
    pub db_path: PathBuf,
}

/// Builds and persists the vector index of a project tree.
pub struct CodeIndexer<P: LlmProvider> {
    provider: Arc<P>,
    loader: SourceLoader,
}

impl<P: LlmProvider> CodeIndexer<P> {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the splitter settings are invalid.
    pub fn new(provider: Arc<P>, config: IndexerConfig) -> Result<Self> {
        let splitter = TextSplitter::new(config.splitter)?;
        Ok(Self {
            provider,
            loader: SourceLoader::new(config.loader, splitter),
        })
    }

    /// Load, chunk and embed every source file under `root` without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be walked or any embedding request fails.
    pub async fn build(&self, root: &Path) -> Result<(VectorIndex, IndexReport)> {
        let start = std::time::Instant::now();
        let embedding_model = self
            .provider
            .embedding_model()
            .ok_or_else(|| LlmError::EmbedUnsupported {
                provider: self.provider.name().to_owned(),
            })?
            .to_owned();

        let (chunks, load) = self.loader.load(root).await?;
        tracing::info!(
            files = load.files_loaded,
            chunks = chunks.len(),
            "embedding chunks"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.provider.embed_batch(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(IndexError::Llm(LlmError::Other(format!(
                "expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            ))));
        }

        let index =
            VectorIndex::from_embeddings(embedding_model, chunks.into_iter().zip(vectors).collect())?;

        let report = IndexReport {
            files_scanned: load.files_scanned,
            files_indexed: load.files_loaded,
            chunks_created: index.len(),
            skipped: load.skipped,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            db_path: db_dir(root),
        };
        Ok((index, report))
    }

    /// Index the project at `root` into `<root>/.cheatcode/db`.
    ///
    /// Nothing is written unless every chunk was embedded, so a failed run
    /// leaves the project uninitialized.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` if a saved index exists, or any error
    /// from loading, embedding or saving.
    pub async fn init(&self, root: &Path) -> Result<IndexReport> {
        let db = db_dir(root);
        if VectorIndex::exists(&db) {
            return Err(IndexError::AlreadyInitialized(db));
        }

        let (index, report) = self.build(root).await?;
        index.save(&db)?;

        tracing::info!(
            files = report.files_indexed,
            chunks = report.chunks_created,
            skipped = report.skipped.len(),
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }
}
