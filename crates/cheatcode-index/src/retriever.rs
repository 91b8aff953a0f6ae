//! Query-time retrieval over a persisted index.

use std::path::Path;
use std::sync::Arc;

use cheatcode_llm::{LlmError, LlmProvider};

use crate::error::{IndexError, Result};
use crate::store::{DistanceMetric, ScoredChunk, VectorIndex, db_dir};

/// Validated retrieval parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    metric: DistanceMetric,
    fetch_k: usize,
    k: usize,
    diversify: bool,
    lambda_mult: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            fetch_k: 20,
            k: 20,
            diversify: true,
            lambda_mult: 0.5,
        }
    }
}

impl RetrievalConfig {
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `1 <= k <= fetch_k` and `lambda_mult`
    /// lies in `[0, 1]`.
    pub fn new(
        metric: DistanceMetric,
        fetch_k: usize,
        k: usize,
        diversify: bool,
        lambda_mult: f32,
    ) -> Result<Self> {
        if k == 0 {
            return Err(IndexError::InvalidConfig("k must be at least 1".into()));
        }
        if fetch_k < k {
            return Err(IndexError::InvalidConfig(format!(
                "fetch_k ({fetch_k}) must be at least k ({k})"
            )));
        }
        if !(0.0..=1.0).contains(&lambda_mult) {
            return Err(IndexError::InvalidConfig(format!(
                "lambda_mult ({lambda_mult}) must be between 0 and 1"
            )));
        }
        Ok(Self {
            metric,
            fetch_k,
            k,
            diversify,
            lambda_mult,
        })
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn diversify(&self) -> bool {
        self.diversify
    }

    #[must_use]
    pub fn lambda_mult(&self) -> f32 {
        self.lambda_mult
    }
}

/// Embeds queries and searches a loaded index.
pub struct CodeRetriever<P: LlmProvider> {
    provider: Arc<P>,
    index: Arc<VectorIndex>,
    config: RetrievalConfig,
}

impl<P: LlmProvider> CodeRetriever<P> {
    /// # Errors
    ///
    /// Returns `EmbeddingMismatch` if the provider embeds with a different
    /// model than the one the index was built with.
    pub fn new(provider: Arc<P>, index: Arc<VectorIndex>, config: RetrievalConfig) -> Result<Self> {
        let found = provider
            .embedding_model()
            .ok_or_else(|| LlmError::EmbedUnsupported {
                provider: provider.name().to_owned(),
            })?;
        if found != index.embedding_model() {
            return Err(IndexError::EmbeddingMismatch {
                expected: index.embedding_model().to_owned(),
                found: found.to_owned(),
            });
        }
        Ok(Self {
            provider,
            index,
            config,
        })
    }

    /// Load the persisted index of the project at `root`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the project has not been indexed, or any
    /// error from [`VectorIndex::load`] and [`CodeRetriever::new`].
    pub fn open(provider: Arc<P>, root: &Path, config: RetrievalConfig) -> Result<Self> {
        let index = VectorIndex::load(&db_dir(root))?;
        tracing::info!(
            chunks = index.len(),
            model = index.embedding_model(),
            "index loaded"
        );
        Self::new(provider, Arc::new(index), config)
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return up to `k` chunks relevant to `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() {
            tracing::debug!("index is empty, skipping query embedding");
            return Ok(Vec::new());
        }
        let vector = self.provider.embed(query).await?;
        let results = self.index.search(&vector, &self.config)?;
        tracing::debug!(results = results.len(), "retrieval complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use cheatcode_llm::mock::MockProvider;

    use super::*;
    use crate::document::DocumentChunk;

    fn index_from(provider: &MockProvider, docs: &[(&str, &str)]) -> VectorIndex {
        let embedded = docs
            .iter()
            .map(|(path, content)| {
                (
                    DocumentChunk {
                        source_path: (*path).into(),
                        content: (*content).into(),
                        chunk_index: 0,
                    },
                    provider.embedding_for(content),
                )
            })
            .collect();
        VectorIndex::from_embeddings("mock-embedding", embedded).unwrap()
    }

    #[test]
    fn config_validation() {
        assert!(RetrievalConfig::new(DistanceMetric::Cosine, 5, 0, true, 0.5).is_err());
        assert!(RetrievalConfig::new(DistanceMetric::Cosine, 2, 3, true, 0.5).is_err());
        assert!(RetrievalConfig::new(DistanceMetric::Cosine, 3, 3, true, 1.5).is_err());
        assert!(RetrievalConfig::new(DistanceMetric::Dot, 3, 3, false, 0.0).is_ok());
    }

    #[test]
    fn default_config_matches_cli_defaults() {
        let cfg = RetrievalConfig::default();
        assert_eq!(cfg.k(), 20);
        assert_eq!(cfg.fetch_k(), 20);
        assert!(cfg.diversify());
        assert_eq!(cfg.metric(), DistanceMetric::Cosine);
    }

    #[tokio::test]
    async fn retrieves_relevant_chunk_first() {
        let provider = MockProvider::default();
        let index = index_from(
            &provider,
            &[
                ("math.py", "def add(a, b): return a + b"),
                ("io.py", "def read_file(path): open path"),
                ("net.py", "def fetch(url): request url"),
            ],
        );
        let config = RetrievalConfig::new(DistanceMetric::Cosine, 3, 1, false, 0.5).unwrap();
        let retriever = CodeRetriever::new(Arc::new(provider), Arc::new(index), config).unwrap();

        let results = retriever.retrieve("how does add work").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_path, "math.py");
    }

    #[tokio::test]
    async fn returns_exactly_k_when_index_is_larger() {
        let provider = MockProvider::default();
        let docs: Vec<(String, String)> = (0..10)
            .map(|i| (format!("f{i}.py"), format!("def func_{i}(): return {i}")))
            .collect();
        let refs: Vec<(&str, &str)> = docs.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let index = index_from(&provider, &refs);
        let config = RetrievalConfig::new(DistanceMetric::Cosine, 10, 3, true, 0.5).unwrap();
        let retriever = CodeRetriever::new(Arc::new(provider), Arc::new(index), config).unwrap();

        assert_eq!(retriever.retrieve("func return").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_index_returns_nothing_without_embedding() {
        let provider = Arc::new(MockProvider::default());
        let index = VectorIndex::from_embeddings("mock-embedding", Vec::new()).unwrap();
        let retriever =
            CodeRetriever::new(provider.clone(), Arc::new(index), RetrievalConfig::default())
                .unwrap();

        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
        assert!(provider.embedded_texts().is_empty());
    }

    #[test]
    fn rejects_embedding_model_mismatch() {
        let index = VectorIndex::from_embeddings("text-embedding-3-small", Vec::new()).unwrap();
        let result = CodeRetriever::new(
            Arc::new(MockProvider::default()),
            Arc::new(index),
            RetrievalConfig::default(),
        );
        assert!(matches!(result, Err(IndexError::EmbeddingMismatch { .. })));
    }

    #[test]
    fn open_uninitialized_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = CodeRetriever::open(
            Arc::new(MockProvider::default()),
            dir.path(),
            RetrievalConfig::default(),
        );
        assert!(matches!(result, Err(IndexError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let provider = MockProvider::default();
        let index = index_from(&provider, &[("a.py", "alpha")]);
        let failing = MockProvider::default().with_fail_embed();
        let retriever =
            CodeRetriever::new(Arc::new(failing), Arc::new(index), RetrievalConfig::default())
                .unwrap();
        let err = retriever.retrieve("alpha").await.unwrap_err();
        assert!(err.is_transient());
    }
}
