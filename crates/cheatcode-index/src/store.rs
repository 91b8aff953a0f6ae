//! Persisted vector index with exact similarity search.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::DocumentChunk;
use crate::error::{IndexError, Result};
use crate::retriever::RetrievalConfig;

/// Per-project data directory.
pub const DATA_DIR: &str = ".cheatcode";
const DB_DIR: &str = "db";
const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// Location of the persisted index for a project rooted at `root`.
#[must_use]
pub fn db_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(DB_DIR)
}

/// Similarity function used to rank chunks. Higher is always more similar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    #[serde(alias = "cos")]
    Cosine,
    Dot,
    /// `1 / (1 + euclidean distance)`.
    #[serde(alias = "l2")]
    Euclidean,
}

impl DistanceMetric {
    #[must_use]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Dot => dot(a, b),
            Self::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(IndexError::InvalidConfig(format!(
                "unknown distance metric: {other}"
            ))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    version: u32,
    embedding_model: &'a str,
    dimension: usize,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// A chunk returned from a search together with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Chunks and their embeddings, all produced by a single embedding model.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from embedded chunks.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors do not all share one length.
    pub fn from_embeddings(
        embedding_model: impl Into<String>,
        embedded: Vec<(DocumentChunk, Vec<f32>)>,
    ) -> Result<Self> {
        let dimension = embedded.first().map_or(0, |(_, v)| v.len());
        let mut entries = Vec::with_capacity(embedded.len());
        for (chunk, vector) in embedded {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                });
            }
            entries.push(IndexEntry { chunk, vector });
        }
        Ok(Self {
            embedding_model: embedding_model.into(),
            dimension,
            entries,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Whether a persisted index exists in `dir`.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Persist the index into `dir`, creating it if needed.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// `index.json` is either absent or complete. A failed write removes the
    /// temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let persisted = PersistedIndexRef {
            version: FORMAT_VERSION,
            embedding_model: &self.embedding_model,
            dimension: self.dimension,
            entries: &self.entries,
        };
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        let bytes = serde_json::to_vec(&persisted)?;
        let written =
            std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, dir.join(INDEX_FILE)));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        tracing::debug!(path = %dir.display(), entries = self.entries.len(), "index saved");
        Ok(())
    }

    /// Load a persisted index from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if no index exists, `UnsupportedVersion` for an
    /// unknown format, or `DimensionMismatch` if any stored vector disagrees
    /// with the recorded dimension.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotInitialized(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        if persisted.version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(persisted.version));
        }
        if let Some(bad) = persisted
            .entries
            .iter()
            .find(|e| e.vector.len() != persisted.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: persisted.dimension,
                found: bad.vector.len(),
            });
        }
        tracing::debug!(path = %path.display(), entries = persisted.entries.len(), "index loaded");
        Ok(Self {
            embedding_model: persisted.embedding_model,
            dimension: persisted.dimension,
            entries: persisted.entries,
        })
    }

    /// Rank chunks against `query`.
    ///
    /// The `fetch_k` most similar chunks are taken as candidates. Without
    /// diversification the top `k` of those are returned; with it, maximal
    /// marginal relevance picks `k` candidates that balance query similarity
    /// against similarity to chunks already picked. Scores are always the
    /// plain query similarity.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `query` does not match the index dimension.
    pub fn search(&self, query: &[f32], config: &RetrievalConfig) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let metric = config.metric();
        let mut candidates: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, metric.similarity(query, &e.vector)))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(config.fetch_k());

        let picked = if config.diversify() {
            self.max_marginal_relevance(candidates, metric, config.k(), config.lambda_mult())
        } else {
            candidates.truncate(config.k());
            candidates
        };

        Ok(picked
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    fn max_marginal_relevance(
        &self,
        mut remaining: Vec<(usize, f32)>,
        metric: DistanceMetric,
        k: usize,
        lambda_mult: f32,
    ) -> Vec<(usize, f32)> {
        let mut selected: Vec<(usize, f32)> = Vec::with_capacity(k.min(remaining.len()));

        while selected.len() < k && !remaining.is_empty() {
            let mut best_pos = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (pos, &(idx, query_sim)) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&(s, _)| metric.similarity(&self.entries[idx].vector, &self.entries[s].vector))
                    .fold(None, |acc: Option<f32>, x| Some(acc.map_or(x, |a| a.max(x))))
                    .unwrap_or(0.0);
                let score = lambda_mult * query_sim - (1.0 - lambda_mult) * redundancy;
                if score > best_score {
                    best_score = score;
                    best_pos = pos;
                }
            }
            selected.push(remaining.remove(best_pos));
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, idx: usize) -> DocumentChunk {
        DocumentChunk {
            source_path: path.into(),
            content: format!("{path}#{idx}"),
            chunk_index: idx,
        }
    }

    fn config(k: usize, fetch_k: usize, diversify: bool) -> RetrievalConfig {
        RetrievalConfig::new(DistanceMetric::Cosine, fetch_k, k, diversify, 0.5).unwrap()
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::from_embeddings(
            "test-model",
            vec![
                (chunk("a.py", 0), vec![1.0, 0.0, 0.0]),
                (chunk("a.py", 1), vec![0.99, 0.1, 0.0]),
                (chunk("b.py", 0), vec![0.7, 0.7, 0.0]),
                (chunk("c.py", 0), vec![0.0, 0.0, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn cosine_similarity_identical() {
        let v = [0.3, 0.4, 0.5];
        assert!((DistanceMetric::Cosine.similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        assert!(DistanceMetric::Cosine.similarity(&[0.0, 0.0], &[1.0, 2.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn euclidean_similarity_is_one_for_identical_vectors() {
        let v = [1.0, 2.0];
        assert!((DistanceMetric::Euclidean.similarity(&v, &v) - 1.0).abs() < f32::EPSILON);
        assert!(DistanceMetric::Euclidean.similarity(&v, &[4.0, 6.0]) < 0.2);
    }

    #[test]
    fn metric_from_str() {
        assert_eq!("cos".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn from_embeddings_rejects_mixed_dimensions() {
        let err = VectorIndex::from_embeddings(
            "m",
            vec![(chunk("a.py", 0), vec![1.0]), (chunk("b.py", 0), vec![1.0, 2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 1, found: 2 }));
    }

    #[test]
    fn plain_search_orders_by_similarity() {
        let results = sample_index()
            .search(&[1.0, 0.0, 0.0], &config(3, 4, false))
            .unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, vec!["a.py#0", "a.py#1", "b.py#0"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn mmr_prefers_diverse_results() {
        let query = [1.0, 0.3, 0.1];
        let results = sample_index().search(&query, &config(2, 4, true)).unwrap();
        assert_eq!(results[0].chunk.content, "a.py#1");
        // a.py#0 is nearly a duplicate of a.py#1, so b.py#0 wins the second slot.
        assert_eq!(results[1].chunk.content, "b.py#0");
        let expected = DistanceMetric::Cosine.similarity(&query, &[0.7, 0.7, 0.0]);
        assert!((results[1].score - expected).abs() < 1e-6);
    }

    #[test]
    fn mmr_only_draws_from_fetch_k_candidates() {
        let results = sample_index()
            .search(&[1.0, 0.0, 0.0], &config(2, 2, true))
            .unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["a.py#0", "a.py#1"]);
    }

    #[test]
    fn search_returns_at_most_k() {
        let results = sample_index().search(&[0.0, 1.0, 0.0], &config(10, 10, true)).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn search_empty_index_is_empty() {
        let index = VectorIndex::from_embeddings("m", Vec::new()).unwrap();
        assert!(index.search(&[1.0, 2.0], &config(3, 5, true)).unwrap().is_empty());
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let err = sample_index().search(&[1.0, 0.0], &config(1, 1, false)).unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 3, found: 2 }));
    }

    #[test]
    fn save_and_load_round_trip_preserves_search() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_dir(dir.path());
        let index = sample_index();
        index.save(&db).unwrap();
        assert!(VectorIndex::exists(&db));
        assert!(!db.join("index.json.tmp").exists());

        let loaded = VectorIndex::load(&db).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.embedding_model(), "test-model");

        let cfg = config(3, 4, true);
        let query = [0.5, 0.5, 0.1];
        assert_eq!(index.search(&query, &cfg).unwrap(), loaded.search(&query, &cfg).unwrap());
    }

    #[test]
    fn failed_save_leaves_no_index_and_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail.
        std::fs::create_dir_all(dir.path().join(INDEX_FILE).join("blocker")).unwrap();

        assert!(sample_index().save(dir.path()).is_err());
        assert!(!dir.path().join("index.json.tmp").exists());
        assert!(!VectorIndex::exists(dir.path()));
    }

    #[test]
    fn load_missing_index_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&db_dir(dir.path())).unwrap_err();
        assert!(matches!(err, IndexError::NotInitialized(_)));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            r#"{"version":99,"embedding_model":"m","dimension":1,"entries":[]}"#,
        )
        .unwrap();
        let err = VectorIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedVersion(99)));
    }

    #[test]
    fn load_rejects_corrupt_dimension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            r#"{"version":1,"embedding_model":"m","dimension":2,"entries":[{"chunk":{"source_path":"a.py","content":"x","chunk_index":0},"vector":[1.0]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            VectorIndex::load(dir.path()).unwrap_err(),
            IndexError::DimensionMismatch { expected: 2, found: 1 }
        ));
    }
}
