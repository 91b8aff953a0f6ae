use serde::{Deserialize, Serialize};

use cheatcode_index::document::{DEFAULT_MAX_FILE_SIZE, LoaderConfig, SplitterConfig};
use cheatcode_index::indexer::IndexerConfig;
use cheatcode_index::retriever::RetrievalConfig;
use cheatcode_index::store::DistanceMetric;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4".into()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat completion model.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Upper bound on completion length.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            embed_batch_size: default_embed_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["py".into()]
}

fn default_exclude_dirs() -> Vec<String> {
    vec![".venv".into()]
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            max_file_size: default_max_file_size(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    #[must_use]
    pub fn indexer(&self) -> IndexerConfig {
        IndexerConfig {
            loader: LoaderConfig {
                extensions: self.extensions.clone(),
                exclude_dirs: self.exclude_dirs.clone(),
                max_file_size: self.max_file_size,
            },
            splitter: self.splitter(),
        }
    }
}

fn default_k() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_lambda_mult() -> f32 {
    0.5
}

/// Raw `[retrieval]` table; validated into a [`RetrievalConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalSettings {
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "default_k")]
    pub fetch_k: usize,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_true")]
    pub diversify: bool,
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            fetch_k: default_k(),
            k: default_k(),
            diversify: true,
            lambda_mult: default_lambda_mult(),
        }
    }
}

impl RetrievalSettings {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the values violate `1 <= k <= fetch_k` or
    /// `lambda_mult` is outside `[0, 1]`.
    pub fn validated(&self) -> cheatcode_index::Result<RetrievalConfig> {
        RetrievalConfig::new(
            self.metric,
            self.fetch_k,
            self.k,
            self.diversify,
            self.lambda_mult,
        )
    }
}

fn default_max_context_tokens() -> usize {
    10_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Estimated-token ceiling for retrieved context in the answer prompt.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Idle time after which an HTTP chat session is discarded.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            session_ttl_secs: default_session_ttl_secs(),
            max_body_size: default_gateway_max_body(),
        }
    }
}
