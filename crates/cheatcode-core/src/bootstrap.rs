//! Wiring configuration and credentials into ready-to-use pipeline parts.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cheatcode_index::indexer::CodeIndexer;
use cheatcode_index::retriever::CodeRetriever;
use cheatcode_llm::any::AnyProvider;
use cheatcode_llm::http::default_client;
use cheatcode_llm::openai::OpenAiProvider;

use crate::chain::ConversationChain;
use crate::config::{Config, LlmConfig};
use crate::error::CoreError;
use crate::vault::{Credentials, Secret};

/// Build an OpenAI-compatible provider authenticated with `api_key`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn build_provider(llm: &LlmConfig, api_key: &Secret) -> Result<AnyProvider, CoreError> {
    let client = default_client(Duration::from_secs(llm.timeout_secs))?;
    let provider = OpenAiProvider::new(
        client,
        api_key.expose().to_owned(),
        llm.base_url.clone(),
        llm.model.clone(),
        llm.max_tokens,
        Some(llm.embedding_model.clone()),
    )
    .with_embed_batch_size(llm.embed_batch_size);
    Ok(AnyProvider::OpenAi(provider))
}

/// # Errors
///
/// Returns an error if the provider or splitter cannot be constructed.
pub fn build_indexer(
    config: &Config,
    credentials: &Credentials,
) -> Result<CodeIndexer<AnyProvider>, CoreError> {
    let embedder = Arc::new(build_provider(&config.llm, &credentials.api_key)?);
    Ok(CodeIndexer::new(embedder, config.index.indexer())?)
}

/// Load the project's index and assemble the conversation chain.
///
/// Embeddings use the primary key; chat completions use the chat key.
///
/// # Errors
///
/// Returns an error if the project is not initialized, the retrieval
/// settings are invalid, or the index was built with another embedding model.
pub fn build_chain(
    config: &Config,
    credentials: &Credentials,
    root: &Path,
) -> Result<ConversationChain<AnyProvider>, CoreError> {
    let retrieval = config.retrieval.validated()?;
    let embedder = Arc::new(build_provider(&config.llm, &credentials.api_key)?);
    let chat = Arc::new(build_provider(&config.llm, credentials.chat_key())?);
    let retriever = CodeRetriever::open(embedder, root, retrieval)?;
    Ok(ConversationChain::new(
        retriever,
        chat,
        config.chat.max_context_tokens,
    ))
}
