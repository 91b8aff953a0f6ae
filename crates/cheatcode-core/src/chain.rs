//! Retrieval-augmented conversation chain.

use std::sync::Arc;

use cheatcode_index::retriever::CodeRetriever;
use cheatcode_index::store::ScoredChunk;
use cheatcode_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::prompt::{answer_messages, condense_messages, pack_context, prompt_overhead};

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Result of one chain invocation.
#[derive(Debug, Clone)]
pub struct ChainAnswer {
    pub answer: String,
    /// Query actually sent to the retriever.
    pub standalone_question: String,
    /// Chunks that were placed in the answer prompt, best match first.
    pub sources: Vec<ScoredChunk>,
}

/// Condense, retrieve, answer.
///
/// The chain holds no conversation state: callers pass the history in and
/// append the returned turn themselves. Service failures propagate without
/// retry.
pub struct ConversationChain<P: LlmProvider> {
    retriever: CodeRetriever<P>,
    llm: Arc<P>,
    max_context_tokens: usize,
}

impl<P: LlmProvider> ConversationChain<P> {
    #[must_use]
    pub fn new(retriever: CodeRetriever<P>, llm: Arc<P>, max_context_tokens: usize) -> Self {
        Self {
            retriever,
            llm,
            max_context_tokens,
        }
    }

    #[must_use]
    pub fn retriever(&self) -> &CodeRetriever<P> {
        &self.retriever
    }

    /// Rewrite `question` into a standalone query using `history`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat request fails.
    pub async fn condense(&self, question: &str, history: &[Turn]) -> Result<String, CoreError> {
        if history.is_empty() {
            return Ok(question.to_owned());
        }
        let condensed = self.llm.chat(&condense_messages(history, question)).await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            tracing::warn!("condensation returned nothing, using the original question");
            return Ok(question.to_owned());
        }
        tracing::debug!(standalone = condensed, "question condensed");
        Ok(condensed.to_owned())
    }

    /// Answer `question` in the context of `history`.
    ///
    /// The answer request, context included, is kept within
    /// `max_context_tokens` estimated tokens.
    ///
    /// # Errors
    ///
    /// Returns `PromptTooLarge` if the question alone does not fit, or an
    /// error if embedding, retrieval or either chat request fails.
    pub async fn ask(&self, question: &str, history: &[Turn]) -> Result<ChainAnswer, CoreError> {
        let overhead = prompt_overhead(question);
        if overhead > self.max_context_tokens {
            return Err(CoreError::PromptTooLarge {
                estimated: overhead,
                limit: self.max_context_tokens,
            });
        }

        let standalone_question = self.condense(question, history).await?;

        let retrieved = self.retriever.retrieve(&standalone_question).await?;
        let retrieved_count = retrieved.len();
        let sources = pack_context(retrieved, question, self.max_context_tokens);
        if sources.len() < retrieved_count {
            tracing::debug!(
                kept = sources.len(),
                dropped = retrieved_count - sources.len(),
                "context trimmed to token ceiling"
            );
        }

        let answer = self.llm.chat(&answer_messages(&sources, question)).await?;
        tracing::info!(sources = sources.len(), "answer generated");

        Ok(ChainAnswer {
            answer,
            standalone_question,
            sources,
        })
    }
}
