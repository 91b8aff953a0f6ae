//! Test-only mock LLM provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::LlmError;
use crate::provider::{LlmProvider, Message};

/// Scripted chat replies plus deterministic bag-of-words embeddings.
///
/// Every chat request and embedded text is recorded so tests can assert on
/// what the pipeline sent upstream.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    chat_log: Arc<Mutex<Vec<Vec<Message>>>>,
    embed_log: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub dimension: usize,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            chat_log: Arc::new(Mutex::new(Vec::new())),
            embed_log: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            dimension: 64,
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fail_chat(mut self) -> Self {
        self.fail_chat = true;
        self
    }

    #[must_use]
    pub fn with_fail_embed(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    #[must_use]
    pub fn without_embeddings(mut self) -> Self {
        self.supports_embeddings = false;
        self
    }

    /// Queue another chat reply.
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push(response.into());
    }

    /// All chat requests received so far, oldest first.
    #[must_use]
    pub fn chat_requests(&self) -> Vec<Vec<Message>> {
        self.chat_log.lock().unwrap().clone()
    }

    /// All texts embedded so far, oldest first.
    #[must_use]
    pub fn embedded_texts(&self) -> Vec<String> {
        self.embed_log.lock().unwrap().clone()
    }

    /// Hash each lowercase word into one of `dimension` buckets.
    ///
    /// Texts sharing words get a positive cosine similarity, which is enough
    /// to make retrieval ordering predictable in tests.
    #[must_use]
    pub fn embedding_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.chat_log.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.fail_embed {
            return Err(LlmError::RateLimited);
        }
        self.embed_log.lock().unwrap().push(text.to_owned());
        Ok(self.embedding_for(text))
    }

    fn embedding_model(&self) -> Option<&str> {
        self.supports_embeddings.then_some("mock-embedding")
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_then_default() {
        let p = MockProvider::with_responses(vec!["one".into()]);
        assert_eq!(p.chat(&[Message::user("a")]).await.unwrap(), "one");
        assert_eq!(p.chat(&[Message::user("b")]).await.unwrap(), "mock response");
        assert_eq!(p.chat_requests().len(), 2);
        assert_eq!(p.chat_requests()[1][0].content, "b");
    }

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let p = MockProvider::default();
        let a = p.embed("def add(a, b)").await.unwrap();
        let b = p.embed("def add(a, b)").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(p.embedded_texts().len(), 2);
    }

    #[tokio::test]
    async fn failing_provider_errors() {
        let p = MockProvider::failing();
        assert!(p.chat(&[Message::user("a")]).await.is_err());
        assert!(p.embed("a").await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn builders_toggle_failures_independently() {
        let chat_down = MockProvider::default().with_fail_chat();
        assert!(chat_down.chat(&[Message::user("a")]).await.is_err());
        assert!(chat_down.embed("a").await.is_ok());

        let embed_down = MockProvider::default().with_fail_embed();
        assert!(embed_down.chat(&[Message::user("a")]).await.is_ok());
        assert!(embed_down.embed("a").await.unwrap_err().is_transient());

        let no_embed = MockProvider::default().without_embeddings();
        assert_eq!(no_embed.embedding_model(), None);
        assert!(matches!(
            no_embed.embed("a").await,
            Err(LlmError::EmbedUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let p = MockProvider::default();
        let texts = vec!["alpha".to_owned(), "beta".to_owned()];
        let vectors = p.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], p.embedding_for("alpha"));
        assert_eq!(vectors[1], p.embedding_for("beta"));
    }
}
