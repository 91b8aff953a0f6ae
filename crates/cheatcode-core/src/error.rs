use cheatcode_index::IndexError;
use cheatcode_llm::LlmError;

use crate::session::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("environment variable {0} is not set")]
    CredentialMissing(&'static str),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("question needs about {estimated} tokens, above the {limit} token ceiling")]
    PromptTooLarge { estimated: usize, limit: usize },
}

impl CoreError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_transient(),
            Self::Index(e) => e.is_transient(),
            Self::CredentialMissing(_) | Self::SessionNotFound(_) | Self::PromptTooLarge { .. } => {
                false
            }
        }
    }
}
