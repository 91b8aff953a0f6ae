use std::fmt;

use crate::error::CoreError;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_API_KEY_GPT4: &str = "OPENAI_API_KEY_GPT4";

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// API keys for the model service.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Used for embeddings, and for chat unless `chat_api_key` is set.
    pub api_key: Secret,
    pub chat_api_key: Option<Secret>,
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `CredentialMissing` if `OPENAI_API_KEY` is unset or empty.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns `CredentialMissing` if the primary key is absent or empty.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let api_key = non_empty(OPENAI_API_KEY)
            .map(Secret::new)
            .ok_or(CoreError::CredentialMissing(OPENAI_API_KEY))?;
        Ok(Self {
            api_key,
            chat_api_key: non_empty(OPENAI_API_KEY_GPT4).map(Secret::new),
        })
    }

    /// Key used for chat completions.
    #[must_use]
    pub fn chat_key(&self) -> &Secret {
        self.chat_api_key.as_ref().unwrap_or(&self.api_key)
    }
}
