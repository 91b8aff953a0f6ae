#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("provider unavailable (status {status})")]
    Unavailable { status: u16 },

    #[error("credential rejected by provider")]
    Unauthorized,

    #[error("API request failed (status {status})")]
    Api { status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Rate limits, server-side failures, timeouts and connection errors are
    /// transient. Rejected credentials, malformed responses and client errors
    /// are fatal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited | Self::Unavailable { .. } => true,
            Self::Json(_)
            | Self::Unauthorized
            | Self::Api { .. }
            | Self::EmptyResponse { .. }
            | Self::EmbedUnsupported { .. }
            | Self::Other(_) => false,
        }
    }

    /// Map a non-success HTTP status to an error variant.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Self::Unauthorized
        } else if status.is_server_error() {
            Self::Unavailable {
                status: status.as_u16(),
            }
        } else {
            Self::Api {
                status: status.as_u16(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
