//! Text generation error types.

use std::sync::Arc;

/// Errors from a text generation backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    /// No API key configured.
    #[error("LLM_ERROR: missing API key")]
    MissingApiKey,

    /// The backend rejected the credentials.
    #[error("LLM_ERROR: authentication failed")]
    Auth,

    #[error("LLM_ERROR: rate limited")]
    RateLimited,

    #[error("LLM_ERROR: HTTP {status}")]
    Http { status: u16 },

    #[error("LLM_ERROR: request timeout")]
    Timeout,

    #[error("LLM_ERROR: network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// The response body was not the expected shape.
    #[error("LLM_ERROR: parse error: {0}")]
    Parse(String),

    /// The response carried no generated text.
    #[error("LLM_ERROR: empty completion")]
    Empty,
}

impl From<reqwest::Error> for GenerateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { GenerateError::Timeout } else { GenerateError::Network(Arc::new(err)) }
    }
}
