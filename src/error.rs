//! Error types for the Loa gateway

use std::time::Duration;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio container or payload error
    #[error("audio error: {0}")]
    Audio(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Weather collaborator error
    #[error("weather error: {0}")]
    Weather(String),

    /// Conversational model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Lunar calendar collaborator error
    #[error("lunar calendar error: {0}")]
    Lunar(String),

    /// Static audio asset missing or unreadable
    #[error("asset error: {0}")]
    Asset(String),

    /// Collaborator call exceeded its time budget
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    /// Client transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Run a collaborator call under a time budget
///
/// Expiry is reported as [`Error::Timeout`] tagged with `what`; there is no retry.
///
/// # Errors
///
/// Returns the call's own error, or [`Error::Timeout`] if the budget expires
pub async fn with_timeout<T, F>(what: &'static str, budget: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| Error::Timeout(what, budget))?
}
