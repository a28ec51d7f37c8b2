//! Error types for the voice RAG agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice RAG agent
///
/// Cancelling a superseded run is not an error; it surfaces as
/// [`RunState::Cancelled`](crate::RunState::Cancelled).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Language model generation error
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech or playback error
    #[error("speech error: {0}")]
    Speech(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Reranking error
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Corpus index error
    #[error("index error: {0}")]
    Index(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
