//! Error types for streamsift

/// Result type alias using streamsift's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for streamsift operations
///
/// Malformed markup in the generated text is never an error; the filter
/// recovers from it locally. Errors are reserved for misuse of the engine,
/// undecodable input, and failures loading configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `write` or `flush` was called after the terminal `flush`
    #[error("filter already flushed; no further calls are accepted")]
    AlreadyFlushed,

    /// Token ids and log probabilities must be parallel sequences
    #[error("token_ids and logprobs differ in length ({token_ids} vs {logprobs})")]
    LogprobMismatch { token_ids: usize, logprobs: usize },

    /// Input bytes are not valid UTF-8
    #[error("invalid UTF-8 in input at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// The repetition guard aborted the generation
    #[error("repetition limit reached: a {sequence_len}-token sequence repeated {limit} times")]
    RepetitionLimit { limit: usize, sequence_len: usize },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error reports caller misuse rather than bad input
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::AlreadyFlushed | Self::LogprobMismatch { .. })
    }
}
