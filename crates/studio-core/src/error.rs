use thiserror::Error;

/// Top-level error type for the studio client.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection dropped: {0}")]
    Disconnected(String),

    #[error("no frame received for {secs}s")]
    IdleTimeout { secs: u64 },

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),
}

impl StudioError {
    /// Whether the failure happened at the transport level rather than
    /// being reported by the backend.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            StudioError::Http(_)
                | StudioError::Stream(StreamError::Disconnected(_))
                | StudioError::Stream(StreamError::IdleTimeout { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
