//! Error types for the parallel-dl library.

use thiserror::Error;

/// Errors that can occur while scheduling and running downloads.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or malformed batch request.
    ///
    /// Raised before any task starts; aborts the whole batch.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The byte source could not be opened or dropped mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The delivery sink rejected the assembled artifact.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Returns true for failures of the remote byte source.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }
}

/// A specialized `Result` type for parallel-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
