//! Error types for slicebuf.

use thiserror::Error;

/// Errors surfaced by slicebuf. Ingestion itself never fails; these cover
/// configuration, startup and I/O at the edges.
#[derive(Error, Debug)]
pub enum BufferError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed configuration document
    #[error("Parse error: {message}")]
    Parse {
        /// What failed to parse
        message: String,
    },

    /// Missing or unusable async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Reading input or writing output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for slicebuf operations
pub type Result<T> = std::result::Result<T, BufferError>;

impl BufferError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Creates a new runtime error
    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        Self::Runtime(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Parse { .. } => "serialization",
            Self::Runtime(_) => "async",
            Self::Io(_) => "io",
        }
    }
}
