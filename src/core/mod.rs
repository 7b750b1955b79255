//! Core configuration, errors and time handling for slicebuf.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod time;

// Re-export commonly used types
pub use config::{BufferConfig, Config, ConfigBuilder, FlushConfig, LogLevel, LoggingConfig};
pub use error::{BufferError, Result};
pub use time::{normalize_time, Timestamp};
