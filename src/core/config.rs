//! Configuration management for slicebuf.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Humantime durations (`60s`, `1h`, `5m`)
//! - CLI argument overrides via [`ConfigBuilder`]
//! - Validation and defaults

use crate::core::{BufferError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for slicebuf
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation buffer configuration
    pub buffer: BufferConfig,
    /// Drain cadence used by the CLI
    pub flush: FlushConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Aggregation buffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Width of a time slice; timestamps are rounded down to a multiple of it
    #[serde(with = "humantime_serde")]
    pub slice_width: Duration,
    /// Retention age. Setting it switches the buffer into cache mode
    #[serde(with = "humantime_serde")]
    pub cache_expiry: Option<Duration>,
    /// How often the eviction sweep runs in cache mode
    #[serde(with = "humantime_serde")]
    pub cleaner_interval: Option<Duration>,
}

/// Flush configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Interval between drains
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-fragment and per-line parser detail
    Trace,
    /// Eviction sweeps and flush sizes
    Debug,
    /// Startup and shutdown
    Info,
    /// Warnings only
    Warn,
    /// Errors only
    Error,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            slice_width: Duration::from_secs(60),
            cache_expiry: None,
            cleaner_interval: None,
        }
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        FlushConfig {
            interval: Duration::from_secs(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl BufferConfig {
    /// True when a retention age is configured.
    pub fn cache_mode(&self) -> bool {
        self.cache_expiry.is_some()
    }

    /// Slice width in whole seconds.
    pub fn slice_width_secs(&self) -> u64 {
        self.slice_width.as_secs()
    }

    /// Validate the buffer section on its own
    pub fn validate(&self) -> Result<()> {
        if self.slice_width < Duration::from_secs(1) {
            return Err(BufferError::config(format!(
                "slice_width must be at least 1s, got {:?}",
                self.slice_width
            )));
        }

        if self.slice_width.subsec_nanos() != 0 {
            return Err(BufferError::config(format!(
                "slice_width must be a whole number of seconds, got {:?}",
                self.slice_width
            )));
        }

        if let Some(expiry) = self.cache_expiry {
            if expiry < Duration::from_secs(1) {
                return Err(BufferError::config(format!(
                    "cache_expiry must be at least 1s, got {:?}",
                    expiry
                )));
            }

            match self.cleaner_interval {
                None => {
                    return Err(BufferError::config(
                        "cleaner_interval is required when cache_expiry is set",
                    ));
                },
                Some(interval) if interval.is_zero() => {
                    return Err(BufferError::config("cleaner_interval must be greater than 0"));
                },
                Some(_) => {},
            }
        }

        Ok(())
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigBuilder::new().from_file(path)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.buffer.validate()?;

        if self.flush.interval.is_zero() {
            return Err(BufferError::config("flush interval must be greater than 0"));
        }

        Ok(())
    }

    /// Effective log level, honouring debug mode
    pub fn log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.logging.level
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
/// Builder applying overrides on top of defaults or a YAML document
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        let debug = self.config.debug;
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| BufferError::parse(format!("Failed to parse YAML config: {}", e)))?;
        self.config.debug = debug;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BufferError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        self.from_yaml(&content)
    }

    /// Set slice width
    pub fn slice_width(mut self, width: Duration) -> Self {
        self.config.buffer.slice_width = width;
        self
    }

    /// Enable cache mode with the given retention age
    pub fn cache_expiry(mut self, expiry: Duration) -> Self {
        self.config.buffer.cache_expiry = Some(expiry);
        self
    }

    /// Set eviction sweep interval
    pub fn cleaner_interval(mut self, interval: Duration) -> Self {
        self.config.buffer.cleaner_interval = Some(interval);
        self
    }

    /// Set drain interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush.interval = interval;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
