//! Command-line interface for slicebuf.
//!
//! Reads line-protocol text from stdin, buffers it and prints the aggregated
//! points to stdout on every flush interval.

use crate::buffer::{Buffer, DataPoint, TokioScheduler};
use crate::core::{BufferError, Config, ConfigBuilder, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Source id used for everything read from stdin
const STDIN_SOURCE: &str = "stdin";

/// Read buffer size for stdin chunks
const READ_CHUNK: usize = 8 * 1024;

/// Time-sliced metric buffer fed from stdin
#[derive(Parser, Debug)]
#[command(name = "slicebuf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "SLICEBUF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Slice width, e.g. `60s`
    #[arg(long, env = "SLICEBUF_SLICE_WIDTH", value_parser = parse_duration)]
    pub slice_width: Option<Duration>,

    /// Retain history for this long and evict in the background, e.g. `1h`
    #[arg(long, env = "SLICEBUF_CACHE_EXPIRY", value_parser = parse_duration)]
    pub cache_expiry: Option<Duration>,

    /// Eviction sweep interval in cache mode, e.g. `5m`
    #[arg(long, env = "SLICEBUF_CLEANER_INTERVAL", value_parser = parse_duration)]
    pub cleaner_interval: Option<Duration>,

    /// How often to drain to stdout, e.g. `10s`
    #[arg(long, env = "SLICEBUF_FLUSH_INTERVAL", value_parser = parse_duration)]
    pub flush_interval: Option<Duration>,

    /// Enable debug logging
    #[arg(short, long, env = "SLICEBUF_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        if let Some(path) = &self.config {
            builder = builder.from_file(path)?;
        }

        self.apply_overrides(builder).build()
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(width) = self.slice_width {
            builder = builder.slice_width(width);
        }
        if let Some(expiry) = self.cache_expiry {
            builder = builder.cache_expiry(expiry);
        }
        if let Some(interval) = self.cleaner_interval {
            builder = builder.cleaner_interval(interval);
        }
        if let Some(interval) = self.flush_interval {
            builder = builder.flush_interval(interval);
        }
        builder.debug(self.debug)
    }
}

/// Initialize logging on stderr; stdout carries data points.
pub fn init_logging(config: &Config) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_log_level = std::env::var("SLICEBUF_LOG_LEVEL")
        .unwrap_or_else(|_| config.log_level().as_str().to_string());
    let log_level = if config.debug {
        "debug"
    } else {
        env_log_level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let structured = config.logging.structured;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(structured)
        .with_thread_ids(structured)
        .with_line_number(structured)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| BufferError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Execute the slicebuf application.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    init_logging(&config)?;

    if let Some(path) = &cli.config {
        tracing::info!("Loaded configuration from: {:?}", path);
    }

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Slice width: {:?}", config.buffer.slice_width);
        match config.buffer.cache_expiry {
            Some(expiry) => println!("  Cache mode: retain {:?}", expiry),
            None => println!("  Cache mode: off"),
        }
        println!("  Flush interval: {:?}", config.flush.interval);
        return Ok(());
    }

    run(config).await
}

/// Pump stdin into the buffer until EOF or Ctrl-C, draining periodically.
async fn run(config: Config) -> Result<()> {
    let buffer = Buffer::new(config.buffer.clone())?;
    let scheduler = TokioScheduler::current()?;
    let cleaner = buffer.start_cleaner(&scheduler)?;

    tracing::info!(
        "Buffering stdin with {:?} slices, flushing every {:?}",
        config.buffer.slice_width,
        config.flush.interval
    );

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut chunk = vec![0u8; READ_CHUNK];
    let period = config.flush.interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            read = stdin.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    tracing::debug!("stdin closed");
                    break;
                }
                buffer.feed(STDIN_SOURCE, &String::from_utf8_lossy(&chunk[..n]));
            }
            _ = ticker.tick() => {
                write_points(&mut stdout, &buffer.flush()).await?;
            }
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal, stopping...");
                break;
            }
        }
    }

    if let Some(cleaner) = cleaner {
        cleaner.cancel();
    }

    // Whatever is still unterminated on stdin can never complete now
    if let Some(fragment) = buffer.forget_source(STDIN_SOURCE) {
        tracing::debug!("Dropping unterminated input: {:?}", fragment);
    }

    write_points(&mut stdout, &buffer.flush()).await?;
    stdout.flush().await?;
    Ok(())
}

async fn write_points<W>(out: &mut W, points: &[DataPoint]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if points.is_empty() {
        return Ok(());
    }
    tracing::debug!("Flushing {} points", points.len());
    out.write_all(render(points).as_bytes()).await?;
    Ok(())
}

/// Render points in plaintext wire form, one per line.
pub fn render(points: &[DataPoint]) -> String {
    let mut out = String::new();
    for point in points {
        out.push_str(&point.to_string());
        out.push('\n');
    }
    out
}
