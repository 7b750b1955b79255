//! Slicebuf - in-process time-sliced metric buffer.
//!
//! Slicebuf sits between a metrics ingestion layer and whatever ships points
//! downstream. It absorbs bursts, sums values that land in the same time
//! slice and hands each changed point to the flusher exactly once per drain.
//!
//! # Features
//!
//! - **Line protocol**: `<key> <value> <timestamp>\n` streams, reassembled
//!   across arbitrary chunk boundaries per source
//! - **Slice aggregation**: timestamps rounded down to a configurable width
//! - **Cache mode**: optional retention window with periodic age-based eviction
//! - **Permissive**: malformed input is dropped or zeroed, never raised
//!
//! # Architecture
//!
//! - `buffer`: aggregate store, stream parser, drain and eviction
//! - `core`: configuration, errors and time normalization
//! - `cli`: command-line front end reading stdin
//!
//! # Example
//!
//! ```no_run
//! use slicebuf_lib::buffer::Buffer;
//! use slicebuf_lib::core::BufferConfig;
//!
//! let buffer = Buffer::new(BufferConfig::default())?;
//! buffer.feed("conn-1", "web.requests 3 1700000000\nweb.req");
//! buffer.feed("conn-1", "uests 2 1700000000\n");
//!
//! for point in buffer.drain() {
//!     println!("{point}");
//! }
//! # Ok::<(), slicebuf_lib::core::BufferError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod cli;
pub mod core;

// Re-export core types for convenience
pub use crate::buffer::{Buffer, BufferStats, DataPoint, Sample};
pub use crate::core::{Config, Result};
