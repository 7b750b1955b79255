//! Common test utilities and fixtures.

#![allow(dead_code)]

use slicebuf_lib::buffer::Buffer;
use slicebuf_lib::core::BufferConfig;
use std::time::Duration;

/// Buffer with one-second slices and no retention.
pub fn unit_buffer() -> Buffer {
    Buffer::new(BufferConfig {
        slice_width: Duration::from_secs(1),
        ..BufferConfig::default()
    })
    .unwrap()
}

/// Buffer with one-second slices retaining `expiry` of history.
pub fn cache_buffer(expiry: Duration, cleaner_interval: Duration) -> Buffer {
    Buffer::new(BufferConfig {
        slice_width: Duration::from_secs(1),
        cache_expiry: Some(expiry),
        cleaner_interval: Some(cleaner_interval),
    })
    .unwrap()
}

/// Render `(key, value, timestamp)` triples as newline-terminated protocol text.
pub fn protocol_lines(points: &[(&str, u64, i64)]) -> String {
    points
        .iter()
        .map(|(key, value, ts)| format!("{} {} {}\n", key, value, ts))
        .collect()
}

/// Split `text` into chunks of at most `size` bytes. Input must be ASCII.
pub fn chunked(text: &str, size: usize) -> Vec<&str> {
    text.as_bytes()
        .chunks(size)
        .map(|bytes| std::str::from_utf8(bytes).unwrap())
        .collect()
}
