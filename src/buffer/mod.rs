//! Time-sliced aggregation buffer.
//!
//! The buffer absorbs metric samples, sums values that land in the same
//! (slice, key) cell and hands the changed cells to a downstream flusher:
//!
//! - [`Buffer::ingest`] / [`Buffer::push`] merge structured samples
//! - [`Buffer::feed`] reassembles line-protocol chunks per source
//! - [`Buffer::drain`] yields each changed cell once and resets the change log
//! - [`Buffer::evict`] drops slices past the retention age (cache mode)
//!
//! Every operation goes through one mutex guarding the aggregate store, the
//! change log and the per-source leftover fragments, so readers never observe
//! a half-applied merge.

pub mod cleaner;
pub mod drain;
pub mod protocol;
pub mod sample;

pub use cleaner::{EvictionReport, ScheduleHandle, Scheduler, TokioScheduler};
pub use drain::Drain;
pub use protocol::{is_valid_line, parse_line, Chunk, LinePoint};
pub use sample::{DataPoint, MetricValue, Sample};

use crate::core::{normalize_time, BufferConfig, Result, Timestamp};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// State shared by every buffer operation.
#[derive(Debug, Default)]
pub(crate) struct BufferState {
    /// slice -> key -> accumulated value
    store: BTreeMap<i64, AHashMap<String, f64>>,
    /// (slice, key) touched since the last drain, duplicates included
    new_records: Vec<(i64, String)>,
    /// source -> unterminated line awaiting the next chunk
    leftovers: AHashMap<String, String>,
}

impl BufferState {
    fn merge(&mut self, slice: i64, key: String, value: f64) {
        *self
            .store
            .entry(slice)
            .or_default()
            .entry(key.clone())
            .or_insert(0.0) += value;
        self.new_records.push((slice, key));
    }

    fn value(&self, slice: i64, key: &str) -> Option<f64> {
        self.store.get(&slice)?.get(key).copied()
    }

    fn entries(&self) -> usize {
        self.store.values().map(|cells| cells.len()).sum()
    }

    /// Remove every slice strictly older than `cutoff` along with its change
    /// records. Returns the slice count before and after.
    fn evict_older_than(&mut self, cutoff: i64) -> (usize, usize) {
        let before = self.store.len();
        self.store = self.store.split_off(&cutoff);
        self.new_records.retain(|(slice, _)| *slice >= cutoff);
        (before, self.store.len())
    }
}

/// Point-in-time view of the buffer, taken under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Number of time slices held
    pub slices: usize,
    /// Number of (slice, key) cells across all slices
    pub entries: usize,
    /// Change records awaiting a drain, duplicates included
    pub pending_records: usize,
    /// Sources holding an unterminated line
    pub leftover_sources: usize,
    /// Whether history is retained across drains
    pub cache_mode: bool,
}

/// Concurrent time-sliced metric buffer.
///
/// Share it between threads behind an `Arc`. All methods take `&self`.
#[derive(Debug)]
pub struct Buffer {
    state: Arc<Mutex<BufferState>>,
    config: BufferConfig,
}

impl Buffer {
    /// Create an empty buffer. Fails only if `config` is invalid.
    pub fn new(config: BufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(BufferState::default())),
            config,
        })
    }

    /// True when a retention age is configured.
    pub fn in_cache_mode(&self) -> bool {
        self.config.cache_mode()
    }

    /// Configuration the buffer was built with.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Merge metrics observed at `time` into its slice.
    ///
    /// Values that cannot be read as numbers contribute `0.0`. All pairs are
    /// applied under a single lock acquisition.
    pub fn ingest<I, K, V>(&self, time: impl Into<Timestamp>, metrics: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetricValue>,
    {
        let slice = self.slice_of(time.into());
        let values: Vec<(String, f64)> = metrics
            .into_iter()
            .map(|(key, value)| (key.into(), value.into().to_f64()))
            .collect();
        if values.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        for (key, value) in values {
            state.merge(slice, key, value);
        }
    }

    /// Merge a structured sample.
    pub fn push(&self, sample: Sample) {
        self.ingest(sample.time, sample.metrics);
    }

    /// Feed one raw chunk received from `source`.
    ///
    /// Complete lines are parsed and merged; an unterminated tail is kept
    /// until the next chunk from the same source. Chunks from one source must
    /// be fed in arrival order. Malformed lines and fragments that cannot be
    /// completed are dropped without error.
    pub fn feed(&self, source: &str, data: &str) {
        let mut chunk = Chunk::split(data);
        if chunk.is_empty() {
            return;
        }

        let reconciled = {
            let mut state = self.state.lock();
            let pending = state.leftovers.remove(source);
            let reconciled = chunk.reconcile(pending);
            if let Some(fragment) = &reconciled.fragment {
                state.leftovers.insert(source.to_string(), fragment.clone());
            }
            reconciled
        };

        if let Some(discarded) = reconciled.discarded {
            tracing::trace!("Discarded unfinished line from {}: {:?}", source, discarded);
        }

        let total = chunk.lines().count();
        let points = chunk.points();
        if points.len() < total {
            tracing::trace!("Dropped {} malformed lines from {}", total - points.len(), source);
        }
        if points.is_empty() {
            return;
        }

        let now = Timestamp::now();
        let merged: Vec<(i64, String, f64)> = points
            .into_iter()
            .map(|point| {
                let time = point.timestamp.map_or(now, Timestamp::from_secs);
                (self.slice_of(time), point.key, point.value)
            })
            .collect();

        let mut state = self.state.lock();
        for (slice, key, value) in merged {
            state.merge(slice, key, value);
        }
    }

    /// Drain the cells changed since the last drain.
    ///
    /// The returned iterator holds the buffer lock until it is dropped, so
    /// consume it promptly and never call back into the buffer from inside
    /// the loop.
    pub fn drain(&self) -> Drain<'_> {
        Drain::new(self.state.lock(), self.in_cache_mode())
    }

    /// Drain into a vector.
    pub fn flush(&self) -> Vec<DataPoint> {
        self.drain().collect()
    }

    /// Evict slices older than `max_age` relative to the wall clock.
    pub fn evict(&self, max_age: Duration) -> EvictionReport {
        self.evict_at(Timestamp::now(), max_age)
    }

    /// Evict slices older than `max_age` relative to `now`.
    pub fn evict_at(&self, now: Timestamp, max_age: Duration) -> EvictionReport {
        cleaner::sweep(&self.state, now, max_age)
    }

    /// Register the periodic eviction sweep with `scheduler`.
    ///
    /// Returns `Ok(None)` outside cache mode. The sweep stops when the
    /// returned handle is cancelled or dropped, and does nothing once the
    /// buffer itself is gone.
    pub fn start_cleaner(&self, scheduler: &dyn Scheduler) -> Result<Option<ScheduleHandle>> {
        let (Some(max_age), Some(interval)) =
            (self.config.cache_expiry, self.config.cleaner_interval)
        else {
            return Ok(None);
        };

        let state = Arc::downgrade(&self.state);
        let handle = scheduler.every(
            interval,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    cleaner::sweep(&state, Timestamp::now(), max_age);
                }
            }),
        )?;

        tracing::debug!(
            "Buffer cleaner scheduled every {:?}, retaining {:?} of history",
            interval,
            max_age
        );
        Ok(Some(handle))
    }

    /// Number of (slice, key) cells held.
    pub fn size(&self) -> usize {
        self.state.lock().entries()
    }

    /// True when no slice is held.
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// True when there are changes waiting to be drained.
    pub fn has_pending(&self) -> bool {
        !self.state.lock().new_records.is_empty()
    }

    /// Snapshot of buffer occupancy.
    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats {
            slices: state.store.len(),
            entries: state.entries(),
            pending_records: state.new_records.len(),
            leftover_sources: state.leftovers.len(),
            cache_mode: self.in_cache_mode(),
        }
    }

    /// Unterminated line currently held for `source`.
    pub fn leftover(&self, source: &str) -> Option<String> {
        self.state.lock().leftovers.get(source).cloned()
    }

    /// Forget the pending fragment of a source that went away.
    pub fn forget_source(&self, source: &str) -> Option<String> {
        self.state.lock().leftovers.remove(source)
    }

    fn slice_of(&self, time: Timestamp) -> i64 {
        normalize_time(time.as_secs(), self.config.slice_width_secs())
    }
}
