//! Lazy drain over the cells changed since the previous drain.

use crate::buffer::{BufferState, DataPoint};
use ahash::AHashSet;
use parking_lot::MutexGuard;
use std::vec;

/// Iterator returned by [`Buffer::drain`](crate::buffer::Buffer::drain).
///
/// Yields every changed (slice, key) cell once, in order of first change,
/// with its current accumulated value. The buffer stays locked for the
/// lifetime of the iterator.
///
/// When the iterator is dropped after being exhausted the change log is empty
/// and, outside cache mode, the whole store is cleared. Dropping it early puts
/// the unvisited cells back into the change log and leaves the store intact,
/// so nothing is lost by an interrupted flush.
pub struct Drain<'a> {
    state: MutexGuard<'a, BufferState>,
    records: vec::IntoIter<(i64, String)>,
    cache_mode: bool,
}

impl<'a> Drain<'a> {
    pub(crate) fn new(mut state: MutexGuard<'a, BufferState>, cache_mode: bool) -> Self {
        let records = unique_records(std::mem::take(&mut state.new_records));
        Self {
            state,
            records: records.into_iter(),
            cache_mode,
        }
    }
}

/// Stable de-duplication keeping the first occurrence of each cell.
fn unique_records(records: Vec<(i64, String)>) -> Vec<(i64, String)> {
    let mut seen = AHashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|(slice, key)| seen.insert((*slice, key.clone())))
        .collect()
}

impl Iterator for Drain<'_> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<Self::Item> {
        for (slice, key) in self.records.by_ref() {
            if let Some(value) = self.state.value(slice, &key) {
                return Some(DataPoint { key, value, slice });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.records.len()))
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        let unvisited: Vec<(i64, String)> = self.records.by_ref().collect();
        if unvisited.is_empty() {
            if !self.cache_mode {
                self.state.store.clear();
            }
        } else {
            self.state.new_records = unvisited;
        }
    }
}
