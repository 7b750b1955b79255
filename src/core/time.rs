//! Epoch-second timestamps and slice normalization.

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in time expressed as whole seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wrap raw epoch seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Epoch seconds.
    pub const fn as_secs(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time.timestamp())
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(i64::try_from(after.as_secs()).unwrap_or(i64::MAX)),
            // Pre-epoch times round toward negative infinity like chrono does
            Err(before) => {
                let before = before.duration();
                let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
                let extra = i64::from(before.subsec_nanos() > 0);
                Self(-secs - extra)
            },
        }
    }
}

/// Round `epoch_secs` down to the start of its slice.
///
/// A width of zero disables slicing and returns the input unchanged.
pub fn normalize_time(epoch_secs: i64, slice_width_secs: u64) -> i64 {
    let width = i64::try_from(slice_width_secs).unwrap_or(i64::MAX);
    if width == 0 {
        return epoch_secs;
    }
    let rem = epoch_secs.rem_euclid(width);
    // Near i64::MIN the enclosing slice starts below the representable range;
    // fall back to the first slice start that fits.
    epoch_secs
        .checked_sub(rem)
        .unwrap_or_else(|| epoch_secs + (width - rem))
}
