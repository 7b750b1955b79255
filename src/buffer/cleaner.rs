//! Age-based eviction and the scheduler it runs on.

use crate::buffer::BufferState;
use crate::core::{BufferError, Result, Timestamp};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionReport {
    /// Slices starting before this were removed
    pub cutoff: i64,
    /// Slices held before the sweep
    pub slices_before: usize,
    /// Slices held after the sweep
    pub slices_after: usize,
}

impl EvictionReport {
    /// Number of slices removed.
    pub fn evicted(&self) -> usize {
        self.slices_before - self.slices_after
    }
}

/// Remove slices older than `now - max_age`.
///
/// Sizes are captured under the lock; logging happens after it is released.
pub(crate) fn sweep(state: &Mutex<BufferState>, now: Timestamp, max_age: Duration) -> EvictionReport {
    let age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    let cutoff = now.as_secs().saturating_sub(age);

    let (slices_before, slices_after) = state.lock().evict_older_than(cutoff);

    tracing::debug!(
        "Evicting slices older than {}s ({} slices before sweep)",
        age,
        slices_before
    );
    tracing::debug!("Eviction finished: {} slices remain", slices_after);

    EvictionReport {
        cutoff,
        slices_before,
        slices_after,
    }
}

/// Runs a task on a fixed period until the returned handle goes away.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, first one period after registration.
    fn every(&self, period: Duration, task: Box<dyn FnMut() + Send + 'static>) -> Result<ScheduleHandle>;
}

/// Subscription to a [`Scheduler`]. Cancelling or dropping it stops the task.
pub struct ScheduleHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ScheduleHandle {
    /// Wrap the action that ends the subscription.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the scheduled task.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
            tracing::debug!("Scheduled task cancelled");
        }
    }
}

impl std::fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`Scheduler`] backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule on the runtime this call is made from.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| BufferError::runtime(format!("No tokio runtime for scheduler: {}", e)))
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: Box<dyn FnMut() + Send + 'static>) -> Result<ScheduleHandle> {
        if period.is_zero() {
            return Err(BufferError::config("schedule period must be greater than 0"));
        }

        let join = self.handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });

        Ok(ScheduleHandle::new(move || join.abort()))
    }
}
