// Per-subscription sample window shared by the producer and the sender.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::models::Snapshot;

/// Samples to retain for an averaging window sampled every `period`.
///
/// `averaging / period` rounded down, never less than one, so an averaging
/// window shorter than the period still averages the latest sample.
pub fn window_capacity(period: Duration, averaging: Duration) -> usize {
    let period_ms = period.as_millis().max(1);
    let ratio = averaging.as_millis() / period_ms;
    usize::try_from(ratio).unwrap_or(usize::MAX).max(1)
}

/// Bounded, oldest-first window of snapshots.
///
/// The lock is held only to append or to copy out the `Arc`s, never while
/// sampling or aggregating.
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<Arc<Snapshot>>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn for_window(period: Duration, averaging: Duration) -> Self {
        Self::new(window_capacity(period, averaging))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a snapshot, evicting the oldest while over capacity.
    pub fn push(&self, snapshot: Snapshot) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.push_back(Arc::new(snapshot));
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Current window, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Snapshot>> {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.iter().cloned().collect()
    }
}
