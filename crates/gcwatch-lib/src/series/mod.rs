//! Expiring time series
//!
//! Holds samples ordered newest first and prunes them with an [`Expiry`]
//! policy. The series is shared between the event delivery path (inserts)
//! and the detection path (snapshots), so every mutation happens under one
//! lock and readers only ever see fully committed state.

mod expiry;


pub use expiry::{Expiry, ExpiryParams};

use crate::models::Sample;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Immutable, newest-first view of a series
pub type Snapshot<T> = Arc<Vec<Sample<T>>>;

/// Samples ordered by timestamp, newest first
///
/// Same-timestamp samples keep their arrival order.
pub struct TimeSeries<T> {
    // Copy-on-write: snapshots hold their own Arc, mutations swap in a new one
    samples: Mutex<Snapshot<T>>,
}

impl<T: Clone> TimeSeries<T> {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Arc::new(Vec::new())),
        }
    }

    /// Insert a sample, keeping the newest-first order
    ///
    /// The sample lands after every existing sample with an equal or newer
    /// timestamp.
    pub fn insert(&self, sample: Sample<T>) {
        let mut guard = self.lock();
        insert_sorted(Arc::make_mut(&mut guard), sample);
    }

    /// Insert a sample and run an eviction pass under a single lock
    ///
    /// Readers never observe the series holding the new sample before the
    /// policy has been applied. Returns the number of removed samples.
    pub fn insert_and_evict(&self, sample: Sample<T>, expiry: &Expiry) -> usize {
        self.insert_and_evict_at(sample, expiry, Utc::now())
    }

    pub fn insert_and_evict_at(
        &self,
        sample: Sample<T>,
        expiry: &Expiry,
        now: DateTime<Utc>,
    ) -> usize {
        let mut guard = self.lock();
        insert_sorted(Arc::make_mut(&mut guard), sample);
        evict_locked(&mut guard, expiry, now)
    }

    /// Remove every sample the policy marks as expired, using the wall clock
    ///
    /// Returns the number of removed samples.
    pub fn evict(&self, expiry: &Expiry) -> usize {
        self.evict_at(expiry, Utc::now())
    }

    /// Remove every sample the policy marks as expired at instant `now`
    ///
    /// Every sample is judged against the series as it stood before this
    /// pass started.
    pub fn evict_at(&self, expiry: &Expiry, now: DateTime<Utc>) -> usize {
        let mut guard = self.lock();
        evict_locked(&mut guard, expiry, now)
    }

    /// Current committed content, newest first
    pub fn snapshot(&self) -> Snapshot<T> {
        Arc::clone(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot<T>> {
        // Mutations never leave the vector half-written, so a poisoned lock is still usable
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_sorted<T>(samples: &mut Vec<Sample<T>>, sample: Sample<T>) {
    let position = samples.partition_point(|s| s.timestamp() >= sample.timestamp());
    samples.insert(position, sample);
}

fn evict_locked<T: Clone>(
    samples: &mut Snapshot<T>,
    expiry: &Expiry,
    now: DateTime<Utc>,
) -> usize {
    let frozen = Arc::clone(samples);

    let retained: Vec<Sample<T>> = frozen
        .iter()
        .enumerate()
        .filter(|(position, sample)| {
            !expiry.is_expired(&ExpiryParams::new(sample, *position, &frozen, now))
        })
        .map(|(_, sample)| sample.clone())
        .collect();

    let evicted = frozen.len() - retained.len();
    if evicted > 0 {
        *samples = Arc::new(retained);
    }

    evicted
}
