//! Sliding-window admission control for outbound provider calls.
//!
//! The limiter keeps the instants of recently admitted requests and allows
//! at most `capacity` of them inside any trailing `window`. It is shared
//! process-wide through an `Arc`; all access to the timestamp queue goes
//! through one mutex and no lock is ever held across an `.await`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::RateLimitExceeded;

#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether one more request would be admitted right now. Prunes expired
    /// entries but does not record anything.
    pub fn can_make_request(&self) -> bool {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, Instant::now());
        timestamps.len() < self.capacity
    }

    /// Record a request at the current instant. Callers composing this with
    /// [`can_make_request`](Self::can_make_request) own the race between the
    /// two; prefer [`try_acquire`](Self::try_acquire).
    pub fn record_request(&self) {
        self.lock().push_back(Instant::now());
    }

    /// Check and record in one critical section.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        self.try_acquire_many(1)
    }

    /// Admit `n` requests at once or none of them.
    pub fn try_acquire_many(&self, n: usize) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);

        if n > self.capacity {
            // Can never fit; the best hint is a full window.
            return Err(RateLimitExceeded {
                retry_after: self.window,
            });
        }

        if timestamps.len() + n > self.capacity {
            let retry_after = self.until_reset(&timestamps, now);
            debug!(
                in_window = timestamps.len(),
                requested = n,
                capacity = self.capacity,
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit reached"
            );
            return Err(RateLimitExceeded { retry_after });
        }

        timestamps.extend(std::iter::repeat(now).take(n));
        Ok(())
    }

    /// Time until the oldest recorded request leaves the window. Zero when
    /// nothing is recorded. Does not prune, so the value only ever shrinks
    /// while no new requests are recorded.
    pub fn time_until_reset(&self) -> Duration {
        let timestamps = self.lock();
        self.until_reset(&timestamps, Instant::now())
    }

    /// Number of requests inside the window, after pruning.
    pub fn current_count(&self) -> usize {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn until_reset(&self, timestamps: &VecDeque<Instant>, now: Instant) -> Duration {
        match timestamps.front() {
            Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
            None => Duration::ZERO,
        }
    }

    // Timestamps are pushed in order, so expired ones are always at the front.
    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // A panic while holding the lock cannot leave the queue half-updated.
        self.timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
