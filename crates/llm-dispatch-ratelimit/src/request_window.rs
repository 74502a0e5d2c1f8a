//! Request-count limiter over a rolling window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Floor on retry sleeps so two waiters racing for the same slot never spin.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Counts admissions within a rolling time window.
///
/// Stores the timestamp of each admission and evicts entries as they age
/// past the window. Admissions are not reversible: release and adjust are
/// no-ops, a slot is simply occupied until it ages out.
#[derive(Debug)]
pub struct RequestWindow {
    limit: u64,
    window: Duration,
    log: Mutex<VecDeque<Instant>>,
}

impl RequestWindow {
    /// Creates a window admitting at most `limit` requests per `window`.
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            log: Mutex::new(VecDeque::new()),
        }
    }

    /// Waits until a slot is free, then records the admission.
    pub async fn acquire(&self) {
        loop {
            match self.try_admit() {
                Ok(()) => return,
                Err(wait) => sleep(wait.max(MIN_SLEEP)).await,
            }
        }
    }

    /// Records an admission if a slot is free right now.
    ///
    /// On success returns `Ok(())`; otherwise returns how long until the
    /// oldest admission ages out.
    pub fn try_admit(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut log = self.log.lock().unwrap();
        evict(&mut log, now, self.window);

        if (log.len() as u64) < self.limit {
            log.push_back(now);
            return Ok(());
        }

        // Full: the next slot opens when the oldest admission expires.
        let wait = log
            .front()
            .map(|&oldest| {
                oldest
                    .checked_add(self.window)
                    .map(|expiry| expiry.saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            })
            .unwrap_or(Duration::ZERO);
        Err(wait)
    }

    /// Returns true if an admission would succeed right now, without
    /// recording it.
    pub fn would_admit(&self) -> bool {
        self.usage() < self.limit
    }

    /// Number of admissions currently inside the window.
    pub fn usage(&self) -> u64 {
        let now = Instant::now();
        let mut log = self.log.lock().unwrap();
        evict(&mut log, now, self.window);
        log.len() as u64
    }

    /// Remaining admissions before the window is full.
    pub fn capacity(&self) -> u64 {
        self.limit.saturating_sub(self.usage())
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

fn evict(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&timestamp) = log.front() {
        if now.duration_since(timestamp) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}
