//! Token-cost limiter over a rolling window.

use crate::config::LimiterKind;
use llm_dispatch_core::{DispatchError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::sleep;

/// Floor on retry sleeps so waiters racing for freed capacity never spin.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Which part of a request's token budget this limiter counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDimension {
    /// Input plus output tokens.
    Total,
    /// Input tokens only.
    Input,
    /// Output tokens only.
    Output,
}

impl TokenDimension {
    /// Projects `(input, output)` token counts onto this dimension.
    pub fn cost(&self, input: u64, output: u64) -> u64 {
        match self {
            TokenDimension::Total => input.saturating_add(output),
            TokenDimension::Input => input,
            TokenDimension::Output => output,
        }
    }

    /// The dimension a token limiter kind counts, or `None` for non-token
    /// kinds.
    pub fn for_kind(kind: LimiterKind) -> Option<Self> {
        match kind {
            LimiterKind::Tpm | LimiterKind::Tpd => Some(TokenDimension::Total),
            LimiterKind::Itpm => Some(TokenDimension::Input),
            LimiterKind::Otpm => Some(TokenDimension::Output),
            LimiterKind::Rpm | LimiterKind::Rpd | LimiterKind::Concurrent => None,
        }
    }
}

#[derive(Debug)]
struct Reservation {
    admitted_at: Instant,
    request_id: String,
    cost: u64,
}

/// Sums token cost within a rolling window.
///
/// Each admission records a `(timestamp, request id, cost)` reservation. The
/// cost starts as the submitter's estimate and can be rewritten to the
/// actual count once processing finishes ([`TokenWindow::adjust`]). A
/// reservation keeps counting against the window until it ages out, whether
/// or not the request is still in flight; only an abandoned admission is
/// removed outright ([`TokenWindow::revoke`]).
#[derive(Debug)]
pub struct TokenWindow {
    kind: LimiterKind,
    dimension: TokenDimension,
    limit: u64,
    window: Duration,
    reservations: Mutex<VecDeque<Reservation>>,
    /// Wakes waiters when an adjust or revoke frees capacity before the
    /// wait they computed from age-out alone has elapsed.
    freed: Notify,
}

impl TokenWindow {
    /// Creates a window admitting at most `limit` cost per `window`.
    ///
    /// `kind` must be a token kind; it determines the dimension and labels
    /// errors and snapshots.
    pub fn new(kind: LimiterKind, limit: u64, window: Duration) -> Result<Self> {
        let dimension = TokenDimension::for_kind(kind).ok_or(DispatchError::InvalidConfig {
            reason: format!("{kind} is not a token limiter kind"),
        })?;
        Ok(Self {
            kind,
            dimension,
            limit,
            window,
            reservations: Mutex::new(VecDeque::new()),
            freed: Notify::new(),
        })
    }

    /// The dimension this window counts.
    pub fn dimension(&self) -> TokenDimension {
        self.dimension
    }

    /// Waits until `cost` fits in the window, then records a reservation
    /// for `request_id`.
    ///
    /// Fails immediately with a configuration fault if `cost` exceeds the
    /// limit outright: such a request could never be admitted and waiting
    /// would never terminate. A zero cost is admitted without waiting so a
    /// request with no estimate is never blocked behind an overage; the
    /// zero reservation is still recorded so a later [`adjust`] can account
    /// for the tokens actually used.
    ///
    /// [`adjust`]: TokenWindow::adjust
    pub async fn acquire(&self, request_id: &str, cost: u64) -> Result<()> {
        if cost > self.limit {
            return Err(DispatchError::CostExceedsLimit {
                kind: self.kind.as_str().to_string(),
                cost,
                limit: self.limit,
            });
        }
        loop {
            match self.try_reserve(request_id, cost) {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    tokio::select! {
                        _ = sleep(wait.max(MIN_SLEEP)) => {}
                        _ = self.freed.notified() => {}
                    }
                }
            }
        }
    }

    /// Records a reservation if `cost` fits right now; otherwise returns
    /// how long until enough cost has aged out.
    pub fn try_reserve(&self, request_id: &str, cost: u64) -> std::result::Result<(), Duration> {
        let now = Instant::now();
        let mut reservations = self.reservations.lock().unwrap();
        evict(&mut reservations, now, self.window);

        let live: u64 = reservations.iter().map(|r| r.cost).sum();
        if cost == 0 || live.saturating_add(cost) <= self.limit {
            reservations.push_back(Reservation {
                admitted_at: now,
                request_id: request_id.to_string(),
                cost,
            });
            return Ok(());
        }

        // Walk from the oldest reservation until enough cost would have
        // aged out for this request to fit.
        let needed = live.saturating_add(cost) - self.limit;
        let mut freed = 0u64;
        for reservation in reservations.iter() {
            freed = freed.saturating_add(reservation.cost);
            if freed >= needed {
                let wait = reservation
                    .admitted_at
                    .checked_add(self.window)
                    .map(|expiry| expiry.saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO);
                return Err(wait);
            }
        }

        // Unreachable while cost <= limit, but a concurrent adjust can
        // shrink entries mid-walk; retry shortly.
        Err(MIN_SLEEP)
    }

    /// Returns true if `cost` would fit right now, without reserving.
    pub fn would_admit(&self, cost: u64) -> bool {
        cost == 0 || self.usage().saturating_add(cost) <= self.limit
    }

    /// Rewrites the reservation for `request_id` to `new_cost`.
    ///
    /// A downward adjustment releases capacity for waiting requests; an
    /// upward one records the overage without retroactively blocking
    /// anything. Returns false if no reservation for `request_id` is still
    /// tracked (it aged out or was never admitted here).
    pub fn adjust(&self, request_id: &str, new_cost: u64) -> bool {
        let now = Instant::now();
        let mut reservations = self.reservations.lock().unwrap();
        evict(&mut reservations, now, self.window);

        let shrank = match reservations
            .iter_mut()
            .find(|r| r.request_id == request_id)
        {
            Some(reservation) => {
                let shrank = new_cost < reservation.cost;
                reservation.cost = new_cost;
                shrank
            }
            None => return false,
        };
        drop(reservations);

        if shrank {
            self.freed.notify_waiters();
        }
        true
    }

    /// Removes the reservation for `request_id` entirely.
    ///
    /// Used when an admission is abandoned before processing; the reserved
    /// capacity was never consumed. Returns false if nothing was tracked.
    pub fn revoke(&self, request_id: &str) -> bool {
        let now = Instant::now();
        let mut reservations = self.reservations.lock().unwrap();
        evict(&mut reservations, now, self.window);

        let before = reservations.len();
        reservations.retain(|r| r.request_id != request_id);
        let removed = reservations.len() != before;
        drop(reservations);

        if removed {
            self.freed.notify_waiters();
        }
        removed
    }

    /// Total cost currently inside the window.
    pub fn usage(&self) -> u64 {
        let now = Instant::now();
        let mut reservations = self.reservations.lock().unwrap();
        evict(&mut reservations, now, self.window);
        reservations.iter().map(|r| r.cost).sum()
    }

    /// Remaining cost before the window is full. Overages clamp to zero.
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

fn evict(reservations: &mut VecDeque<Reservation>, now: Instant, window: Duration) {
    while let Some(front) = reservations.front() {
        if now.duration_since(front.admitted_at) >= window {
            reservations.pop_front();
        } else {
            break;
        }
    }
}
