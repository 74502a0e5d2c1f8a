//! Uniform capability surface over the limiter variants.

use crate::concurrency::ConcurrencyGate;
use crate::config::{LimiterKind, LimiterSpec};
use crate::request_window::RequestWindow;
use crate::token_window::TokenWindow;
use llm_dispatch_core::Result;
use serde::Serialize;
use std::time::Duration;

/// One member of a model's limiter chain.
///
/// Dispatches the shared capability set (acquire, release, adjust, probes)
/// to whichever variant the spec configured.
#[derive(Debug)]
pub struct Limiter {
    kind: LimiterKind,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Counts admissions in a rolling window (RPM, RPD).
    RequestWindow(RequestWindow),
    /// Sums token cost in a rolling window (TPM, TPD, ITPM, OTPM).
    TokenWindow(TokenWindow),
    /// Caps in-flight requests (Concurrent).
    Concurrency(ConcurrencyGate),
}

impl Limiter {
    /// Builds the variant a spec describes. Validates the spec first.
    pub fn from_spec(spec: &LimiterSpec) -> Result<Self> {
        spec.validate()?;
        let state = match spec.kind {
            LimiterKind::Rpm | LimiterKind::Rpd => {
                // effective_window is Some for every windowed kind
                let window = spec.effective_window().unwrap_or(Duration::from_secs(60));
                State::RequestWindow(RequestWindow::new(spec.limit, window))
            }
            LimiterKind::Tpm | LimiterKind::Tpd | LimiterKind::Itpm | LimiterKind::Otpm => {
                let window = spec.effective_window().unwrap_or(Duration::from_secs(60));
                State::TokenWindow(TokenWindow::new(spec.kind, spec.limit, window)?)
            }
            LimiterKind::Concurrent => State::Concurrency(ConcurrencyGate::new(spec.limit)),
        };
        Ok(Self {
            kind: spec.kind,
            state,
        })
    }

    /// The kind this limiter was configured as.
    pub fn kind(&self) -> LimiterKind {
        self.kind
    }

    /// Projects a request's token estimates onto this limiter's cost.
    ///
    /// Request-count and concurrency limiters always cost 1; token limiters
    /// cost the dimensional token count.
    pub fn cost_of(&self, input_tokens: u64, output_tokens: u64) -> u64 {
        match &self.state {
            State::RequestWindow(_) | State::Concurrency(_) => 1,
            State::TokenWindow(w) => w.dimension().cost(input_tokens, output_tokens),
        }
    }

    /// Waits until this limiter admits `cost` for `request_id`.
    pub async fn acquire(&self, request_id: &str, cost: u64) -> Result<()> {
        match &self.state {
            State::RequestWindow(w) => {
                w.acquire().await;
                Ok(())
            }
            State::TokenWindow(w) => w.acquire(request_id, cost).await,
            State::Concurrency(g) => g.acquire(request_id).await,
        }
    }

    /// Returns true if `cost` would be admitted right now, without
    /// acquiring.
    pub fn would_admit(&self, cost: u64) -> bool {
        match &self.state {
            State::RequestWindow(w) => w.would_admit(),
            State::TokenWindow(w) => w.would_admit(cost),
            State::Concurrency(g) => g.would_admit(),
        }
    }

    /// Normal-completion release: concurrency returns its permit; window
    /// records stay and age out.
    pub fn release(&self, request_id: &str) {
        match &self.state {
            State::RequestWindow(_) | State::TokenWindow(_) => {}
            State::Concurrency(g) => g.release(request_id),
        }
    }

    /// Abandonment release: the admission never led to processing, so token
    /// reservations are removed outright. Request-window slots are not
    /// rewound; admissions are not reversible.
    pub fn revoke(&self, request_id: &str) {
        match &self.state {
            State::RequestWindow(_) => {}
            State::TokenWindow(w) => {
                w.revoke(request_id);
            }
            State::Concurrency(g) => g.release(request_id),
        }
    }

    /// Rewrites a token reservation to the actual dimensional cost.
    /// Returns true if this limiter tracked the request and adjusted it.
    pub fn adjust(&self, request_id: &str, actual_input: u64, actual_output: u64) -> bool {
        match &self.state {
            State::RequestWindow(_) | State::Concurrency(_) => false,
            State::TokenWindow(w) => {
                let cost = w.dimension().cost(actual_input, actual_output);
                w.adjust(request_id, cost)
            }
        }
    }

    /// Current usage in this limiter's own cost unit.
    pub fn usage(&self) -> u64 {
        match &self.state {
            State::RequestWindow(w) => w.usage(),
            State::TokenWindow(w) => w.usage(),
            State::Concurrency(g) => g.usage(),
        }
    }

    /// Remaining capacity in this limiter's own cost unit.
    pub fn capacity(&self) -> u64 {
        match &self.state {
            State::RequestWindow(w) => w.capacity(),
            State::TokenWindow(w) => w.capacity(),
            State::Concurrency(g) => g.capacity(),
        }
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        match &self.state {
            State::RequestWindow(w) => w.limit(),
            State::TokenWindow(w) => w.limit(),
            State::Concurrency(g) => g.limit(),
        }
    }

    /// The rolling window, or `None` for concurrency.
    pub fn window(&self) -> Option<Duration> {
        match &self.state {
            State::RequestWindow(w) => Some(w.window()),
            State::TokenWindow(w) => Some(w.window()),
            State::Concurrency(_) => None,
        }
    }

    /// A point-in-time view of this limiter for status probes.
    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            kind: self.kind,
            limit: self.limit(),
            usage: self.usage(),
            capacity: self.capacity(),
            window: self.window(),
        }
    }
}

/// Point-in-time view of one chain member.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterSnapshot {
    /// The limiter's kind.
    pub kind: LimiterKind,
    /// Configured limit.
    pub limit: u64,
    /// Cost currently counted against the limit.
    pub usage: u64,
    /// Remaining capacity.
    pub capacity: u64,
    /// Rolling window, `None` for concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<Duration>,
}
