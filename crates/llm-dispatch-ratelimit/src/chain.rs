//! The limiter chain: all-or-nothing admission across a model's limiters.

use crate::config::LimiterSpec;
use crate::events::ChainEvent;
use crate::limiter::{Limiter, LimiterSnapshot};
use llm_dispatch_core::events::EventListeners;
use llm_dispatch_core::{DispatchError, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// The ordered set of limiters guarding one model.
///
/// A request is admitted only when every member has capacity for that
/// request's cost vector. Acquisition is sequential in configured order;
/// if the caller abandons a partially acquired admission (the future is
/// dropped, or a member faults), the members already acquired are revoked
/// in reverse order.
///
/// Token reservations made at admission are reconciled against actual
/// usage through [`update_usage`] and keep counting against their rolling
/// windows after [`release_all`]; consumed budget ages out, it is not
/// refunded.
///
/// [`update_usage`]: LimiterChain::update_usage
/// [`release_all`]: LimiterChain::release_all
pub struct LimiterChain {
    model_id: String,
    members: Vec<Limiter>,
    /// Request id -> number of members holding it. Guards the
    /// acquire/release balance; never held across an await.
    in_flight: Mutex<HashMap<String, usize>>,
    listeners: EventListeners<ChainEvent>,
}

impl LimiterChain {
    /// Creates a chain from specs with no event listeners.
    pub fn new(model_id: impl Into<String>, specs: &[LimiterSpec]) -> Result<Self> {
        let mut builder = ChainBuilder::new(model_id);
        for spec in specs {
            builder = builder.limiter(spec.clone());
        }
        builder.build()
    }

    /// Creates a chain builder.
    pub fn builder(model_id: impl Into<String>) -> ChainBuilder {
        ChainBuilder::new(model_id)
    }

    /// The model this chain guards.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Number of member limiters. Zero members means unconstrained.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the chain has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of requests currently holding the chain.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Rejects a request whose token cost alone exceeds some member's
    /// limit: it could never be admitted, so waiting would never end.
    pub fn check_admissible(&self, estimated_input: u64, estimated_output: u64) -> Result<()> {
        for member in &self.members {
            let cost = member.cost_of(estimated_input, estimated_output);
            if member.kind().is_token() && cost > member.limit() {
                return Err(DispatchError::CostExceedsLimit {
                    kind: member.kind().as_str().to_string(),
                    cost,
                    limit: member.limit(),
                });
            }
        }
        Ok(())
    }

    /// Returns true if every member would admit the request right now,
    /// without acquiring anything.
    pub fn would_admit(&self, estimated_input: u64, estimated_output: u64) -> bool {
        self.members
            .iter()
            .all(|member| member.would_admit(member.cost_of(estimated_input, estimated_output)))
    }

    /// Waits until every member admits the request, in configured order.
    ///
    /// Holds all members or none: if acquisition fails or is abandoned
    /// partway, the members acquired so far are revoked in reverse order.
    pub async fn acquire_all(
        &self,
        request_id: &str,
        estimated_input: u64,
        estimated_output: u64,
    ) -> Result<()> {
        let started = Instant::now();
        let mut partial = PartialAcquire {
            chain: self,
            request_id,
            count: 0,
        };

        for member in &self.members {
            let cost = member.cost_of(estimated_input, estimated_output);
            member.acquire(request_id, cost).await?;
            partial.count += 1;
        }

        // Fully acquired; disarm the rollback guard.
        partial.count = 0;
        drop(partial);
        self.in_flight
            .lock()
            .unwrap()
            .insert(request_id.to_string(), self.members.len());

        let wait = started.elapsed();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            model = %self.model_id,
            request_id,
            wait_ms = wait.as_millis() as u64,
            "admission granted"
        );

        #[cfg(feature = "metrics")]
        {
            counter!("llm_dispatch_admissions_total", "model" => self.model_id.clone())
                .increment(1);
            gauge!("llm_dispatch_in_flight", "model" => self.model_id.clone())
                .set(self.in_flight() as f64);
        }

        self.listeners.emit(&ChainEvent::AdmissionGranted {
            model: self.model_id.clone(),
            request_id: request_id.to_string(),
            timestamp: Instant::now(),
            wait,
        });
        Ok(())
    }

    /// Reconciles the request's token reservations against actual usage.
    ///
    /// Idempotent; a request id no member tracks (aged out, or never
    /// admitted) is a no-op. Returns true if any member adjusted.
    pub fn update_usage(&self, request_id: &str, actual_input: u64, actual_output: u64) -> bool {
        let mut adjusted = false;
        for member in &self.members {
            adjusted |= member.adjust(request_id, actual_input, actual_output);
        }

        if adjusted {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                model = %self.model_id,
                request_id,
                actual_input,
                actual_output,
                "token usage reconciled"
            );

            self.listeners.emit(&ChainEvent::UsageAdjusted {
                model: self.model_id.clone(),
                request_id: request_id.to_string(),
                timestamp: Instant::now(),
                actual_input,
                actual_output,
            });
        }
        adjusted
    }

    /// Releases a completed request: concurrency permits return, window
    /// records stay until they age out, and the in-flight record is
    /// dropped. Idempotent; returns false if the request held nothing.
    pub fn release_all(&self, request_id: &str) -> bool {
        if self.in_flight.lock().unwrap().remove(request_id).is_none() {
            return false;
        }
        for member in self.members.iter().rev() {
            member.release(request_id);
        }

        #[cfg(feature = "metrics")]
        gauge!("llm_dispatch_in_flight", "model" => self.model_id.clone())
            .set(self.in_flight() as f64);

        self.listeners.emit(&ChainEvent::AdmissionReleased {
            model: self.model_id.clone(),
            request_id: request_id.to_string(),
            timestamp: Instant::now(),
        });
        true
    }

    /// Point-in-time view of every member, in configured order.
    pub fn snapshot(&self) -> Vec<LimiterSnapshot> {
        self.members.iter().map(Limiter::snapshot).collect()
    }

    fn revoke_partial(&self, request_id: &str, count: usize) {
        for member in self.members[..count].iter().rev() {
            member.revoke(request_id);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            model = %self.model_id,
            request_id,
            members = count,
            "partial admission revoked"
        );

        self.listeners.emit(&ChainEvent::AdmissionRevoked {
            model: self.model_id.clone(),
            request_id: request_id.to_string(),
            timestamp: Instant::now(),
        });
    }
}

impl std::fmt::Debug for LimiterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterChain")
            .field("model_id", &self.model_id)
            .field("members", &self.members)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Rolls back a partially acquired admission when `acquire_all` is
/// abandoned mid-way, including by future drop during shutdown.
struct PartialAcquire<'a> {
    chain: &'a LimiterChain,
    request_id: &'a str,
    count: usize,
}

impl Drop for PartialAcquire<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            self.chain.revoke_partial(self.request_id, self.count);
        }
    }
}

/// Builder for [`LimiterChain`].
pub struct ChainBuilder {
    model_id: String,
    specs: Vec<LimiterSpec>,
    listeners: EventListeners<ChainEvent>,
}

impl ChainBuilder {
    fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            specs: Vec::new(),
            listeners: EventListeners::new(),
        }
    }

    /// Appends a limiter. Order matters: acquisition follows it.
    pub fn limiter(mut self, spec: LimiterSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Appends several limiters in order.
    pub fn limiters(mut self, specs: impl IntoIterator<Item = LimiterSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Registers a callback invoked when a request is admitted by every
    /// member, with the time it spent waiting for capacity.
    pub fn on_admission_granted<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.listeners.add(move |event: &ChainEvent| {
            if let ChainEvent::AdmissionGranted { wait, .. } = event {
                f(*wait);
            }
        });
        self
    }

    /// Registers a callback invoked when estimated cost is reconciled
    /// against actual usage, with the actual input/output token counts.
    pub fn on_usage_adjusted<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.listeners.add(move |event: &ChainEvent| {
            if let ChainEvent::UsageAdjusted {
                actual_input,
                actual_output,
                ..
            } = event
            {
                f(*actual_input, *actual_output);
            }
        });
        self
    }

    /// Builds the chain, validating every spec.
    pub fn build(self) -> Result<LimiterChain> {
        let members = self
            .specs
            .iter()
            .map(Limiter::from_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(LimiterChain {
            model_id: self.model_id,
            members,
            in_flight: Mutex::new(HashMap::new()),
            listeners: self.listeners,
        })
    }
}
