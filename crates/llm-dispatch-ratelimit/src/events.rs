//! Events emitted by the limiter chain.

use llm_dispatch_core::DispatchEvent;
use std::time::{Duration, Instant};

/// Events emitted as requests move through a model's limiter chain.
///
/// Each variant stamps when the transition happened; hooks that want
/// latency math read the `timestamp` off the payload.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// Every member of the chain admitted the request.
    AdmissionGranted {
        /// Model whose chain granted admission.
        model: String,
        /// The admitted request.
        request_id: String,
        /// When admission was granted.
        timestamp: Instant,
        /// How long the request waited for capacity.
        wait: Duration,
    },
    /// The request finished and its concurrency permits were returned.
    AdmissionReleased {
        /// Model whose chain released the request.
        model: String,
        /// The released request.
        request_id: String,
        /// When release happened.
        timestamp: Instant,
    },
    /// A partially acquired admission was rolled back.
    AdmissionRevoked {
        /// Model whose chain revoked the admission.
        model: String,
        /// The revoked request.
        request_id: String,
        /// When the rollback happened.
        timestamp: Instant,
    },
    /// Estimated token cost was reconciled against actual usage.
    UsageAdjusted {
        /// Model whose chain was adjusted.
        model: String,
        /// The adjusted request.
        request_id: String,
        /// When the adjustment happened.
        timestamp: Instant,
        /// Actual input tokens.
        actual_input: u64,
        /// Actual output tokens.
        actual_output: u64,
    },
}

impl DispatchEvent for ChainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ChainEvent::AdmissionGranted { .. } => "admission_granted",
            ChainEvent::AdmissionReleased { .. } => "admission_released",
            ChainEvent::AdmissionRevoked { .. } => "admission_revoked",
            ChainEvent::UsageAdjusted { .. } => "usage_adjusted",
        }
    }

    fn model(&self) -> &str {
        match self {
            ChainEvent::AdmissionGranted { model, .. }
            | ChainEvent::AdmissionReleased { model, .. }
            | ChainEvent::AdmissionRevoked { model, .. }
            | ChainEvent::UsageAdjusted { model, .. } => model,
        }
    }
}
