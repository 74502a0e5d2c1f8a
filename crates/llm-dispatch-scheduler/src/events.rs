//! Events emitted by model queues.

use llm_dispatch_core::DispatchEvent;
use std::time::{Duration, Instant};

/// Events emitted as requests move through a model's queue.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A request entered the FIFO.
    RequestEnqueued {
        /// Model whose queue accepted the request.
        model: String,
        /// The enqueued request.
        request_id: String,
        /// When the request was enqueued.
        timestamp: Instant,
    },
    /// The worker acquired every limiter and handed the request to the
    /// processor.
    RequestStarted {
        /// Model whose worker started the request.
        model: String,
        /// The started request.
        request_id: String,
        /// When processing began.
        timestamp: Instant,
        /// Time from enqueue to processing.
        queued_for: Duration,
    },
    /// The processor returned a value.
    RequestCompleted {
        /// Model whose worker finished the request.
        model: String,
        /// The completed request.
        request_id: String,
        /// When processing finished.
        timestamp: Instant,
        /// Wall-clock processing time.
        duration: Duration,
    },
    /// The processor returned an error.
    RequestFailed {
        /// Model whose worker finished the request.
        model: String,
        /// The failed request.
        request_id: String,
        /// When processing finished.
        timestamp: Instant,
        /// The error's string form.
        error: String,
    },
    /// The queue shut down.
    QueueShutdown {
        /// Model whose queue shut down.
        model: String,
        /// When shutdown finished.
        timestamp: Instant,
        /// Requests that never reached a processor-produced terminal state
        /// and were failed with a shutdown error.
        outstanding: usize,
    },
}

impl DispatchEvent for SchedulerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::RequestEnqueued { .. } => "request_enqueued",
            SchedulerEvent::RequestStarted { .. } => "request_started",
            SchedulerEvent::RequestCompleted { .. } => "request_completed",
            SchedulerEvent::RequestFailed { .. } => "request_failed",
            SchedulerEvent::QueueShutdown { .. } => "queue_shutdown",
        }
    }

    fn model(&self) -> &str {
        match self {
            SchedulerEvent::RequestEnqueued { model, .. }
            | SchedulerEvent::RequestStarted { model, .. }
            | SchedulerEvent::RequestCompleted { model, .. }
            | SchedulerEvent::RequestFailed { model, .. }
            | SchedulerEvent::QueueShutdown { model, .. } => model,
        }
    }
}
