//! Error types for the llm-dispatch scheduler.
//!
//! A single enum covers every failure the scheduler surfaces to callers.
//! Processor failures are deliberately absent: they are captured into
//! `Failed` responses by the worker and never propagate through `submit`.

/// Errors surfaced by registration, submission, and status probes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// A submission, status probe, or usage update named a model that was
    /// never registered.
    #[error("model `{model}` is not registered")]
    ModelNotRegistered {
        /// The model id that was looked up.
        model: String,
    },

    /// A registration named a model id that already has a live queue.
    #[error("model `{model}` is already registered")]
    ModelAlreadyRegistered {
        /// The model id that was registered twice.
        model: String,
    },

    /// A limiter or model configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A request's token cost alone exceeds a limiter's total limit, so the
    /// request could never be admitted. Raised instead of waiting forever.
    #[error("token cost {cost} can never be admitted by {kind} limiter with limit {limit}")]
    CostExceedsLimit {
        /// The limiter kind that can never admit the request.
        kind: String,
        /// The request's projected cost on that limiter.
        cost: u64,
        /// The limiter's configured limit.
        limit: u64,
    },

    /// The queue for this model has begun shutting down and refuses new work.
    #[error("queue for model `{model}` is shut down")]
    QueueShutdown {
        /// The model whose queue is shutting down.
        model: String,
    },

    /// A status probe named a request id the queue is not tracking.
    #[error("model `{model}` has no tracked request `{request_id}`")]
    RequestNotFound {
        /// The model that was probed.
        model: String,
        /// The unknown request id.
        request_id: String,
    },
}

impl DispatchError {
    /// Returns true for shutdown-caused failures.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, DispatchError::QueueShutdown { .. })
    }

    /// Returns true for configuration faults: invalid limiter or model
    /// settings, duplicate registration, and the never-admissible cost
    /// case.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidConfig { .. }
                | DispatchError::ModelAlreadyRegistered { .. }
                | DispatchError::CostExceedsLimit { .. }
        )
    }

    /// Returns true for unknown-model or unknown-request lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::ModelNotRegistered { .. } | DispatchError::RequestNotFound { .. }
        )
    }
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
