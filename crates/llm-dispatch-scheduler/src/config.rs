//! Per-model configuration.

use crate::events::SchedulerEvent;
use llm_dispatch_core::events::EventListeners;
use llm_dispatch_core::{DispatchError, Result};
use llm_dispatch_ratelimit::LimiterSpec;
use std::time::Duration;

/// Configuration for one registered model: its id, its ordered limiter
/// chain, and queue event hooks.
///
/// Zero limiters is legal and means unconstrained admission. Duplicate
/// limiter kinds are legal and additive.
#[derive(Clone)]
pub struct ModelConfig {
    pub(crate) model_id: String,
    pub(crate) limiters: Vec<LimiterSpec>,
    pub(crate) event_listeners: EventListeners<SchedulerEvent>,
}

impl ModelConfig {
    /// Creates a configuration with no limiters and no listeners.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            limiters: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Creates a configuration builder.
    pub fn builder(model_id: impl Into<String>) -> ModelConfigBuilder {
        ModelConfigBuilder {
            config: Self::new(model_id),
        }
    }

    /// The model id this configuration registers.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The ordered limiter specs.
    pub fn limiters(&self) -> &[LimiterSpec] {
        &self.limiters
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.model_id.is_empty() {
            return Err(DispatchError::InvalidConfig {
                reason: "model id must not be empty".to_string(),
            });
        }
        for spec in &self.limiters {
            spec.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`ModelConfig`].
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    /// Appends a limiter. Order matters: admission acquires in this order.
    pub fn limiter(mut self, spec: LimiterSpec) -> Self {
        self.config.limiters.push(spec);
        self
    }

    /// Appends several limiters in order, e.g. a table deserialized from a
    /// configuration file.
    pub fn limiters(mut self, specs: impl IntoIterator<Item = LimiterSpec>) -> Self {
        self.config.limiters.extend(specs);
        self
    }

    /// Registers a callback invoked when a request enters the FIFO, with
    /// the request id.
    pub fn on_request_enqueued<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.event_listeners.add(move |event: &SchedulerEvent| {
            if let SchedulerEvent::RequestEnqueued { request_id, .. } = event {
                f(request_id);
            }
        });
        self
    }

    /// Registers a callback invoked when processing begins, with the time
    /// the request spent queued (including limiter waits).
    pub fn on_request_started<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.config.event_listeners.add(move |event: &SchedulerEvent| {
            if let SchedulerEvent::RequestStarted { queued_for, .. } = event {
                f(*queued_for);
            }
        });
        self
    }

    /// Registers a callback invoked when the processor returns a value,
    /// with the processing duration.
    pub fn on_request_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.config.event_listeners.add(move |event: &SchedulerEvent| {
            if let SchedulerEvent::RequestCompleted { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback invoked when the processor fails, with the
    /// error's string form.
    pub fn on_request_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.event_listeners.add(move |event: &SchedulerEvent| {
            if let SchedulerEvent::RequestFailed { error, .. } = event {
                f(error);
            }
        });
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> ModelConfig {
        self.config
    }
}
