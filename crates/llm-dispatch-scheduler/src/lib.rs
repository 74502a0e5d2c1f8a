//! Per-model request queues and the manager facade for llm-dispatch.
//!
//! Each registered model owns a FIFO of pending requests and a single
//! worker that drains it: the worker admits a request through the model's
//! limiter chain, invokes the user-supplied [`Processor`], reconciles
//! estimated token cost against actual usage, releases the chain, and
//! publishes the terminal [`Response`]. The [`DispatchManager`] maps model
//! ids to queues and routes submissions.
//!
//! Two delivery modes:
//! - **Wait** (default): `submit` resolves to the terminal response.
//! - **Fire-and-forget**: `submit` returns a `Pending` response
//!   immediately; the result is polled via `get_status`.
//!
//! Processor failures never escape `submit` as errors; they become
//! `Failed` responses confined to their request, and the worker keeps
//! draining.

mod config;
mod events;
mod manager;
mod processor;
mod queue;
mod request;
mod worker;

pub use config::{ModelConfig, ModelConfigBuilder};
pub use events::SchedulerEvent;
pub use manager::DispatchManager;
pub use processor::{processor_fn, BoxError, Completion, Processor, ProcessorFn};
pub use queue::{ModelQueue, QueueInfo};
pub use request::{Request, RequestBuilder, RequestId, RequestStatus, Response};

pub use llm_dispatch_core::{DispatchError, Result};
