//! Client-side rate-limited request scheduler for LLM provider fan-out.
//!
//! Applications fanning requests out to remote LLM APIs face several
//! simultaneous limits per model: requests per window, tokens per window
//! (sometimes split into input and output budgets), and concurrent calls.
//! `llm-dispatch` enforces all of them on the client side: register each
//! model with its limit table and a processor, submit requests, and the
//! scheduler admits each one only when every limit has capacity.
//!
//! # Architecture
//!
//! - **Limiters** ([`RequestWindow`], [`TokenWindow`], [`ConcurrencyGate`])
//!   each guard one dimension of one limit.
//! - **[`LimiterChain`]** composes a model's limiters with all-or-nothing
//!   admission and reconciles estimated token cost against actual usage.
//! - **[`DispatchManager`]** owns a FIFO queue and a single worker per
//!   model, routes submissions, and coordinates shutdown.
//!
//! # Quick start
//!
//! ```no_run
//! use llm_dispatch::{
//!     processor_fn, Completion, DispatchManager, LimiterSpec, ModelConfig, Request,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager: DispatchManager<String, String> = DispatchManager::new();
//!
//!     manager.register(
//!         ModelConfig::builder("claude-sonnet")
//!             .limiter(LimiterSpec::rpm(60))
//!             .limiter(LimiterSpec::tpm(100_000))
//!             .limiter(LimiterSpec::concurrent(8))
//!             .build(),
//!         processor_fn(|request: Arc<Request<String>>| async move {
//!             // Call the provider here; report actual usage if known.
//!             let answer = format!("echo: {}", request.params());
//!             Ok(Completion::new(answer).with_usage(1_830, 412))
//!         }),
//!     )?;
//!
//!     let response = manager
//!         .submit(
//!             Request::builder("claude-sonnet", "hello".to_string())
//!                 .estimated_input_tokens(2_000)
//!                 .estimated_output_tokens(1_000)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", response.result());
//!     manager.shutdown_all(None).await;
//!     Ok(())
//! }
//! ```
//!
//! # Delivery modes
//!
//! `submit` blocks until the terminal response by default. Build the
//! request with `.fire_and_forget()` to get a `Pending` response back
//! immediately and poll `get_status` for the result; terminal responses
//! stay queryable until the queue shuts down.

pub use llm_dispatch_core::{
    events::EventListeners, DispatchError, DispatchEvent, EventListener, Result,
};
pub use llm_dispatch_ratelimit::{
    ChainBuilder, ChainEvent, ConcurrencyGate, Limiter, LimiterChain, LimiterKind,
    LimiterSnapshot, LimiterSpec, RequestWindow, TokenDimension, TokenWindow,
};
pub use llm_dispatch_scheduler::{
    processor_fn, BoxError, Completion, DispatchManager, ModelConfig, ModelConfigBuilder,
    ModelQueue, Processor, ProcessorFn, QueueInfo, Request, RequestBuilder, RequestId,
    RequestStatus, Response, SchedulerEvent,
};
