//! Composable rate limiters for LLM provider fan-out.
//!
//! Remote LLM APIs impose several simultaneous limits per model: requests
//! per window, tokens per window (sometimes split into input and output
//! budgets), and concurrent calls. This crate provides one admission
//! primitive per limit shape and a [`LimiterChain`] that composes them
//! with all-or-nothing semantics: a request proceeds only when every
//! member has capacity for that request's cost vector.
//!
//! Token limits are guarded by reservation: admission reserves the
//! submitter's estimate, and [`LimiterChain::update_usage`] reconciles the
//! reservation to the actual count once the provider responds, refunding
//! over-estimates and recording overages.
//!
//! # Example
//!
//! ```
//! use llm_dispatch_ratelimit::{LimiterChain, LimiterSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = LimiterChain::builder("claude-sonnet")
//!     .limiter(LimiterSpec::rpm(60))
//!     .limiter(LimiterSpec::tpm(100_000))
//!     .limiter(LimiterSpec::concurrent(8))
//!     .build()?;
//!
//! // Reserve estimated cost, do the call, reconcile, release.
//! chain.acquire_all("req-1", 2_000, 1_000).await?;
//! chain.update_usage("req-1", 1_830, 412);
//! chain.release_all("req-1");
//! # Ok(())
//! # }
//! ```

mod chain;
mod concurrency;
mod config;
mod events;
mod limiter;
mod request_window;
mod token_window;

pub use chain::{ChainBuilder, LimiterChain};
pub use concurrency::ConcurrencyGate;
pub use config::{LimiterKind, LimiterSpec};
pub use events::ChainEvent;
pub use limiter::{Limiter, LimiterSnapshot};
pub use request_window::RequestWindow;
pub use token_window::{TokenDimension, TokenWindow};
