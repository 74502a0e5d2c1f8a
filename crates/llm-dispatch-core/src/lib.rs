//! Core infrastructure for llm-dispatch.
//!
//! This crate provides shared functionality used across all llm-dispatch
//! modules:
//! - Event system for observability
//! - The unified [`DispatchError`] type

pub mod error;
pub mod events;

pub use error::{DispatchError, Result};
pub use events::{DispatchEvent, EventListener};
