//! Limiter integration tests.
//!
//! Test organization:
//! - request_window.rs: rolling request-count admission
//! - token_window.rs: token reservation and reconciliation
//! - concurrency.rs: in-flight gating
//! - chain.rs: all-or-nothing composition

mod chain;
mod request_window;
