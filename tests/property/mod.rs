//! Property-based tests.
//!
//! Invariants covered:
//! - Windows never admit more than their configured limit
//! - Token usage always equals the sum of live reservations
//! - Reconciliation converges regardless of call order
//! - Chains balance acquires with releases

pub mod chain;
pub mod token_window;
