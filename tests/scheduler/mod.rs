//! Scheduler integration tests.
//!
//! Test organization:
//! - fifo.rs: strict per-model ordering
//! - fire_and_forget.rs: detached delivery and status polling
//! - failures.rs: processor failure isolation
//! - reconcile.rs: token usage reconciliation through the manager
//! - shutdown.rs: drain, deadline, and refusal semantics
//! - events.rs: queue event hooks
//! - info.rs: status probes and their serialized form

mod failures;
mod info;
mod reconcile;
mod shutdown;
