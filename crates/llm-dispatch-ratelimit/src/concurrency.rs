//! In-flight concurrency limiter.

use llm_dispatch_core::{DispatchError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of requests in flight at once.
///
/// A thin wrapper over a counting semaphore. Acquired permits are parked in
/// a map keyed by request id, so release is addressable from any context
/// rather than tied to a lexical scope: the limiter chain acquires before
/// the processor runs and releases after it returns.
#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: u64,
    semaphore: Arc<Semaphore>,
    held: Mutex<HashMap<String, OwnedSemaphorePermit>>,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `limit` requests at once.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit as usize)),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a permit and parks it under `request_id`.
    pub async fn acquire(&self, request_id: &str) -> Result<()> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::InvalidConfig {
                reason: "concurrency gate semaphore closed".to_string(),
            })?;
        self.held
            .lock()
            .unwrap()
            .insert(request_id.to_string(), permit);
        Ok(())
    }

    /// Parks a permit under `request_id` if one is free right now.
    pub fn try_acquire(&self, request_id: &str) -> bool {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                self.held
                    .lock()
                    .unwrap()
                    .insert(request_id.to_string(), permit);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the permit parked under `request_id`, if any.
    ///
    /// Idempotent: releasing an id that holds no permit is a no-op.
    pub fn release(&self, request_id: &str) {
        // Dropping the permit returns it to the semaphore.
        self.held.lock().unwrap().remove(request_id);
    }

    /// Returns true if a permit is free right now.
    pub fn would_admit(&self) -> bool {
        self.semaphore.available_permits() > 0
    }

    /// Number of permits currently held.
    pub fn usage(&self) -> u64 {
        self.limit
            .saturating_sub(self.semaphore.available_permits() as u64)
    }

    /// Number of free permits.
    pub fn capacity(&self) -> u64 {
        self.semaphore.available_permits() as u64
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }
}
