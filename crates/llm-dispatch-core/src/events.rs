//! Event plumbing for scheduler components.
//!
//! Limiter chains and model queues emit typed events as requests move
//! through them. Hooks are registered on the component's configuration
//! builder and run inline at the emission site, on the worker path.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An event emitted by a scheduler component.
pub trait DispatchEvent: Send + Sync + fmt::Debug {
    /// Short name of the event kind, e.g. `"admission_granted"`.
    fn event_type(&self) -> &'static str;

    /// The model the emitting component serves.
    fn model(&self) -> &str;
}

/// Receives events from one component.
///
/// Implemented for every `Fn(&E) + Send + Sync` closure, so hooks are
/// usually registered as plain closures.
pub trait EventListener<E: DispatchEvent>: Send + Sync {
    /// Called with each event the component emits.
    fn on_event(&self, event: &E);
}

impl<E, F> EventListener<E> for F
where
    E: DispatchEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// The hooks registered on one component.
///
/// Emission runs inline on the worker path, so a hook that panics is a
/// hazard to the queue it observes: [`emit`] catches the panic and
/// disables that hook. The remaining hooks keep receiving events, and the
/// queue keeps running.
///
/// [`emit`]: EventListeners::emit
pub struct EventListeners<E: DispatchEvent> {
    hooks: Vec<Hook<E>>,
}

struct Hook<E: DispatchEvent> {
    listener: Arc<dyn EventListener<E>>,
    disabled: Arc<AtomicBool>,
}

impl<E: DispatchEvent> Clone for Hook<E> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            disabled: Arc::clone(&self.disabled),
        }
    }
}

impl<E: DispatchEvent> EventListeners<E> {
    /// Creates an empty hook set.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Registers a hook.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.hooks.push(Hook {
            listener: Arc::new(listener),
            disabled: Arc::new(AtomicBool::new(false)),
        });
    }

    /// Delivers an event to every enabled hook.
    ///
    /// A hook that panics is disabled and skipped from then on; clones of
    /// this set (the component and its builder share hooks by clone) see
    /// the same disablement.
    pub fn emit(&self, event: &E) {
        for hook in &self.hooks {
            if hook.disabled.load(Ordering::Relaxed) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| hook.listener.on_event(event)));
            if outcome.is_err() {
                hook.disabled.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Number of registered hooks, disabled ones included.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Number of hooks still enabled.
    pub fn active(&self) -> usize {
        self.hooks
            .iter()
            .filter(|hook| !hook.disabled.load(Ordering::Relaxed))
            .count()
    }
}

impl<E: DispatchEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<E: DispatchEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
